//! Coupon repository.
//!
//! Redemption is not here: it happens inside the order-placement transaction
//! in `db::orders`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use drape_core::{CouponId, DiscountType, UserId};

use super::{RepositoryError, map_unique_violation, parse_column};
use crate::models::Coupon;

const COUPON_COLUMNS: &str = "id, code, description, discount_type, value, min_order_amount, \
     max_discount, usage_limit, used_count, expires_at, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    description: String,
    discount_type: String,
    value: Decimal,
    min_order_amount: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    used_count: i32,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            code: r.code,
            description: r.description,
            discount_type: parse_column(&r.discount_type, "discount_type")?,
            value: r.value,
            min_order_amount: r.min_order_amount,
            max_discount: r.max_discount,
            usage_limit: r.usage_limit,
            used_count: r.used_count,
            expires_at: r.expires_at,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Full set of writable coupon fields.
#[derive(Debug, Clone)]
pub struct CouponInput {
    /// Already upper-cased.
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows: Vec<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Coupon::try_from).collect()
    }

    /// Get a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> =
            sqlx::query_as(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Get a coupon by code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> =
            sqlx::query_as(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
                .bind(code.trim().to_uppercase())
                .fetch_optional(self.pool)
                .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Whether `user_id` has already redeemed the coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_redeemed(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2)",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(used)
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let row: CouponRow = sqlx::query_as(&format!(
            r"
            INSERT INTO coupons
                (code, description, discount_type, value, min_order_amount,
                 max_discount, usage_limit, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&input.code)
        .bind(&input.description)
        .bind(input.discount_type.as_str())
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "coupon code"))?;

        Coupon::try_from(row)
    }

    /// Replace a coupon's fields. Usage counters are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput,
    ) -> Result<Coupon, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            r"
            UPDATE coupons
            SET code = $2, description = $3, discount_type = $4, value = $5,
                min_order_amount = $6, max_discount = $7, usage_limit = $8,
                expires_at = $9, is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.code)
        .bind(&input.description)
        .bind(input.discount_type.as_str())
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "coupon code"))?;

        row.map(Coupon::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
