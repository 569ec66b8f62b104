//! Cart repository. A user's `cart_items` rows are their cart.

use rust_decimal::Decimal;
use sqlx::PgPool;

use drape_core::{CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    product_id: ProductId,
    name: String,
    slug: String,
    image: Option<String>,
    color: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(r: CartLineRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            name: r.name,
            slug: r.slug,
            image: r.image,
            color: r.color,
            quantity: r.quantity,
            unit_price: r.unit_price,
            line_total: r.unit_price * Decimal::from(r.quantity),
            stock: r.stock,
        }
    }
}

/// A stored line without product data.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct StoredLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Lines joined with live product data. Lines for inactive products are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id, ci.product_id, p.name, p.slug,
                   COALESCE(p.images[1], p.color_variants -> 0 -> 'images' ->> 0) AS image,
                   ci.color, ci.quantity,
                   COALESCE(p.discount_price, p.price) AS unit_price,
                   p.stock
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.user_id = $1 AND p.is_active
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Quantity already in the cart for a product/color pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
        color: Option<&str>,
    ) -> Result<i32, RepositoryError> {
        let qty: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity FROM cart_items
            WHERE user_id = $1 AND product_id = $2 AND COALESCE(color, '') = COALESCE($3, '')
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(color)
        .fetch_optional(self.pool)
        .await?;

        Ok(qty.unwrap_or(0))
    }

    /// Add `quantity` units, merging with an existing line for the same product and color.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        color: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity, color)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, COALESCE(color, '')) DO UPDATE
                SET quantity = cart_items.quantity + EXCLUDED.quantity,
                    updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(color)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Get one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_line(
        &self,
        user_id: UserId,
        line_id: CartItemId,
    ) -> Result<Option<StoredLine>, RepositoryError> {
        let line: Option<StoredLine> = sqlx::query_as(
            "SELECT id, product_id, quantity FROM cart_items WHERE id = $1 AND user_id = $2",
        )
        .bind(line_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(line)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the user.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(line_id)
        .bind(user_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the user.
    pub async fn remove(
        &self,
        user_id: UserId,
        line_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
