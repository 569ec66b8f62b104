//! Order repository.
//!
//! Placement, cancellation and stock movements each run in a single
//! transaction. Status changes are conditional on the status the caller
//! validated against, so concurrent updates surface as `Conflict`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use drape_core::{
    CouponId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ReturnStatus, UserId,
};

use super::{RepositoryError, parse_column};
use crate::models::{Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, items, subtotal, coupon_discount, \
     upi_discount, shipping_fee, cod_fee, total, coupon_id, coupon_code, payment_method, \
     payment_status, order_status, shipping_address, razorpay_order_id, razorpay_payment_id, \
     upi_reference, return_status, return_reason, return_requested_at, delivered_at, \
     cancelled_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    subtotal: Decimal,
    coupon_discount: Decimal,
    upi_discount: Decimal,
    shipping_fee: Decimal,
    cod_fee: Decimal,
    total: Decimal,
    coupon_id: Option<CouponId>,
    coupon_code: Option<String>,
    payment_method: String,
    payment_status: String,
    order_status: String,
    shipping_address: Json<ShippingAddress>,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    upi_reference: Option<String>,
    return_status: String,
    return_reason: Option<String>,
    return_requested_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            order_number: r.order_number,
            user_id: r.user_id,
            items: r.items.0,
            subtotal: r.subtotal,
            coupon_discount: r.coupon_discount,
            upi_discount: r.upi_discount,
            shipping_fee: r.shipping_fee,
            cod_fee: r.cod_fee,
            total: r.total,
            coupon_id: r.coupon_id,
            coupon_code: r.coupon_code,
            payment_method: parse_column(&r.payment_method, "payment_method")?,
            payment_status: parse_column(&r.payment_status, "payment_status")?,
            order_status: parse_column(&r.order_status, "order_status")?,
            shipping_address: r.shipping_address.0,
            razorpay_order_id: r.razorpay_order_id,
            razorpay_payment_id: r.razorpay_payment_id,
            upi_reference: r.upi_reference,
            return_status: parse_column(&r.return_status, "return_status")?,
            return_reason: r.return_reason,
            return_requested_at: r.return_requested_at,
            delivered_at: r.delivered_at,
            cancelled_at: r.cancelled_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Everything needed to insert an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub upi_discount: Decimal,
    pub shipping_fee: Decimal,
    pub cod_fee: Decimal,
    pub total: Decimal,
    /// Coupon to redeem for `user_id` as part of placement.
    pub coupon: Option<(CouponId, String)>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub razorpay_order_id: Option<String>,
}

/// Admin listing filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// 1-based page number.
    pub page: i64,
    pub limit: i64,
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order: insert it, take stock, redeem the coupon and clear the cart.
    ///
    /// Nothing is written unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock ran out, the coupon was
    /// used up or already redeemed by this user since validation.
    pub async fn place(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in &new.items {
            let taken = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if taken.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "Insufficient stock for {}",
                    item.name
                )));
            }
        }

        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO orders
                (order_number, user_id, items, subtotal, coupon_discount, upi_discount,
                 shipping_fee, cod_fee, total, coupon_id, coupon_code, payment_method,
                 payment_status, order_status, shipping_address, razorpay_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&new.order_number)
        .bind(new.user_id)
        .bind(Json(&new.items))
        .bind(new.subtotal)
        .bind(new.coupon_discount)
        .bind(new.upi_discount)
        .bind(new.shipping_fee)
        .bind(new.cod_fee)
        .bind(new.total)
        .bind(new.coupon.as_ref().map(|(id, _)| *id))
        .bind(new.coupon.as_ref().map(|(_, code)| code.as_str()))
        .bind(new.payment_method.as_str())
        .bind(new.payment_status.as_str())
        .bind(new.order_status.as_str())
        .bind(Json(&new.shipping_address))
        .bind(new.razorpay_order_id.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        if let Some((coupon_id, _)) = &new.coupon {
            redeem_coupon(&mut tx, *coupon_id, new.user_id, row.id).await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(new.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Order::try_from(row)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Admin listing with optional status filters, returning the page and total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_filters(&mut query, filter);
        let (limit, offset) = super::limit_offset(filter.page, filter.limit);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<OrderRow> = query.build_query_as().fetch_all(self.pool).await?;
        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total))
    }

    /// Record a verified Razorpay payment: payment `paid`, order `confirmed`.
    ///
    /// Only Razorpay orders that are not cancelled and not yet paid are updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order can no longer take a
    /// payment.
    pub async fn record_razorpay_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET razorpay_payment_id = $2,
                payment_status = 'paid',
                order_status = CASE WHEN order_status = 'placed' THEN 'confirmed' ELSE order_status END,
                updated_at = NOW()
            WHERE id = $1
              AND payment_method = 'razorpay'
              AND order_status <> 'cancelled'
              AND payment_status <> 'paid'
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()?.ok_or_else(|| {
            RepositoryError::Conflict("This order can no longer accept a payment".to_string())
        })
    }

    /// Mark a payment attempt as failed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_payment_failed(&self, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET payment_status = 'failed', updated_at = NOW() \
             WHERE id = $1 AND payment_method = 'razorpay' \
               AND order_status <> 'cancelled' AND payment_status <> 'paid'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a UPI transaction reference for admin confirmation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_upi_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET upi_reference = $2, payment_status = 'awaiting_confirmation', updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Cancel an order that is still in `expected` status and put its stock back.
    ///
    /// Paid orders move to `refund_pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order status changed meanwhile.
    pub async fn cancel(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET order_status = 'cancelled',
                cancelled_at = NOW(),
                payment_status = CASE WHEN payment_status = 'paid' THEN 'refund_pending'
                                      ELSE payment_status END,
                updated_at = NOW()
            WHERE id = $1 AND order_status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.id)
        .bind(order.order_status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::Conflict(
                "Order status changed, please retry".to_string(),
            ));
        };

        restore_stock(&mut tx, &row.items.0).await?;

        tx.commit().await?;
        Order::try_from(row)
    }

    /// Apply an admin status change, conditional on the current order status.
    ///
    /// Moving to `delivered` stamps `delivered_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order status changed meanwhile.
    pub async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        order_status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET order_status = COALESCE($3, order_status),
                payment_status = COALESCE($4, payment_status),
                delivered_at = CASE WHEN $3 = 'delivered' THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1 AND order_status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(order_status.map(OrderStatus::as_str))
        .bind(payment_status.map(PaymentStatus::as_str))
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or_else(|| {
                RepositoryError::Conflict("Order status changed, please retry".to_string())
            })
    }

    /// Open a return request on a delivered order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a return already exists.
    pub async fn request_return(
        &self,
        id: OrderId,
        reason: &str,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET return_status = 'requested', return_reason = $2,
                return_requested_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND order_status = 'delivered' AND return_status = 'none'
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or_else(|| {
                RepositoryError::Conflict("A return already exists for this order".to_string())
            })
    }

    /// Move a return from `expected` to `next`, optionally updating the payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the return status changed meanwhile.
    pub async fn update_return(
        &self,
        id: OrderId,
        expected: ReturnStatus,
        next: ReturnStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET return_status = $3,
                payment_status = COALESCE($4, payment_status),
                updated_at = NOW()
            WHERE id = $1 AND return_status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(payment_status.map(PaymentStatus::as_str))
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or_else(|| {
                RepositoryError::Conflict("Return status changed, please retry".to_string())
            })
    }
}

/// Record a redemption and bump the usage counter, enforcing the usage limit.
async fn redeem_coupon(
    conn: &mut PgConnection,
    coupon_id: CouponId,
    user_id: UserId,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    let bumped = sqlx::query(
        r"
        UPDATE coupons SET used_count = used_count + 1, updated_at = NOW()
        WHERE id = $1 AND is_active AND (usage_limit IS NULL OR used_count < usage_limit)
        ",
    )
    .bind(coupon_id)
    .execute(&mut *conn)
    .await?;

    if bumped.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(
            "Coupon usage limit reached".to_string(),
        ));
    }

    sqlx::query("INSERT INTO coupon_redemptions (coupon_id, user_id, order_id) VALUES ($1, $2, $3)")
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("You have already used this coupon".to_string());
            }
            RepositoryError::Database(e)
        })?;

    Ok(())
}

async fn restore_stock(
    conn: &mut PgConnection,
    items: &[OrderItem],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    query.push(" WHERE TRUE");
    if let Some(status) = filter.order_status {
        query.push(" AND order_status = ").push_bind(status.as_str());
    }
    if let Some(status) = filter.payment_status {
        query.push(" AND payment_status = ").push_bind(status.as_str());
    }
}
