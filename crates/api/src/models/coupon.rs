//! Coupon domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use drape_core::{CouponId, DiscountType};

/// A discount code.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Always upper-case.
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    /// Rupees for `flat`, percent for `percent`.
    pub value: Decimal,
    pub min_order_amount: Decimal,
    /// Cap for percent coupons.
    pub max_discount: Option<Decimal>,
    /// Total redemptions allowed; `None` is unlimited.
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
