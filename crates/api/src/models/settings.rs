//! Store-wide settings (singleton row).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Store configuration editable from the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
    pub currency: String,
    pub shipping_fee: Decimal,
    /// Orders at or above this amount (after coupons) ship free.
    pub free_shipping_threshold: Option<Decimal>,
    pub cod_enabled: bool,
    pub cod_fee: Decimal,
    pub upi_enabled: bool,
    pub upi_vpa: Option<String>,
    pub upi_payee_name: Option<String>,
    pub upi_discount_percent: Decimal,
    pub razorpay_enabled: bool,
    pub return_window_days: i32,
    pub announcement: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoreSettings {
    /// Shipping charged on `amount` (subtotal after coupon discount).
    #[must_use]
    pub fn shipping_for(&self, amount: Decimal) -> Decimal {
        match self.free_shipping_threshold {
            Some(threshold) if amount >= threshold => Decimal::ZERO,
            _ => self.shipping_fee,
        }
    }
}
