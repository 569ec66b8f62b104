//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use drape_core::{
    CouponId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, ReturnStatus, UserId,
};

/// A product line frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub color: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ShippingAddress {
    /// Check required fields and the 6-digit PIN code.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("Shipping address {field} is required"));
        }

        let pincode = self.pincode.trim();
        if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
            return Err("Pincode must be 6 digits".to_string());
        }
        Ok(())
    }

    /// Address lines for display, skipping empty optional parts.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.name.clone(), self.line1.clone()];
        lines.extend(self.line2.iter().filter(|l| !l.is_empty()).cloned());
        lines.extend(self.landmark.iter().filter(|l| !l.is_empty()).cloned());
        lines.push(format!("{}, {} {}", self.city, self.state, self.pincode));
        lines.push(format!("Phone: {}", self.phone));
        lines
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing number, `DRP-YYYYMMDD-XXXXXX`.
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub upi_discount: Decimal,
    pub shipping_fee: Decimal,
    pub cod_fee: Decimal,
    pub total: Decimal,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub razorpay_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub razorpay_payment_id: Option<String>,
    pub upi_reference: Option<String>,
    pub return_status: ReturnStatus,
    pub return_reason: Option<String>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl Order {
    /// A minimal single-price order owned by `user_id`.
    pub(crate) fn for_tests(
        user_id: UserId,
        payment_method: PaymentMethod,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(11),
            order_number: "DRP-20260301-K7M2QX".to_string(),
            user_id,
            items: Vec::new(),
            subtotal: Decimal::new(2999, 0),
            coupon_discount: Decimal::ZERO,
            upi_discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            cod_fee: Decimal::ZERO,
            total: Decimal::new(2999, 0),
            coupon_id: None,
            coupon_code: None,
            payment_method,
            payment_status,
            order_status,
            shipping_address: ShippingAddress {
                name: "Meera Iyer".to_string(),
                phone: "9876543210".to_string(),
                line1: "12 Temple Street".to_string(),
                line2: None,
                landmark: None,
                city: "Chennai".to_string(),
                state: "Tamil Nadu".to_string(),
                pincode: "600004".to_string(),
            },
            razorpay_order_id: (payment_method == PaymentMethod::Razorpay)
                .then(|| "order_ABC".to_string()),
            razorpay_payment_id: None,
            upi_reference: None,
            return_status: ReturnStatus::NotRequested,
            return_reason: None,
            return_requested_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Meera Iyer".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 Temple Street".to_string(),
            line2: None,
            landmark: Some("Near the tank".to_string()),
            city: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
            pincode: "600004".to_string(),
        }
    }

    #[test]
    fn test_valid_address() {
        assert!(address().validate().is_ok());
    }

    #[test]
    fn test_missing_field() {
        let mut a = address();
        a.city = "  ".to_string();
        assert_eq!(
            a.validate().unwrap_err(),
            "Shipping address city is required"
        );
    }

    #[test]
    fn test_bad_pincode() {
        let mut a = address();
        a.pincode = "6000".to_string();
        assert!(a.validate().is_err());
        a.pincode = "60000A".to_string();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_address_lines() {
        let lines = address().lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "Chennai, Tamil Nadu 600004");
    }
}
