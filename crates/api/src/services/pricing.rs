//! Coupon validation and checkout totals.
//!
//! The arithmetic is pure; `apply_coupon` adds the two lookups it needs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use drape_core::{DiscountType, PaymentMethod, UserId, percent_of, round_money};

use crate::db::{CouponRepository, RepositoryError};
use crate::models::{Coupon, StoreSettings};

/// Reasons a coupon cannot be applied. Each maps to a client-facing message.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Invalid coupon code")]
    CouponNotFound,

    #[error("This coupon has expired")]
    CouponExpired,

    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,

    #[error("You have already used this coupon")]
    AlreadyUsed,

    #[error("Minimum order amount for this coupon is ₹{0}")]
    MinimumNotMet(Decimal),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A coupon that passed validation, with the discount it grants.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedCoupon {
    #[serde(skip)]
    pub coupon: Coupon,
    pub code: String,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

/// Discount a coupon grants on `amount`, ignoring eligibility.
///
/// Flat coupons give `min(value, amount)`. Percent coupons give `value`% of
/// `amount` rounded to paise, capped at `max_discount` and at `amount`.
#[must_use]
pub fn coupon_discount(coupon: &Coupon, amount: Decimal) -> Decimal {
    let amount = amount.max(Decimal::ZERO);
    let raw = match coupon.discount_type {
        DiscountType::Flat => coupon.value,
        DiscountType::Percent => {
            let pct = percent_of(amount, coupon.value);
            coupon.max_discount.map_or(pct, |cap| pct.min(cap))
        }
    };
    round_money(raw.min(amount).max(Decimal::ZERO))
}

/// Check eligibility in order and return the discount.
///
/// Order: exists and active, not expired, usage limit, not already used by
/// this user, minimum order amount.
///
/// # Errors
///
/// Returns the first failing `PricingError`.
pub fn validate_coupon(
    coupon: Option<&Coupon>,
    already_used: bool,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, PricingError> {
    let coupon = coupon
        .filter(|c| c.is_active)
        .ok_or(PricingError::CouponNotFound)?;

    if coupon.expires_at.is_some_and(|at| now > at) {
        return Err(PricingError::CouponExpired);
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.used_count >= limit)
    {
        return Err(PricingError::UsageLimitReached);
    }
    if already_used {
        return Err(PricingError::AlreadyUsed);
    }
    if amount < coupon.min_order_amount {
        return Err(PricingError::MinimumNotMet(coupon.min_order_amount));
    }

    Ok(coupon_discount(coupon, amount))
}

/// Look up and validate `code` for `user_id` on `amount`, without redeeming it.
///
/// # Errors
///
/// Returns a `PricingError` describing why the coupon does not apply.
pub async fn apply_coupon(
    pool: &PgPool,
    code: &str,
    user_id: UserId,
    amount: Decimal,
) -> Result<AppliedCoupon, PricingError> {
    if amount <= Decimal::ZERO {
        return Err(PricingError::InvalidAmount);
    }

    let coupons = CouponRepository::new(pool);
    let coupon = coupons
        .get_by_code(code)
        .await?
        .ok_or(PricingError::CouponNotFound)?;
    let already_used = coupons.has_redeemed(coupon.id, user_id).await?;

    let discount = validate_coupon(Some(&coupon), already_used, amount, Utc::now())?;

    Ok(AppliedCoupon {
        code: coupon.code.clone(),
        discount,
        final_amount: amount - discount,
        coupon,
    })
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub upi_discount: Decimal,
    pub shipping_fee: Decimal,
    pub cod_fee: Decimal,
    pub total: Decimal,
}

/// Compute order totals from the cart subtotal and an already-validated coupon discount.
///
/// The UPI discount and the free-shipping threshold both apply to the
/// amount after the coupon.
#[must_use]
pub fn checkout_totals(
    subtotal: Decimal,
    coupon_discount: Decimal,
    method: PaymentMethod,
    settings: &StoreSettings,
) -> Totals {
    let after_coupon = (subtotal - coupon_discount).max(Decimal::ZERO);

    let upi_discount = match method {
        PaymentMethod::Upi if settings.upi_discount_percent > Decimal::ZERO => {
            percent_of(after_coupon, settings.upi_discount_percent)
        }
        _ => Decimal::ZERO,
    };
    let shipping_fee = settings.shipping_for(after_coupon);
    let cod_fee = match method {
        PaymentMethod::Cod => settings.cod_fee,
        _ => Decimal::ZERO,
    };

    let total =
        round_money(after_coupon - upi_discount + shipping_fee + cod_fee).max(Decimal::ZERO);

    Totals {
        subtotal,
        coupon_discount,
        upi_discount,
        shipping_fee,
        cod_fee,
        total,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use drape_core::CouponId;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn coupon(discount_type: DiscountType, value: &str) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "FESTIVE".to_string(),
            description: String::new(),
            discount_type,
            value: dec(value),
            min_order_amount: Decimal::ZERO,
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn settings() -> StoreSettings {
        StoreSettings {
            store_name: "Drape".to_string(),
            support_email: None,
            support_phone: None,
            currency: "INR".to_string(),
            shipping_fee: dec("99"),
            free_shipping_threshold: Some(dec("1999")),
            cod_enabled: true,
            cod_fee: dec("49"),
            upi_enabled: true,
            upi_vpa: Some("drape@upi".to_string()),
            upi_payee_name: Some("Drape".to_string()),
            upi_discount_percent: dec("5"),
            razorpay_enabled: true,
            return_window_days: 7,
            announcement: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_flat_discount_is_min_of_value_and_amount() {
        let c = coupon(DiscountType::Flat, "500");
        assert_eq!(coupon_discount(&c, dec("1200")), dec("500"));
        assert_eq!(coupon_discount(&c, dec("300")), dec("300"));
    }

    #[test]
    fn test_percent_discount_rounds_and_caps() {
        let mut c = coupon(DiscountType::Percent, "15");
        assert_eq!(coupon_discount(&c, dec("999.99")), dec("150.00"));

        c.max_discount = Some(dec("100"));
        assert_eq!(coupon_discount(&c, dec("999.99")), dec("100"));
        assert_eq!(coupon_discount(&c, dec("200")), dec("30.00"));
    }

    #[test]
    fn test_percent_discount_never_exceeds_amount() {
        let c = coupon(DiscountType::Percent, "100");
        assert_eq!(coupon_discount(&c, dec("450")), dec("450"));
    }

    #[test]
    fn test_validation_order() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Flat, "100");
        c.expires_at = Some(now - Duration::days(1));
        c.usage_limit = Some(1);
        c.used_count = 1;
        c.min_order_amount = dec("5000");

        assert!(matches!(
            validate_coupon(Some(&c), true, dec("10"), now),
            Err(PricingError::CouponExpired)
        ));
        c.expires_at = None;
        assert!(matches!(
            validate_coupon(Some(&c), true, dec("10"), now),
            Err(PricingError::UsageLimitReached)
        ));
        c.usage_limit = None;
        assert!(matches!(
            validate_coupon(Some(&c), true, dec("10"), now),
            Err(PricingError::AlreadyUsed)
        ));
        assert!(matches!(
            validate_coupon(Some(&c), false, dec("10"), now),
            Err(PricingError::MinimumNotMet(min)) if min == dec("5000")
        ));
        assert_eq!(
            validate_coupon(Some(&c), false, dec("6000"), now).unwrap(),
            dec("100")
        );
    }

    #[test]
    fn test_inactive_or_missing_coupon() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Flat, "100");
        c.is_active = false;
        assert!(matches!(
            validate_coupon(Some(&c), false, dec("500"), now),
            Err(PricingError::CouponNotFound)
        ));
        assert!(matches!(
            validate_coupon(None, false, dec("500"), now),
            Err(PricingError::CouponNotFound)
        ));
    }

    #[test]
    fn test_upi_totals() {
        let t = checkout_totals(dec("2000"), dec("200"), PaymentMethod::Upi, &settings());
        // 5% of 1800, shipping charged since 1800 < 1999
        assert_eq!(t.upi_discount, dec("90.00"));
        assert_eq!(t.shipping_fee, dec("99"));
        assert_eq!(t.cod_fee, Decimal::ZERO);
        assert_eq!(t.total, dec("1809.00"));
    }

    #[test]
    fn test_cod_totals_with_free_shipping() {
        let t = checkout_totals(dec("2500"), Decimal::ZERO, PaymentMethod::Cod, &settings());
        assert_eq!(t.shipping_fee, Decimal::ZERO);
        assert_eq!(t.cod_fee, dec("49"));
        assert_eq!(t.upi_discount, Decimal::ZERO);
        assert_eq!(t.total, dec("2549.00"));
    }

    #[test]
    fn test_razorpay_totals() {
        let t = checkout_totals(dec("1000"), dec("100"), PaymentMethod::Razorpay, &settings());
        assert_eq!(t.total, dec("999.00"));
    }
}
