//! Coupon routes: customer apply and admin CRUD.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use drape_core::{CouponId, DiscountType};

use super::double_option;
use crate::db::CouponRepository;
use crate::db::coupons::CouponInput;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Coupon;
use crate::services::pricing::{AppliedCoupon, apply_coupon};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
    pub amount: Decimal,
}

/// Preview a coupon's discount without redeeming it.
///
/// POST /api/coupons/apply
///
/// # Errors
///
/// Returns 400 with the reason the coupon does not apply.
pub async fn apply(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<ApplyCouponRequest>,
) -> Result<Json<AppliedCoupon>> {
    let code = req.code.trim().to_uppercase();
    let applied = apply_coupon(state.pool(), &code, user.id, req.amount).await?;
    Ok(Json(applied))
}

/// Coupon create/update body. On update, omitted fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct CouponPayload {
    pub code: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_discount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub usage_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
}

impl CouponPayload {
    fn into_input(self, existing: Option<&Coupon>) -> std::result::Result<CouponInput, String> {
        let code = self
            .code
            .map(|c| c.trim().to_uppercase())
            .or_else(|| existing.map(|c| c.code.clone()))
            .filter(|c| !c.is_empty())
            .ok_or("Coupon code is required")?;
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err("Coupon code may only contain letters, digits, '-' and '_'".to_string());
        }

        let discount_type = self
            .discount_type
            .or_else(|| existing.map(|c| c.discount_type))
            .ok_or("Discount type is required")?;
        let value = self
            .value
            .or_else(|| existing.map(|c| c.value))
            .ok_or("Discount value is required")?;
        match discount_type {
            DiscountType::Percent if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED => {
                return Err("Percent discount must be between 0 and 100".to_string());
            }
            DiscountType::Flat if value <= Decimal::ZERO => {
                return Err("Flat discount must be greater than zero".to_string());
            }
            _ => {}
        }

        let min_order_amount = self
            .min_order_amount
            .or_else(|| existing.map(|c| c.min_order_amount))
            .unwrap_or(Decimal::ZERO);
        if min_order_amount < Decimal::ZERO {
            return Err("Minimum order amount cannot be negative".to_string());
        }

        let max_discount = self
            .max_discount
            .unwrap_or_else(|| existing.and_then(|c| c.max_discount));
        if max_discount.is_some_and(|m| m <= Decimal::ZERO) {
            return Err("Maximum discount must be greater than zero".to_string());
        }

        let usage_limit = self
            .usage_limit
            .unwrap_or_else(|| existing.and_then(|c| c.usage_limit));
        if usage_limit.is_some_and(|l| l < 1) {
            return Err("Usage limit must be at least 1".to_string());
        }

        Ok(CouponInput {
            code,
            description: self
                .description
                .or_else(|| existing.map(|c| c.description.clone()))
                .unwrap_or_default(),
            discount_type,
            value,
            min_order_amount,
            max_discount,
            usage_limit,
            expires_at: self
                .expires_at
                .unwrap_or_else(|| existing.and_then(|c| c.expires_at)),
            is_active: self
                .is_active
                .or_else(|| existing.map(|c| c.is_active))
                .unwrap_or(true),
        })
    }
}

/// GET /api/coupons
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Coupon>>> {
    Ok(Json(CouponRepository::new(state.pool()).list().await?))
}

/// POST /api/coupons
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 for a duplicate code.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CouponPayload>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let input = payload.into_input(None).map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool()).create(&input).await?;

    tracing::info!(
        coupon_id = %coupon.id,
        code = %coupon.code,
        admin_id = %admin.id,
        "Coupon created"
    );
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// PUT /api/coupons/{id}
///
/// # Errors
///
/// Returns 404 for unknown coupons, 400 for invalid fields and 409 for a duplicate code.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(payload): Json<CouponPayload>,
) -> Result<Json<Coupon>> {
    let coupons = CouponRepository::new(state.pool());
    let existing = coupons
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    let input = payload
        .into_input(Some(&existing))
        .map_err(AppError::BadRequest)?;
    let coupon = coupons.update(id, &input).await?;

    tracing::info!(coupon_id = %id, admin_id = %admin.id, "Coupon updated");
    Ok(Json(coupon))
}

/// DELETE /api/coupons/{id}
///
/// # Errors
///
/// Returns 404 for unknown coupons.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    CouponRepository::new(state.pool()).delete(id).await?;
    tracing::info!(coupon_id = %id, admin_id = %admin.id, "Coupon deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> CouponPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_code_is_upper_cased() {
        let input = payload(serde_json::json!({
            "code": " festive10 ",
            "discount_type": "percent",
            "value": "10"
        }))
        .into_input(None)
        .unwrap();
        assert_eq!(input.code, "FESTIVE10");
        assert_eq!(input.min_order_amount, Decimal::ZERO);
        assert!(input.is_active);
    }

    #[test]
    fn test_percent_bounds() {
        let over = payload(serde_json::json!({
            "code": "BIG", "discount_type": "percent", "value": "100.5"
        }))
        .into_input(None);
        assert_eq!(over.unwrap_err(), "Percent discount must be between 0 and 100");

        let full = payload(serde_json::json!({
            "code": "FREE", "discount_type": "percent", "value": "100"
        }))
        .into_input(None);
        assert!(full.is_ok());
    }

    #[test]
    fn test_flat_must_be_positive() {
        let err = payload(serde_json::json!({
            "code": "ZERO", "discount_type": "flat", "value": "0"
        }))
        .into_input(None)
        .unwrap_err();
        assert_eq!(err, "Flat discount must be greater than zero");
    }

    #[test]
    fn test_rejects_bad_code_and_limits() {
        let err = payload(serde_json::json!({
            "code": "TEN OFF", "discount_type": "flat", "value": "10"
        }))
        .into_input(None)
        .unwrap_err();
        assert!(err.starts_with("Coupon code may only contain"));

        let err = payload(serde_json::json!({
            "code": "TEN", "discount_type": "flat", "value": "10", "usage_limit": 0
        }))
        .into_input(None)
        .unwrap_err();
        assert_eq!(err, "Usage limit must be at least 1");
    }
}
