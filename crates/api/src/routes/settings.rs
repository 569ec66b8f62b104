//! Store settings routes.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::double_option;
use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::StoreSettings;
use crate::state::AppState;

/// Longest return window an admin can configure.
pub const MAX_RETURN_WINDOW_DAYS: i32 = 90;

/// Settings as the storefront sees them.
#[derive(Debug, Serialize)]
pub struct PublicSettings {
    #[serde(flatten)]
    pub settings: StoreSettings,
    /// Present only when Razorpay credentials are configured.
    pub razorpay_key_id: Option<String>,
}

fn public_view(state: &AppState, mut settings: StoreSettings) -> PublicSettings {
    let razorpay_key_id = state.razorpay().map(|c| c.key_id().to_string());
    settings.razorpay_enabled &= razorpay_key_id.is_some();
    PublicSettings {
        settings,
        razorpay_key_id,
    }
}

/// GET /api/settings
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn show(State(state): State<AppState>) -> Result<Json<PublicSettings>> {
    let settings = SettingsRepository::new(state.pool()).get().await?;
    Ok(Json(public_view(&state, settings)))
}

/// Partial settings update.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPayload {
    pub store_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub support_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub support_phone: Option<Option<String>>,
    pub shipping_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub free_shipping_threshold: Option<Option<Decimal>>,
    pub cod_enabled: Option<bool>,
    pub cod_fee: Option<Decimal>,
    pub upi_enabled: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub upi_vpa: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub upi_payee_name: Option<Option<String>>,
    pub upi_discount_percent: Option<Decimal>,
    pub razorpay_enabled: Option<bool>,
    pub return_window_days: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub announcement: Option<Option<String>>,
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

impl SettingsPayload {
    /// Apply onto `current` and validate the result.
    fn apply(self, mut current: StoreSettings) -> std::result::Result<StoreSettings, String> {
        if let Some(name) = self.store_name {
            let name = name.trim();
            if name.is_empty() {
                return Err("Store name cannot be empty".to_string());
            }
            current.store_name = name.to_string();
        }
        set(&mut current.support_email, self.support_email);
        set(&mut current.support_phone, self.support_phone);
        set(&mut current.shipping_fee, self.shipping_fee);
        set(&mut current.free_shipping_threshold, self.free_shipping_threshold);
        set(&mut current.cod_enabled, self.cod_enabled);
        set(&mut current.cod_fee, self.cod_fee);
        set(&mut current.upi_enabled, self.upi_enabled);
        set(&mut current.upi_vpa, self.upi_vpa);
        set(&mut current.upi_payee_name, self.upi_payee_name);
        set(&mut current.upi_discount_percent, self.upi_discount_percent);
        set(&mut current.razorpay_enabled, self.razorpay_enabled);
        set(&mut current.return_window_days, self.return_window_days);
        set(&mut current.announcement, self.announcement);

        if current.shipping_fee < Decimal::ZERO || current.cod_fee < Decimal::ZERO {
            return Err("Fees cannot be negative".to_string());
        }
        if current
            .free_shipping_threshold
            .is_some_and(|t| t < Decimal::ZERO)
        {
            return Err("Free shipping threshold cannot be negative".to_string());
        }
        if current.upi_discount_percent < Decimal::ZERO
            || current.upi_discount_percent > Decimal::ONE_HUNDRED
        {
            return Err("UPI discount must be between 0 and 100 percent".to_string());
        }
        if !(0..=MAX_RETURN_WINDOW_DAYS).contains(&current.return_window_days) {
            return Err(format!(
                "Return window must be between 0 and {MAX_RETURN_WINDOW_DAYS} days"
            ));
        }
        if current.upi_enabled && current.upi_vpa.as_deref().is_none_or(|v| !v.contains('@')) {
            return Err("UPI needs a valid VPA (name@bank)".to_string());
        }
        Ok(current)
    }
}

/// PUT /api/settings
///
/// # Errors
///
/// Returns 400 for invalid values.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<SettingsPayload>,
) -> Result<Json<PublicSettings>> {
    let settings = SettingsRepository::new(state.pool());
    let next = payload
        .apply(settings.get().await?)
        .map_err(AppError::BadRequest)?;
    let saved = settings.update(&next).await?;
    state.home_cache().invalidate();

    tracing::info!(admin_id = %admin.id, "Store settings updated");
    Ok(Json(public_view(&state, saved)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn current() -> StoreSettings {
        StoreSettings {
            store_name: "Drape".to_string(),
            support_email: None,
            support_phone: None,
            currency: "INR".to_string(),
            shipping_fee: Decimal::new(99, 0),
            free_shipping_threshold: Some(Decimal::new(1999, 0)),
            cod_enabled: true,
            cod_fee: Decimal::new(49, 0),
            upi_enabled: false,
            upi_vpa: None,
            upi_payee_name: None,
            upi_discount_percent: Decimal::ZERO,
            razorpay_enabled: true,
            return_window_days: 7,
            announcement: None,
            updated_at: Utc::now(),
        }
    }

    fn payload(json: serde_json::Value) -> SettingsPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let next = payload(serde_json::json!({ "cod_fee": "0", "free_shipping_threshold": null }))
            .apply(current())
            .unwrap();
        assert_eq!(next.cod_fee, Decimal::ZERO);
        assert!(next.free_shipping_threshold.is_none());
        assert_eq!(next.shipping_fee, Decimal::new(99, 0));
        assert_eq!(next.return_window_days, 7);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = payload(serde_json::json!({ "shipping_fee": "-1" }))
            .apply(current())
            .unwrap_err();
        assert_eq!(err, "Fees cannot be negative");

        let err = payload(serde_json::json!({ "upi_discount_percent": "101" }))
            .apply(current())
            .unwrap_err();
        assert_eq!(err, "UPI discount must be between 0 and 100 percent");

        let err = payload(serde_json::json!({ "return_window_days": 91 }))
            .apply(current())
            .unwrap_err();
        assert_eq!(err, "Return window must be between 0 and 90 days");
    }

    #[test]
    fn test_enabling_upi_needs_vpa() {
        let err = payload(serde_json::json!({ "upi_enabled": true }))
            .apply(current())
            .unwrap_err();
        assert_eq!(err, "UPI needs a valid VPA (name@bank)");

        let next = payload(serde_json::json!({ "upi_enabled": true, "upi_vpa": "drape@okicici" }))
            .apply(current())
            .unwrap();
        assert!(next.upi_enabled);
    }
}
