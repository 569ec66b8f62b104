//! Store settings repository (singleton row `id = 1`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::StoreSettings;

const SETTINGS_COLUMNS: &str = "store_name, support_email, support_phone, currency, shipping_fee, \
     free_shipping_threshold, cod_enabled, cod_fee, upi_enabled, upi_vpa, upi_payee_name, \
     upi_discount_percent, razorpay_enabled, return_window_days, announcement, updated_at";

#[derive(sqlx::FromRow)]
struct SettingsRow {
    store_name: String,
    support_email: Option<String>,
    support_phone: Option<String>,
    currency: String,
    shipping_fee: Decimal,
    free_shipping_threshold: Option<Decimal>,
    cod_enabled: bool,
    cod_fee: Decimal,
    upi_enabled: bool,
    upi_vpa: Option<String>,
    upi_payee_name: Option<String>,
    upi_discount_percent: Decimal,
    razorpay_enabled: bool,
    return_window_days: i32,
    announcement: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for StoreSettings {
    fn from(r: SettingsRow) -> Self {
        Self {
            store_name: r.store_name,
            support_email: r.support_email,
            support_phone: r.support_phone,
            currency: r.currency,
            shipping_fee: r.shipping_fee,
            free_shipping_threshold: r.free_shipping_threshold,
            cod_enabled: r.cod_enabled,
            cod_fee: r.cod_fee,
            upi_enabled: r.upi_enabled,
            upi_vpa: r.upi_vpa,
            upi_payee_name: r.upi_payee_name,
            upi_discount_percent: r.upi_discount_percent,
            razorpay_enabled: r.razorpay_enabled,
            return_window_days: r.return_window_days,
            announcement: r.announcement,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for store settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read the settings row, creating it with defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<StoreSettings, RepositoryError> {
        sqlx::query("INSERT INTO store_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(self.pool)
            .await?;

        let row: SettingsRow = sqlx::query_as(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM store_settings WHERE id = 1"
        ))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Write every editable field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(&self, s: &StoreSettings) -> Result<StoreSettings, RepositoryError> {
        let row: SettingsRow = sqlx::query_as(&format!(
            r"
            INSERT INTO store_settings
                (id, store_name, support_email, support_phone, currency, shipping_fee,
                 free_shipping_threshold, cod_enabled, cod_fee, upi_enabled, upi_vpa,
                 upi_payee_name, upi_discount_percent, razorpay_enabled, return_window_days,
                 announcement, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW())
            ON CONFLICT (id) DO UPDATE SET
                store_name = EXCLUDED.store_name,
                support_email = EXCLUDED.support_email,
                support_phone = EXCLUDED.support_phone,
                currency = EXCLUDED.currency,
                shipping_fee = EXCLUDED.shipping_fee,
                free_shipping_threshold = EXCLUDED.free_shipping_threshold,
                cod_enabled = EXCLUDED.cod_enabled,
                cod_fee = EXCLUDED.cod_fee,
                upi_enabled = EXCLUDED.upi_enabled,
                upi_vpa = EXCLUDED.upi_vpa,
                upi_payee_name = EXCLUDED.upi_payee_name,
                upi_discount_percent = EXCLUDED.upi_discount_percent,
                razorpay_enabled = EXCLUDED.razorpay_enabled,
                return_window_days = EXCLUDED.return_window_days,
                announcement = EXCLUDED.announcement,
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "
        ))
        .bind(&s.store_name)
        .bind(s.support_email.as_deref())
        .bind(s.support_phone.as_deref())
        .bind(&s.currency)
        .bind(s.shipping_fee)
        .bind(s.free_shipping_threshold)
        .bind(s.cod_enabled)
        .bind(s.cod_fee)
        .bind(s.upi_enabled)
        .bind(s.upi_vpa.as_deref())
        .bind(s.upi_payee_name.as_deref())
        .bind(s.upi_discount_percent)
        .bind(s.razorpay_enabled)
        .bind(s.return_window_days)
        .bind(s.announcement.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
