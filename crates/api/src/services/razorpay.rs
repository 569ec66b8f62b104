//! Razorpay Orders API client and payment signature verification.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use drape_core::{CURRENCY_CODE, to_paise};

use crate::config::RazorpayConfig;

const BASE_URL: &str = "https://api.razorpay.com/v1";

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when interacting with Razorpay.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount cannot be expressed in paise.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Order created on Razorpay's side; its `id` is handed to the checkout widget.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayClient {
    #[must_use]
    pub fn new(config: &RazorpayConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    /// Public key id, safe to expose to the browser.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a payment order for `amount` rupees.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid or the API request fails.
    #[tracing::instrument(skip(self), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        receipt: &str,
    ) -> Result<RazorpayOrder, RazorpayError> {
        let paise = to_paise(amount).ok_or(RazorpayError::InvalidAmount(amount))?;

        let response = self
            .client
            .post(format!("{BASE_URL}/orders"))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount: paise,
                currency: CURRENCY_CODE,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Check a checkout callback signature.
    #[must_use]
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(
            self.key_secret.expose_secret().as_bytes(),
            order_id,
            payment_id,
            signature,
        )
    }
}

/// Verify `hex(HMAC-SHA256(secret, "order_id|payment_id"))` in constant time.
#[must_use]
pub fn verify_payment_signature(
    secret: &[u8],
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let signature = sign(b"secret", "order_A1|pay_B2");
        assert!(verify_payment_signature(b"secret", "order_A1", "pay_B2", &signature));
    }

    #[test]
    fn test_signature_bound_to_ids_and_secret() {
        let signature = sign(b"secret", "order_A1|pay_B2");
        assert!(!verify_payment_signature(b"secret", "order_A1", "pay_B3", &signature));
        assert!(!verify_payment_signature(b"other", "order_A1", "pay_B2", &signature));
    }

    #[test]
    fn test_malformed_signature() {
        assert!(!verify_payment_signature(b"secret", "order_A1", "pay_B2", "not-hex"));
        assert!(!verify_payment_signature(b"secret", "order_A1", "pay_B2", ""));
    }
}
