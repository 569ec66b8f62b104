//! Twilio client for OTP delivery over SMS and WhatsApp.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use drape_core::Mobile;

use crate::config::TwilioConfig;
use crate::services::auth::otp::OTP_TTL_MINUTES;

const BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Errors that can occur when sending a message through Twilio.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Twilio rejected the message.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// WhatsApp requested but no WhatsApp sender is configured.
    #[error("WhatsApp sender not configured")]
    WhatsAppDisabled,
}

/// Delivery channel for a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Sms,
    Whatsapp,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: String,
}

/// Twilio Messages API client.
#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    whatsapp_from: Option<String>,
}

impl TwilioClient {
    #[must_use]
    pub fn new(config: &TwilioConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            whatsapp_from: config.whatsapp_from.clone(),
        }
    }

    /// Send a sign-in code to `to`.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unavailable or Twilio rejects the request.
    pub async fn send_otp(
        &self,
        to: &Mobile,
        store_name: &str,
        code: &str,
        channel: Channel,
    ) -> Result<(), SmsError> {
        let body = format!(
            "{code} is your {store_name} sign-in code. It expires in {OTP_TTL_MINUTES} minutes."
        );
        self.send(to, &body, channel).await
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unavailable or Twilio rejects the request.
    pub async fn send(&self, to: &Mobile, body: &str, channel: Channel) -> Result<(), SmsError> {
        let (from, to_address) = self.addresses(to, channel)?;
        let url = format!("{BASE_URL}/Accounts/{}/Messages.json", self.account_sid);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("From", from.as_str()), ("To", to_address.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TwilioErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_default();
            tracing::warn!(status = status.as_u16(), error = %message, "Twilio rejected message");
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to.masked(), ?channel, "Message sent");
        Ok(())
    }

    fn addresses(&self, to: &Mobile, channel: Channel) -> Result<(String, String), SmsError> {
        match channel {
            Channel::Sms => Ok((self.from_number.clone(), to.as_str().to_string())),
            Channel::Whatsapp => {
                let from = self
                    .whatsapp_from
                    .as_deref()
                    .ok_or(SmsError::WhatsAppDisabled)?;
                Ok((format!("whatsapp:{from}"), format!("whatsapp:{}", to.as_str())))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(whatsapp: Option<&str>) -> TwilioClient {
        TwilioClient::new(
            &TwilioConfig {
                account_sid: "AC123".to_string(),
                auth_token: SecretString::from("token"),
                from_number: "+15005550006".to_string(),
                whatsapp_from: whatsapp.map(str::to_string),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_sms_addresses() {
        let to = Mobile::parse("9876543210").unwrap();
        let (from, to) = client(None).addresses(&to, Channel::Sms).unwrap();
        assert_eq!(from, "+15005550006");
        assert_eq!(to, "+919876543210");
    }

    #[test]
    fn test_whatsapp_addresses_are_prefixed() {
        let to = Mobile::parse("9876543210").unwrap();
        let (from, to) = client(Some("+14155238886"))
            .addresses(&to, Channel::Whatsapp)
            .unwrap();
        assert_eq!(from, "whatsapp:+14155238886");
        assert_eq!(to, "whatsapp:+919876543210");
    }

    #[test]
    fn test_whatsapp_requires_sender() {
        let to = Mobile::parse("9876543210").unwrap();
        assert!(matches!(
            client(None).addresses(&to, Channel::Whatsapp),
            Err(SmsError::WhatsAppDisabled)
        ));
    }
}
