//! Google Sign-In ID token verification.
//!
//! Tokens are checked against Google's `tokeninfo` endpoint, which validates
//! the signature and expiry; audience and email verification are checked here.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use drape_core::Email;

use crate::config::GoogleConfig;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Errors that can occur when verifying a Google credential.
#[derive(Debug, Error)]
pub enum GoogleAuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Google rejected the token.
    #[error("invalid Google credential")]
    InvalidToken,

    /// Token was issued for another client.
    #[error("credential audience mismatch")]
    AudienceMismatch,

    /// Google has not verified the email address.
    #[error("Google email not verified")]
    EmailNotVerified,

    /// Token carried no usable email.
    #[error("invalid email in credential: {0}")]
    InvalidEmail(String),
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    /// Stable Google account ID (`sub`).
    pub subject: String,
    pub email: Email,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    /// `"true"` / `"false"` as a string.
    #[serde(default)]
    email_verified: Option<String>,
    name: Option<String>,
}

impl TokenInfo {
    fn into_identity(self, client_id: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        if self.aud != client_id {
            return Err(GoogleAuthError::AudienceMismatch);
        }
        if self.email_verified.as_deref() != Some("true") {
            return Err(GoogleAuthError::EmailNotVerified);
        }
        let email = self
            .email
            .as_deref()
            .ok_or_else(|| GoogleAuthError::InvalidEmail("missing".to_string()))
            .and_then(|e| {
                Email::parse(e).map_err(|err| GoogleAuthError::InvalidEmail(err.to_string()))
            })?;

        Ok(GoogleIdentity {
            subject: self.sub,
            email,
            name: self.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Client for verifying Google ID tokens.
#[derive(Clone)]
pub struct GoogleAuthClient {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleAuthClient {
    #[must_use]
    pub fn new(config: &GoogleConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            client_id: config.client_id.clone(),
        }
    }

    /// Verify an ID token and return the identity it asserts.
    ///
    /// # Errors
    ///
    /// Returns `GoogleAuthError::InvalidToken` if Google rejects the token, or
    /// the audience/email checks fail.
    pub async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let mut url = Url::parse(TOKENINFO_URL).map_err(|_| GoogleAuthError::InvalidToken)?;
        url.query_pairs_mut().append_pair("id_token", credential);

        let response = self.client.get(url).send().await?;
        if response.status().is_client_error() {
            return Err(GoogleAuthError::InvalidToken);
        }

        let info: TokenInfo = response.error_for_status()?.json().await?;
        info.into_identity(&self.client_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn info(aud: &str, verified: &str) -> TokenInfo {
        serde_json::from_value(serde_json::json!({
            "aud": aud,
            "sub": "1234567890",
            "email": "Meera@Gmail.com",
            "email_verified": verified,
            "name": "Meera Iyer",
            "exp": "1767225600"
        }))
        .unwrap()
    }

    #[test]
    fn test_identity_from_valid_token() {
        let identity = info("client-1", "true").into_identity("client-1").unwrap();
        assert_eq!(identity.subject, "1234567890");
        assert_eq!(identity.email.as_str(), "meera@gmail.com");
        assert_eq!(identity.name.as_deref(), Some("Meera Iyer"));
    }

    #[test]
    fn test_audience_mismatch() {
        let err = info("someone-else", "true").into_identity("client-1").unwrap_err();
        assert!(matches!(err, GoogleAuthError::AudienceMismatch));
    }

    #[test]
    fn test_unverified_email() {
        let err = info("client-1", "false").into_identity("client-1").unwrap_err();
        assert!(matches!(err, GoogleAuthError::EmailNotVerified));
    }
}
