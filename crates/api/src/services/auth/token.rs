//! Bearer token issuing and validation (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use drape_core::UserId;

use super::AuthError;
use crate::config::JwtConfig;
use crate::models::User;

/// Claims carried in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Whether the user was an admin when the token was issued.
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    /// The user the token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Signs and validates access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
    issuer: String,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_bytes()),
            validation,
            expiry: Duration::days(config.expiry_days),
            issuer: config.issuer.clone(),
        }
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if encoding fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            admin: user.is_admin,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
            iss: self.issuer.clone(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` or `AuthError::InvalidToken`.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Extract the token from an `Authorization` header value.
    #[must_use]
    pub fn from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(expiry_days: i64) -> JwtConfig {
        JwtConfig {
            secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            expiry_days,
            issuer: "drape-api".to_string(),
        }
    }

    fn user(is_admin: bool) -> User {
        User {
            id: UserId::new(42),
            name: "Meera".to_string(),
            email: None,
            mobile: Some(drape_core::Mobile::parse("9876543210").unwrap()),
            has_password: false,
            google_linked: false,
            is_admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let service = TokenService::new(&config(7));
        let token = service.issue(&user(true)).unwrap();
        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert!(claims.admin);
        assert_eq!(claims.iss, "drape-api");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(&config(-1));
        let token = service.issue(&user(false)).unwrap();
        assert!(matches!(service.validate(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let token = TokenService::new(&config(7)).issue(&user(false)).unwrap();
        let other = TokenService::new(&JwtConfig {
            secret: SecretString::from("zZ9#yY8@xX7!wW6$vV5%uU4^tT3&sS2*"),
            ..config(7)
        });
        assert!(matches!(other.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_from_header() {
        assert_eq!(TokenService::from_header("Bearer abc.def"), Some("abc.def"));
        assert_eq!(TokenService::from_header("Basic abc"), None);
        assert_eq!(TokenService::from_header("Bearer "), None);
    }
}
