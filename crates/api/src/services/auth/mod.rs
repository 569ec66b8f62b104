//! Authentication service.
//!
//! Provides password, OTP and Google authentication plus bearer tokens.

mod error;
pub mod otp;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenService};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use drape_core::{Email, Mobile, UserId};

use crate::db::RepositoryError;
use crate::db::users::{ProfileUpdate, UserRepository};
use crate::models::{Identifier, User};
use crate::services::google::GoogleIdentity;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input is bounded to keep hashing cheap).
const MAX_PASSWORD_LENGTH: usize = 128;

/// A freshly issued OTP, ready for delivery.
#[derive(Debug)]
pub struct IssuedOtp {
    pub user: User,
    pub code: String,
}

/// Authentication service.
///
/// Handles registration, login and OTP flows on top of the user repository.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidIdentifier` if neither email nor mobile is valid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email or mobile is already registered.
    pub async fn register_with_password(
        &self,
        name: &str,
        email: Option<&str>,
        mobile: Option<&str>,
        password: &str,
    ) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidIdentifier("Name is required".to_string()));
        }

        let email = parse_optional(email, Email::parse, "email")?;
        let mobile = parse_optional(mobile, Mobile::parse, "mobile number")?;
        if email.is_none() && mobile.is_none() {
            return Err(AuthError::InvalidIdentifier(
                "Email or mobile number is required".to_string(),
            ));
        }

        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create_with_password(name, email.as_ref(), mobile.as_ref(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email or mobile and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier/password is wrong
    /// or the account has no password.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let identifier =
            Identifier::parse(identifier).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // OTP Authentication
    // =========================================================================

    /// Issue an OTP for the identifier, creating the account on first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn issue_otp(&self, identifier: &Identifier) -> Result<IssuedOtp, AuthError> {
        let code = otp::generate_otp();
        let user = self
            .users
            .upsert_otp(identifier, &code, otp::otp_expiry(Utc::now()))
            .await?;

        tracing::info!(user_id = %user.id, "OTP issued");
        Ok(IssuedOtp { user, code })
    }

    /// Verify a submitted OTP and consume it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpNotRequested` for unknown identifiers,
    /// `AuthError::OtpExpired` or `AuthError::InvalidOtp` otherwise.
    pub async fn verify_otp(&self, identifier: &Identifier, code: &str) -> Result<User, AuthError> {
        let state = self
            .users
            .get_otp(identifier)
            .await?
            .ok_or(AuthError::OtpNotRequested)?;

        otp::check_otp(state.code.as_deref(), state.expires_at, code, Utc::now())?;
        self.users.clear_otp(state.user.id).await?;

        Ok(state.user)
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Find, link or create the user for a verified Google identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn login_with_google(&self, identity: &GoogleIdentity) -> Result<User, AuthError> {
        if let Some(user) = self.users.get_by_google_id(&identity.subject).await? {
            return Ok(user);
        }

        let name = identity.name.as_deref().unwrap_or_default();
        let by_email = Identifier::Email(identity.email.clone());
        if let Some(user) = self.users.get_by_identifier(&by_email).await? {
            tracing::info!(user_id = %user.id, "Linking Google account to existing user");
            return Ok(self.users.link_google(user.id, &identity.subject, name).await?);
        }

        Ok(self
            .users
            .create_from_google(name, &identity.email, &identity.subject)
            .await?)
    }

    // =========================================================================
    // Profile & Admin
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the user no longer exists.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Update name, email and/or mobile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidIdentifier` for malformed values and
    /// `AuthError::UserAlreadyExists` if the email or mobile is taken.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: Option<&str>,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            email: parse_optional(email, Email::parse, "email")?,
            mobile: parse_optional(mobile, Mobile::parse, "mobile number")?,
        };

        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Promote the first admin using the configured setup key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BootstrapRefused` if no key is configured, the key
    /// does not match, an admin already exists, or the user is unknown.
    pub async fn bootstrap_admin(
        &self,
        configured_key: Option<&SecretString>,
        provided_key: &str,
        identifier: &str,
    ) -> Result<User, AuthError> {
        let Some(configured_key) = configured_key else {
            return Err(AuthError::BootstrapRefused("admin setup is disabled"));
        };
        if !constant_time_eq(
            configured_key.expose_secret().as_bytes(),
            provided_key.as_bytes(),
        ) {
            return Err(AuthError::BootstrapRefused("invalid setup key"));
        }
        if self.users.admin_exists().await? {
            return Err(AuthError::BootstrapRefused("an admin already exists"));
        }

        let identifier = Identifier::parse(identifier)
            .map_err(|_| AuthError::BootstrapRefused("unknown user"))?;
        let user = self
            .users
            .get_by_identifier(&identifier)
            .await?
            .ok_or(AuthError::BootstrapRefused("unknown user"))?;

        let admin = self.users.set_admin(user.id, true).await?;
        tracing::warn!(user_id = %admin.id, "Admin bootstrapped via setup key");
        Ok(admin)
    }
}

fn parse_optional<T, E: std::fmt::Display>(
    value: Option<&str>,
    parse: impl Fn(&str) -> Result<T, E>,
    what: &str,
) -> Result<Option<T>, AuthError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| parse(v).map_err(|e| AuthError::InvalidIdentifier(format!("Invalid {what}: {e}"))))
        .transpose()
}

/// Compare two byte strings without short-circuiting on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Validate password meets requirements.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"setup-key", b"setup-key"));
        assert!(!constant_time_eq(b"setup-key", b"setup-kez"));
        assert!(!constant_time_eq(b"setup", b"setup-key"));
    }

    #[test]
    fn test_parse_optional_skips_blank() {
        let parsed = parse_optional(Some("  "), Email::parse, "email").unwrap();
        assert!(parsed.is_none());
        assert!(matches!(
            parse_optional(Some("nope"), Email::parse, "email"),
            Err(AuthError::InvalidIdentifier(msg)) if msg.starts_with("Invalid email")
        ));
    }
}
