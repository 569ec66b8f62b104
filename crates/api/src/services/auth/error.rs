//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or mobile number missing or malformed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid credentials (wrong password, unknown user, or no password set).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// No OTP is pending for this identifier.
    #[error("no OTP requested")]
    OtpNotRequested,

    /// Submitted OTP does not match.
    #[error("invalid OTP")]
    InvalidOtp,

    /// OTP is past its expiry.
    #[error("OTP expired")]
    OtpExpired,

    /// Bearer token missing, malformed, or signed with another key.
    #[error("invalid token")]
    InvalidToken,

    /// Bearer token past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Admin bootstrap refused.
    #[error("admin bootstrap refused: {0}")]
    BootstrapRefused(&'static str),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
