//! One-time passwords for passwordless login.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::{AuthError, constant_time_eq};

/// How long an OTP stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Generate a 6-digit OTP.
#[must_use]
pub fn generate_otp() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Expiry for an OTP issued at `now`.
#[must_use]
pub fn otp_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// Check a submitted OTP against the stored one.
///
/// # Errors
///
/// - `OtpNotRequested` if nothing is stored
/// - `OtpExpired` if `now` is past the expiry
/// - `InvalidOtp` if the codes differ
pub fn check_otp(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return Err(AuthError::OtpNotRequested);
    };

    if now > expires_at {
        return Err(AuthError::OtpExpired);
    }

    if !constant_time_eq(stored.as_bytes(), submitted.trim().as_bytes()) {
        return Err(AuthError::InvalidOtp);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_format() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_check_otp_valid() {
        let now = Utc::now();
        assert!(check_otp(Some("123456"), Some(otp_expiry(now)), " 123456 ", now).is_ok());
    }

    #[test]
    fn test_check_otp_rejects_expired() {
        let issued = Utc::now() - Duration::minutes(OTP_TTL_MINUTES + 1);
        let err = check_otp(Some("123456"), Some(otp_expiry(issued)), "123456", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::OtpExpired));
    }

    #[test]
    fn test_check_otp_rejects_wrong_code() {
        let now = Utc::now();
        let err = check_otp(Some("123456"), Some(otp_expiry(now)), "654321", now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp));
    }

    #[test]
    fn test_check_otp_without_request() {
        let err = check_otp(None, None, "123456", Utc::now()).unwrap_err();
        assert!(matches!(err, AuthError::OtpNotRequested));
    }
}
