//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client with a JSON body `{"message": "..."}`.
//! All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::google::GoogleAuthError;
use crate::services::orders::OrderError;
use crate::services::pricing::PricingError;
use crate::services::razorpay::RazorpayError;
use crate::services::sms::SmsError;
use crate::services::uploads::UploadError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Coupon or checkout validation failed.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Checkout or order lifecycle rule failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Razorpay API operation failed.
    #[error("Razorpay error: {0}")]
    Razorpay(#[from] RazorpayError),

    /// Twilio API operation failed.
    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    /// SMTP delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Google credential verification failed.
    #[error("Google auth error: {0}")]
    Google(#[from] GoogleAuthError),

    /// Upload rejected or could not be stored.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidIdentifier(msg) | AuthError::WeakPassword(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email or mobile number already exists".to_string(),
        ),
        AuthError::OtpNotRequested => (
            StatusCode::BAD_REQUEST,
            "Please request an OTP first".to_string(),
        ),
        AuthError::InvalidOtp => (StatusCode::BAD_REQUEST, "Invalid OTP".to_string()),
        AuthError::OtpExpired => (
            StatusCode::BAD_REQUEST,
            "OTP has expired, please request a new one".to_string(),
        ),
        AuthError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "Invalid or missing token".to_string(),
        ),
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "Session expired, please sign in again".to_string(),
        ),
        AuthError::BootstrapRefused(reason) => (StatusCode::FORBIDDEN, (*reason).to_string()),
        AuthError::Repository(err) => repository(err),
        AuthError::TokenSigning(_) | AuthError::PasswordHash => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn pricing(err: &PricingError) -> (StatusCode, String) {
    match err {
        PricingError::Repository(err) => repository(err),
        other => (StatusCode::BAD_REQUEST, other.to_string()),
    }
}

fn order(err: &OrderError) -> (StatusCode, String) {
    match err {
        OrderError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        OrderError::Pricing(err) => pricing(err),
        OrderError::Razorpay(_) => (
            StatusCode::BAD_GATEWAY,
            "Payment service error, please try again".to_string(),
        ),
        OrderError::Repository(err) => repository(err),
        OrderError::EmptyCart
        | OrderError::InvalidAddress(_)
        | OrderError::PaymentMethodUnavailable(_)
        | OrderError::Rejected(_)
        | OrderError::SignatureMismatch => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn google(err: &GoogleAuthError) -> (StatusCode, String) {
    match err {
        GoogleAuthError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            "Could not reach Google, please try again".to_string(),
        ),
        GoogleAuthError::EmailNotVerified => (
            StatusCode::UNAUTHORIZED,
            "Your Google email address is not verified".to_string(),
        ),
        GoogleAuthError::InvalidToken
        | GoogleAuthError::AudienceMismatch
        | GoogleAuthError::InvalidEmail(_) => (
            StatusCode::UNAUTHORIZED,
            "Invalid Google credential".to_string(),
        ),
    }
}

fn upload(err: &UploadError) -> (StatusCode, String) {
    match err {
        UploadError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        other => (StatusCode::BAD_REQUEST, other.to_string()),
    }
}

impl AppError {
    /// Status code and client-facing message. Server-side details are never exposed.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => auth(err),
            Self::Pricing(err) => pricing(err),
            Self::Order(err) => order(err),
            Self::Google(err) => google(err),
            Self::Upload(err) => upload(err),
            Self::Razorpay(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment service error, please try again".to_string(),
            ),
            Self::Sms(_) | Self::Email(_) => (
                StatusCode::BAD_GATEWAY,
                "Could not deliver the message, please try again".to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down".to_string(),
            ),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Build a Sentry breadcrumb with string data fields.
fn breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) -> sentry::Breadcrumb {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }
    breadcrumb
}

/// Record a checkout or payment step so later errors show how the order got there.
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", &[("order_number", "DRP-20260301-K7M2QX")]);
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    sentry::add_breadcrumb(breadcrumb(category, message, data));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::ServiceUnavailable("test".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(AuthError::OtpExpired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::BootstrapRefused("no").into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(PricingError::AlreadyUsed.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::Pricing(PricingError::CouponExpired).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("Slug already exists".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection string leaked".to_string());
        let (_, message) = err.status_and_message();
        assert_eq!(message, "Internal server error");

        let err = AppError::Order(OrderError::Rejected("Insufficient stock for Silk".to_string()));
        let (_, message) = err.status_and_message();
        assert_eq!(message, "Insufficient stock for Silk");
    }

    #[test]
    fn test_breadcrumb_carries_data() {
        let crumb = breadcrumb("payment", "Razorpay payment verified", &[("order_id", "11")]);
        assert_eq!(crumb.category.as_deref(), Some("payment"));
        assert_eq!(crumb.message.as_deref(), Some("Razorpay payment verified"));
        assert_eq!(
            crumb.data.get("order_id"),
            Some(&serde_json::Value::String("11".to_string()))
        );
    }
}
