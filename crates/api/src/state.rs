//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::auth::TokenService;
use crate::services::email::EmailService;
use crate::services::google::GoogleAuthClient;
use crate::services::home::HomeCache;
use crate::services::razorpay::RazorpayClient;
use crate::services::sms::TwilioClient;
use crate::services::uploads::UploadStore;

/// Outbound HTTP timeout for vendor APIs.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, vendor clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenService,
    home_cache: HomeCache,
    uploads: UploadStore,
    razorpay: Option<RazorpayClient>,
    sms: Option<TwilioClient>,
    email: Option<EmailService>,
    google: Option<GoogleAuthClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Vendor clients are built only for the integrations that are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or SMTP transport cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("drape-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let razorpay = config
            .razorpay
            .as_ref()
            .map(|c| RazorpayClient::new(c, http.clone()));
        let sms = config
            .twilio
            .as_ref()
            .map(|c| TwilioClient::new(c, http.clone()));
        let email = config.smtp.as_ref().map(EmailService::new).transpose()?;
        let google = config
            .google
            .as_ref()
            .map(|c| GoogleAuthClient::new(c, http.clone()));

        let tokens = TokenService::new(&config.jwt);
        let uploads = UploadStore::new(config.uploads.dir.clone(), config.uploads.max_bytes);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                home_cache: HomeCache::new(),
                uploads,
                razorpay,
                sms,
                email,
                google,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// JWT issuing and validation.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn home_cache(&self) -> &HomeCache {
        &self.inner.home_cache
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    /// Razorpay client, when configured.
    #[must_use]
    pub fn razorpay(&self) -> Option<&RazorpayClient> {
        self.inner.razorpay.as_ref()
    }

    /// Twilio client, when configured.
    #[must_use]
    pub fn sms(&self) -> Option<&TwilioClient> {
        self.inner.sms.as_ref()
    }

    /// SMTP client, when configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Google credential verifier, when configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleAuthClient> {
        self.inner.google.as_ref()
    }
}
