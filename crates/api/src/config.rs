//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DRAPE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `DRAPE_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `DRAPE_HOST` - Bind address (default: 127.0.0.1)
//! - `DRAPE_PORT` - Listen port (default: 5000)
//! - `DRAPE_PUBLIC_URL` - Public URL of the API (default: `http://localhost:5000`)
//! - `DRAPE_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `DRAPE_JWT_EXPIRY_DAYS` - Token lifetime in days (default: 7)
//! - `DRAPE_UPLOAD_DIR` - Directory for uploaded images (default: uploads)
//! - `DRAPE_MAX_UPLOAD_MB` - Per-file upload limit (default: 5)
//! - `DRAPE_OTP_DEV_MODE` - Echo OTPs in responses when delivery fails (default: false)
//! - `DRAPE_ADMIN_SETUP_KEY` - Key accepted by `/api/auth/bootstrap-admin`
//! - `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET` - Razorpay credentials
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM_NUMBER` - Twilio SMS
//! - `TWILIO_WHATSAPP_FROM` - Twilio WhatsApp sender (optional on top of SMS)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - Email OTP
//! - `GOOGLE_CLIENT_ID` - Google Sign-In client ID
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking
//!
//! Third-party groups are all-or-nothing: setting only some of a group's
//! variables is a configuration error.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub public_url: String,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Local upload storage
    pub uploads: UploadConfig,
    /// Echo OTPs in API responses when they cannot be delivered
    pub otp_dev_mode: bool,
    /// Key that allows promoting the first admin over HTTP
    pub admin_setup_key: Option<SecretString>,
    /// Razorpay credentials
    pub razorpay: Option<RazorpayConfig>,
    /// Twilio SMS / WhatsApp credentials
    pub twilio: Option<TwilioConfig>,
    /// SMTP credentials for email OTP
    pub smtp: Option<SmtpConfig>,
    /// Google Sign-In
    pub google: Option<GoogleConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret
    pub secret: SecretString,
    /// Token lifetime in days
    pub expiry_days: i64,
    /// `iss` claim
    pub issuer: String,
}

/// Upload storage configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory files are written to and served from
    pub dir: PathBuf,
    /// Per-file size limit in bytes
    pub max_bytes: usize,
}

/// Razorpay API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (sent to the browser checkout)
    pub key_id: String,
    /// Key secret (server-side only, also the signature key)
    pub key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Twilio credentials.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID
    pub account_sid: String,
    /// Auth token
    pub auth_token: SecretString,
    /// SMS sender number
    pub from_number: String,
    /// WhatsApp sender number, without the `whatsapp:` prefix
    pub whatsapp_from: Option<String>,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("whatsapp_from", &self.whatsapp_from)
            .finish()
    }
}

/// SMTP configuration for transactional email.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP port (STARTTLS)
    pub port: u16,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: SecretString,
    /// `From:` address
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Google Sign-In configuration.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client ID the ID token audience must match
    pub client_id: String,
}

/// Source of configuration values, keyed by variable name.
trait Env {
    fn get(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl Env for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl Env for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| (*v).to_owned())
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::load(&ProcessEnv)
    }

    fn load(env: &impl Env) -> Result<Self, ConfigError> {
        let database_url = env
            .get("DRAPE_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DRAPE_DATABASE_URL".to_string()))?;

        let host = parse_env(env, "DRAPE_HOST", "127.0.0.1")?;
        let port = parse_env(env, "DRAPE_PORT", "5000")?;
        let public_url = env
            .get("DRAPE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));
        let cors_origins = env
            .get("DRAPE_CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let jwt_secret = get_required_env(env, "DRAPE_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "DRAPE_JWT_SECRET")?;
        validate_secret_strength(&jwt_secret, "DRAPE_JWT_SECRET")?;
        let jwt = JwtConfig {
            secret: SecretString::from(jwt_secret),
            expiry_days: parse_env(env, "DRAPE_JWT_EXPIRY_DAYS", "7")?,
            issuer: "drape-api".to_string(),
        };

        let max_upload_mb: usize = parse_env(env, "DRAPE_MAX_UPLOAD_MB", "5")?;
        let uploads = UploadConfig {
            dir: PathBuf::from(env.get("DRAPE_UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            max_bytes: max_upload_mb * 1024 * 1024,
        };

        let otp_dev_mode = parse_bool(env, "DRAPE_OTP_DEV_MODE")?;
        let admin_setup_key = env.get("DRAPE_ADMIN_SETUP_KEY").map(SecretString::from);

        let razorpay = get_group(env, &["RAZORPAY_KEY_ID", "RAZORPAY_KEY_SECRET"])?.map(
            |[key_id, key_secret]| RazorpayConfig {
                key_id,
                key_secret: SecretString::from(key_secret),
            },
        );

        let twilio = get_group(
            env,
            &["TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN", "TWILIO_FROM_NUMBER"],
        )?
        .map(|[account_sid, auth_token, from_number]| TwilioConfig {
            account_sid,
            auth_token: SecretString::from(auth_token),
            from_number,
            whatsapp_from: env.get("TWILIO_WHATSAPP_FROM"),
        });

        let smtp = match get_group(
            env,
            &[
                "SMTP_HOST",
                "SMTP_PORT",
                "SMTP_USERNAME",
                "SMTP_PASSWORD",
                "SMTP_FROM",
            ],
        )? {
            Some([host, port, username, password, from_address]) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string())
                    })?,
                username,
                password: SecretString::from(password),
                from_address,
            }),
            None => None,
        };

        let google = env
            .get("GOOGLE_CLIENT_ID")
            .map(|client_id| GoogleConfig { client_id });

        Ok(Self {
            database_url,
            host,
            port,
            public_url,
            cors_origins,
            jwt,
            uploads,
            otp_dev_mode,
            admin_setup_key,
            razorpay,
            twilio,
            smtp,
            google,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env(env, "SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env(env, "SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
impl ApiConfig {
    /// Minimal valid configuration with no third-party integrations.
    #[allow(clippy::unwrap_used)]
    pub(crate) fn for_tests() -> Self {
        Self::load(&HashMap::from([
            ("DRAPE_DATABASE_URL", "postgres://localhost/drape_test"),
            ("DRAPE_JWT_SECRET", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            ("DRAPE_UPLOAD_DIR", "target/test-uploads"),
        ]))
        .unwrap()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &impl Env, key: &str) -> Result<String, ConfigError> {
    env.get(key)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(env: &impl Env, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env.get(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag (`true`/`1`/`yes`/`on`), unset meaning `false`.
fn parse_bool(env: &impl Env, key: &str) -> Result<bool, ConfigError> {
    match env.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected a boolean, got '{other}'"),
            )),
        },
    }
}

/// Read an all-or-nothing group of variables.
///
/// Returns `None` when none are set, and an error naming the first missing
/// key when only some are.
fn get_group<const N: usize>(
    env: &impl Env,
    keys: &[&str; N],
) -> Result<Option<[String; N]>, ConfigError> {
    let values = keys.map(|key| env.get(key));
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }

    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, (key, value)) in out.iter_mut().zip(keys.iter().zip(values)) {
        *slot = value.ok_or_else(|| ConfigError::MissingEnvVar((*key).to_string()))?;
    }
    Ok(Some(out))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

impl JwtConfig {
    /// Raw secret bytes for the signing keys.
    #[must_use]
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DRAPE_DATABASE_URL", "postgres://localhost/drape"),
            ("DRAPE_JWT_SECRET", STRONG_SECRET),
        ])
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-jwt-key-here-please", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(STRONG_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length("short", "TEST").is_err());
        assert!(validate_secret_length(&"x".repeat(32), "TEST").is_ok());
    }

    #[test]
    fn test_load_defaults() {
        let config = ApiConfig::load(&base_env()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.public_url, "http://localhost:5000");
        assert_eq!(config.jwt.expiry_days, 7);
        assert_eq!(config.uploads.max_bytes, 5 * 1024 * 1024);
        assert!(!config.otp_dev_mode);
        assert!(config.razorpay.is_none());
        assert!(config.twilio.is_none());
        assert!(config.smtp.is_none());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_load_database_url_fallback() {
        let mut env = base_env();
        env.remove("DRAPE_DATABASE_URL");
        env.insert("DATABASE_URL", "postgres://fly/drape");
        let config = ApiConfig::load(&env).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fly/drape");
    }

    #[test]
    fn test_load_missing_jwt_secret() {
        let mut env = base_env();
        env.remove("DRAPE_JWT_SECRET");
        let err = ApiConfig::load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "DRAPE_JWT_SECRET"));
    }

    #[test]
    fn test_partial_vendor_group_is_an_error() {
        let mut env = base_env();
        env.insert("RAZORPAY_KEY_ID", "rzp_test_123");
        let err = ApiConfig::load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "RAZORPAY_KEY_SECRET"));
    }

    #[test]
    fn test_full_vendor_groups() {
        let mut env = base_env();
        env.insert("RAZORPAY_KEY_ID", "rzp_test_123");
        env.insert("RAZORPAY_KEY_SECRET", "s3cr3t");
        env.insert("SMTP_HOST", "smtp.example.net");
        env.insert("SMTP_PORT", "587");
        env.insert("SMTP_USERNAME", "mailer");
        env.insert("SMTP_PASSWORD", "pw");
        env.insert("SMTP_FROM", "Drape <hello@drape.in>");
        env.insert("DRAPE_OTP_DEV_MODE", "yes");
        env.insert("DRAPE_CORS_ORIGINS", "https://drape.in/, http://localhost:5173");

        let config = ApiConfig::load(&env).unwrap();
        assert_eq!(config.razorpay.unwrap().key_id, "rzp_test_123");
        assert_eq!(config.smtp.unwrap().port, 587);
        assert!(config.otp_dev_mode);
        assert_eq!(
            config.cors_origins,
            vec!["https://drape.in".to_string(), "http://localhost:5173".to_string()]
        );
    }

    #[test]
    fn test_invalid_bool_flag() {
        let mut env = base_env();
        env.insert("DRAPE_OTP_DEV_MODE", "maybe");
        assert!(matches!(
            ApiConfig::load(&env),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_vendor_config_debug_redacts_secrets() {
        let config = RazorpayConfig {
            key_id: "rzp_live_visible".to_string(),
            key_secret: SecretString::from("super_secret_key_secret"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("rzp_live_visible"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key_secret"));
    }
}
