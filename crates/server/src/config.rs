//! Server configuration loaded from environment variables.
//!
//! Everything is read once at start-up; nothing re-reads the environment
//! while requests are being served.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PICS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PICS_TOKEN_SECRET` - Bearer token signing key (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PICS_HOST` - Bind address (default: 127.0.0.1)
//! - `PICS_PORT` - Listen port (default: 8000)
//! - `PICS_TOKEN_TTL_MINUTES` - Bearer token lifetime (default: 30)
//! - `PICS_FREE_DAILY_LIMIT` - Anonymous daily limit for every free tier (default: 5)
//! - `PICS_FREE_DAILY_LIMIT_THUMBNAIL` / `PICS_FREE_DAILY_LIMIT_PREVIEW` - Per-tier overrides
//! - `PICS_FREE_MAX_UPLOAD_MB` - Anonymous upload ceiling (default: 3)
//! - `PICS_USER_MAX_UPLOAD_MB` - Authenticated upload ceiling (default: 15)
//! - `PICS_STORAGE_DIR` - Root for staging, retained and persisted pictures (default: ./storage)
//! - `PICS_RETENTION_SECS` - How long anonymous results stay on disk (default: 5)
//! - `PICS_ENGINE_PROGRAM` - Processing engine executable (default: profile-pic-maker)
//! - `PICS_ENGINE_TIMEOUT_SECS` - Per-job engine timeout (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use picmaker_core::QualityTier;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct PicsConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token settings
    pub token: TokenConfig,
    /// Anonymous daily limits
    pub quota: QuotaConfig,
    /// Upload ceilings
    pub uploads: UploadConfig,
    /// On-disk locations and retention
    pub storage: StorageConfig,
    /// Processing engine adapter
    pub engine: EngineConfig,
    /// Sentry error tracking
    pub sentry: SentryConfig,
}

/// Bearer token configuration.
///
/// Implements `Debug` manually to redact the signing key.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing key
    pub secret: SecretString,
    /// Lifetime of issued tokens
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Daily limits for anonymous callers, per free tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    pub thumbnail_daily_limit: u64,
    pub preview_daily_limit: u64,
}

impl QuotaConfig {
    /// Same limit for every free tier.
    #[must_use]
    pub const fn uniform(limit: u64) -> Self {
        Self {
            thumbnail_daily_limit: limit,
            preview_daily_limit: limit,
        }
    }

    /// Daily limit for an anonymous request at `tier`. Callers check
    /// [`QualityTier::is_free`] first.
    #[must_use]
    pub const fn limit_for(&self, tier: QualityTier) -> u64 {
        match tier {
            QualityTier::Thumbnail => self.thumbnail_daily_limit,
            _ => self.preview_daily_limit,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self::uniform(5)
    }
}

/// Upload size ceilings in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadConfig {
    pub free_max_bytes: u64,
    pub user_max_bytes: u64,
}

impl UploadConfig {
    /// Largest body the transport should accept before the orchestrator
    /// gets to look at it (multipart framing included).
    #[must_use]
    pub const fn body_limit(&self) -> usize {
        let max = if self.user_max_bytes > self.free_max_bytes {
            self.user_max_bytes
        } else {
            self.free_max_bytes
        };
        #[allow(clippy::cast_possible_truncation)] // ceilings are configured in megabytes
        let max = max as usize;
        max.saturating_add(64 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            free_max_bytes: 3 * BYTES_PER_MB,
            user_max_bytes: 15 * BYTES_PER_MB,
        }
    }
}

/// On-disk layout for pictures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Private per-request working directories
    pub staging_dir: PathBuf,
    /// Anonymous results kept for `retention`
    pub retained_dir: PathBuf,
    /// Persisted results of authenticated users, one directory per user
    pub resources_dir: PathBuf,
    /// How long anonymous results stay addressable
    pub retention: Duration,
}

impl StorageConfig {
    /// Standard layout below `root`.
    #[must_use]
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            staging_dir: root.join("staging"),
            retained_dir: root.join("retained"),
            resources_dir: root.join("resources"),
            retention: Duration::from_secs(5),
        }
    }
}

/// External processing engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Executable invoked once per picture
    pub program: PathBuf,
    /// Upper bound for a single job
    pub timeout: Duration,
}

/// Sentry settings. Error tracking is disabled without a DSN.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl PicsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, if
    /// the token secret fails validation, or if the authenticated upload
    /// ceiling is not strictly larger than the anonymous one.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PICS_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("PICS_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("PICS_PORT", "8000")?;

        let token = TokenConfig::from_env()?;
        let quota = QuotaConfig::from_env()?;
        let uploads = UploadConfig::from_env()?;
        let storage = StorageConfig::from_env()?;
        let engine = EngineConfig::from_env()?;
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            token,
            quota,
            uploads,
            storage,
            engine,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TokenConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("PICS_TOKEN_SECRET")?;
        validate_secret_length(&secret, "PICS_TOKEN_SECRET")?;
        let minutes = get_parsed_or_default::<u64>("PICS_TOKEN_TTL_MINUTES", "30")?;
        if minutes == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PICS_TOKEN_TTL_MINUTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            secret,
            ttl: Duration::from_secs(minutes * 60),
        })
    }
}

impl QuotaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default = get_parsed_or_default::<u64>("PICS_FREE_DAILY_LIMIT", "5")?;
        Ok(Self {
            thumbnail_daily_limit: get_parsed_optional("PICS_FREE_DAILY_LIMIT_THUMBNAIL")?
                .unwrap_or(default),
            preview_daily_limit: get_parsed_optional("PICS_FREE_DAILY_LIMIT_PREVIEW")?
                .unwrap_or(default),
        })
    }
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let free_mb = get_parsed_or_default::<u64>("PICS_FREE_MAX_UPLOAD_MB", "3")?;
        let user_mb = get_parsed_or_default::<u64>("PICS_USER_MAX_UPLOAD_MB", "15")?;
        let uploads = Self {
            free_max_bytes: free_mb.saturating_mul(BYTES_PER_MB),
            user_max_bytes: user_mb.saturating_mul(BYTES_PER_MB),
        };
        uploads.validate()?;
        Ok(uploads)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.free_max_bytes == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PICS_FREE_MAX_UPLOAD_MB".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.user_max_bytes <= self.free_max_bytes {
            return Err(ConfigError::InvalidEnvVar(
                "PICS_USER_MAX_UPLOAD_MB".to_string(),
                "must be larger than PICS_FREE_MAX_UPLOAD_MB".to_string(),
            ));
        }
        Ok(())
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut storage = Self::under(get_env_or_default("PICS_STORAGE_DIR", "./storage"));
        storage.retention =
            Duration::from_secs(get_parsed_or_default::<u64>("PICS_RETENTION_SECS", "5")?);
        Ok(storage)
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            program: PathBuf::from(get_env_or_default(
                "PICS_ENGINE_PROGRAM",
                "profile-pic-maker",
            )),
            timeout: Duration::from_secs(get_parsed_or_default::<u64>(
                "PICS_ENGINE_TIMEOUT_SECS",
                "60",
            )?),
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: get_parsed_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: get_parsed_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Parse an optional environment variable.
fn get_parsed_optional<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .map(|value| parse_value(key, &value))
        .transpose()
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
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
    let len = s.chars().count() as f64;
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

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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
        let result = validate_secret_strength("changeme-token-key", "PICS_TOKEN_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "PICS_TOKEN_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "PICS_TOKEN_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "K").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "K").is_ok());
    }

    #[test]
    fn test_quota_limit_per_free_tier() {
        let quota = QuotaConfig {
            thumbnail_daily_limit: 9,
            preview_daily_limit: 2,
        };
        assert_eq!(quota.limit_for(QualityTier::Thumbnail), 9);
        assert_eq!(quota.limit_for(QualityTier::Preview), 2);
    }

    #[test]
    fn test_upload_ceilings_must_be_ordered() {
        assert!(UploadConfig::default().validate().is_ok());
        let equal = UploadConfig {
            free_max_bytes: 15 * BYTES_PER_MB,
            user_max_bytes: 15 * BYTES_PER_MB,
        };
        assert!(equal.validate().is_err());
        let zero = UploadConfig {
            free_max_bytes: 0,
            user_max_bytes: BYTES_PER_MB,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_body_limit_leaves_room_for_framing() {
        let uploads = UploadConfig::default();
        assert!(uploads.body_limit() > usize::try_from(uploads.user_max_bytes).unwrap());
    }

    #[test]
    fn test_storage_layout() {
        let storage = StorageConfig::under("/srv/pics");
        assert_eq!(storage.staging_dir, PathBuf::from("/srv/pics/staging"));
        assert_eq!(storage.retained_dir, PathBuf::from("/srv/pics/retained"));
        assert_eq!(storage.resources_dir, PathBuf::from("/srv/pics/resources"));
        assert_eq!(storage.retention, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("PICS_PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "PICS_PORT"));
    }

    #[test]
    fn test_token_config_debug_redacts_secret() {
        let token = TokenConfig {
            secret: SecretString::from("super_secret_signing_key_value_123"),
            ttl: Duration::from_secs(1800),
        };
        let debug_output = format!("{token:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_signing_key_value_123"));
    }
}
