//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `GOSPORTY_API_URL` - Backend root URL (default: `http://localhost:10000`).
//!   The `/api` prefix is appended automatically.
//! - `GOSPORTY_DATA_DIR` - Directory for the persisted guest cart and session
//!   token (default: `.gosporty`)
//! - `GOSPORTY_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Backend used when `GOSPORTY_API_URL` is unset or blank.
pub const DEFAULT_API_URL: &str = "http://localhost:10000";

const DEFAULT_DATA_DIR: &str = ".gosporty";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API configuration
    pub api: ApiConfig,
    /// Directory holding persisted client-side storage
    pub data_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend REST API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API base, always ending in `/api/`
    pub base_url: Url,
    /// Timeout applied to each request
    pub timeout: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_root = get_optional_env("GOSPORTY_API_URL");
        let timeout_secs = get_env_or_default(
            "GOSPORTY_REQUEST_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("GOSPORTY_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let api = ApiConfig::new(
            resolve_api_root(api_root.as_deref()),
            Duration::from_secs(timeout_secs),
        )?;
        let data_dir = PathBuf::from(get_env_or_default("GOSPORTY_DATA_DIR", DEFAULT_DATA_DIR));

        Ok(Self {
            api,
            data_dir,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl ApiConfig {
    /// Build the API configuration from a backend root URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `root` is not an absolute URL.
    pub fn new(root: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid =
            |e: url::ParseError| ConfigError::InvalidEnvVar("GOSPORTY_API_URL".to_string(), e.to_string());

        let mut root = Url::parse(root).map_err(invalid)?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base_url = root.join("api/").map_err(invalid)?;

        Ok(Self { base_url, timeout })
    }

    /// Resolve an endpoint path (e.g. `cart/update`) against the API base.
    ///
    /// # Errors
    ///
    /// Returns a parse error if `path` is not a valid relative reference.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Pick the backend root, treating an unset or blank value as the default.
fn resolve_api_root(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => DEFAULT_API_URL,
    }
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
