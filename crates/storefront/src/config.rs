//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_BASE_URL` - Public URL for the storefront
//! - `CART_API_URL` - Remote cart GraphQL endpoint (only when `CART_BACKEND=remote`)
//!
//! ## Optional
//! - `CART_HOST` - Bind address (default: 127.0.0.1)
//! - `CART_PORT` - Listen port (default: 3000)
//! - `CART_BACKEND` - `local` or `remote` (default: local)
//! - `CART_STORAGE_DIR` - Durable storage root (default: ./data/carts)
//! - `CART_SYNTHETIC_DELAY_MS` - Local cart operation delay (default: 150)
//! - `CART_CACHE_TTL_SECS` - Remote snapshot cache TTL (default: 300)
//! - `CART_API_TOKEN` - Bearer token for the remote cart service
//! - `CART_API_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
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

/// Which engine serves carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartBackend {
    /// Client-resident cart persisted to durable storage.
    #[default]
    Local,
    /// Server-owned cart behind the remote cart service.
    Remote,
}

impl FromStr for CartBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("expected `local` or `remote`, got `{other}`")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Data-source policy
    pub backend: CartBackend,
    /// Root directory for file-backed durable storage
    pub storage_dir: PathBuf,
    /// Local engine settings
    pub local: LocalCartConfig,
    /// Remote engine settings; present only for the remote backend
    pub remote: Option<RemoteCartConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Local engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct LocalCartConfig {
    /// Delay before each operation settles
    pub synthetic_delay: Duration,
}

/// Remote engine configuration.
#[derive(Debug, Clone)]
pub struct RemoteCartConfig {
    /// How long a cached snapshot stays fresh
    pub cache_ttl: Duration,
    /// Cart service connection
    pub api: CartApiConfig,
}

/// Remote cart service connection settings.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct CartApiConfig {
    /// GraphQL endpoint
    pub endpoint: Url,
    /// Bearer token sent with every request
    pub access_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`StorefrontConfig::from_env`].
    pub fn from_source(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = parse_or_default(env, "CART_HOST", "127.0.0.1")?;
        let port = parse_or_default(env, "CART_PORT", "3000")?;
        let base_url = required(env, "CART_BASE_URL")?;
        let backend = parse_or_default(env, "CART_BACKEND", "local")?;
        let storage_dir = PathBuf::from(or_default(env, "CART_STORAGE_DIR", "./data/carts"));

        let local = LocalCartConfig {
            synthetic_delay: Duration::from_millis(parse_or_default(
                env,
                "CART_SYNTHETIC_DELAY_MS",
                "150",
            )?),
        };

        let remote = match backend {
            CartBackend::Local => None,
            CartBackend::Remote => Some(RemoteCartConfig::from_source(env)?),
        };

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            storage_dir,
            local,
            remote,
            sentry_dsn: env("SENTRY_DSN"),
            sentry_environment: env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RemoteCartConfig {
    fn from_source(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = required(env, "CART_API_URL")?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_URL".to_string(), e.to_string()))?;

        let access_token = match env("CART_API_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "CART_API_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        Ok(Self {
            cache_ttl: Duration::from_secs(parse_or_default(env, "CART_CACHE_TTL_SECS", "300")?),
            api: CartApiConfig {
                endpoint,
                access_token,
                timeout: Duration::from_secs(parse_or_default(
                    env,
                    "CART_API_TIMEOUT_SECS",
                    "10",
                )?),
            },
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn required(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a variable with a default value.
fn or_default(env: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable, falling back to `default` when unset.
fn parse_or_default<T>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    or_default(env, key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject tokens that are placeholders or obviously not random.
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
