//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOUK_BASE_URL` - Public URL for the storefront
//! - `SOUK_AUTH_SERVICE_URL` - Auth service (login, OTP, profiles, users)
//! - `SOUK_CART_SERVICE_URL` - Cart service
//! - `SOUK_PRODUCT_SERVICE_URL` - Product and category service
//! - `SOUK_STORE_SERVICE_URL` - Vendor store service
//! - `SOUK_ORDER_SERVICE_URL` - Order service
//! - `SOUK_WISHLIST_SERVICE_URL` - Wishlist service
//! - `SOUK_RECOMMENDATION_SERVICE_URL` - Recommendation service
//! - `SOUK_NOTIFICATION_SERVICE_URL` - Notification push service
//!
//! ## Optional
//! - `SOUK_HOST` - Bind address (default: 127.0.0.1)
//! - `SOUK_PORT` - Listen port (default: 3000)
//! - `SOUK_HTTP_TIMEOUT_SECS` - Timeout for service calls (default: 10)
//! - `SOUK_SESSION_TTL_HOURS` - Session inactivity expiry (default: 168)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
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
    /// Base URLs of the backend microservices
    pub services: ServiceEndpoints,
    /// Timeout applied to every service call
    pub http_timeout: Duration,
    /// Session inactivity expiry
    pub session_ttl: Duration,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Base URLs of the external microservices.
///
/// Each URL is stored without a trailing slash so routes can be appended
/// with `format!("{base}/route")`.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub auth: String,
    pub carts: String,
    pub products: String,
    pub stores: String,
    pub orders: String,
    pub wishlist: String,
    pub recommendations: String,
    pub notifications: String,
}

/// Sentry configuration.
///
/// Implements `Debug` manually to redact the DSN.
#[derive(Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<SecretString>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
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
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("SOUK_HOST", "127.0.0.1")?;
        let port = parse_env("SOUK_PORT", "3000")?;
        let base_url = get_required_url("SOUK_BASE_URL")?;
        let services = ServiceEndpoints::from_env()?;
        let http_timeout = Duration::from_secs(parse_env("SOUK_HTTP_TIMEOUT_SECS", "10")?);
        let session_ttl =
            Duration::from_secs(parse_env::<u64>("SOUK_SESSION_TTL_HOURS", "168")? * 60 * 60);
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            services,
            http_timeout,
            session_ttl,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ServiceEndpoints {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            auth: get_required_url("SOUK_AUTH_SERVICE_URL")?,
            carts: get_required_url("SOUK_CART_SERVICE_URL")?,
            products: get_required_url("SOUK_PRODUCT_SERVICE_URL")?,
            stores: get_required_url("SOUK_STORE_SERVICE_URL")?,
            orders: get_required_url("SOUK_ORDER_SERVICE_URL")?,
            wishlist: get_required_url("SOUK_WISHLIST_SERVICE_URL")?,
            recommendations: get_required_url("SOUK_RECOMMENDATION_SERVICE_URL")?,
            notifications: get_required_url("SOUK_NOTIFICATION_SERVICE_URL")?,
        })
    }

    /// Every service at the same base URL (single gateway deployments, tests).
    #[must_use]
    pub fn uniform(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            auth: base.clone(),
            carts: base.clone(),
            products: base.clone(),
            stores: base.clone(),
            orders: base.clone(),
            wishlist: base.clone(),
            recommendations: base.clone(),
            notifications: base,
        }
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN").map(SecretString::from),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
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

/// Get a required environment variable that must hold an absolute http(s) URL.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    normalize_url(&value).map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate a service URL and strip its trailing slash.
fn normalize_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.host_str().is_none() {
        return Err("URL must have a host".to_string());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_trailing_slash() {
        assert_eq!(
            normalize_url("http://localhost:5001/").unwrap(),
            "http://localhost:5001"
        );
        assert_eq!(
            normalize_url("https://api.example.com/auth/").unwrap(),
            "https://api.example.com/auth"
        );
    }

    #[test]
    fn test_normalize_url_rejects_bad_input() {
        assert!(normalize_url("localhost:5001").is_err());
        assert!(normalize_url("ftp://files.example.com").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_uniform_endpoints() {
        let endpoints = ServiceEndpoints::uniform("http://gateway:8080/");
        assert_eq!(endpoints.auth, "http://gateway:8080");
        assert_eq!(endpoints.notifications, "http://gateway:8080");
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            services: ServiceEndpoints::uniform("http://localhost:9000"),
            http_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(3600),
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_sentry_config_debug_redacts_dsn() {
        let config = SentryConfig {
            dsn: Some(SecretString::from("https://key@sentry.example.com/1")),
            environment: Some("staging".to_string()),
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("staging"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sentry.example.com"));
    }
}
