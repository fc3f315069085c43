//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `CART_API_URL` - Base URL of the product/stock service (default: `http://localhost:3333`)
//! - `CART_STORAGE_PATH` - File backing the key-value store (default: `.rocketshoes/storage.json`)
//! - `CART_STORAGE_KEY` - Key the cart snapshot is written under (default: `@RocketShoes:cart`)
//! - `CART_API_TIMEOUT_SECS` - Per-request timeout for catalog calls (default: 30)
//! - `CART_PRODUCT_CACHE_TTL_SECS` - Product metadata cache TTL, 0 disables (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3333";
pub const DEFAULT_STORAGE_PATH: &str = ".rocketshoes/storage.json";
pub const DEFAULT_STORAGE_KEY: &str = "@RocketShoes:cart";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Product/stock service configuration
    pub catalog: CatalogConfig,
    /// File backing the key-value store
    pub storage_path: PathBuf,
    /// Key the cart snapshot is persisted under
    pub storage_key: String,
}

/// Product/stock service configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL; `stock/{id}` and `products/{id}` are resolved against it
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// TTL for cached product metadata, `None` disables caching
    pub product_cache_ttl: Option<Duration>,
}

impl CatalogConfig {
    /// Configuration for a service at `base_url` with default timeout and caching.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            product_cache_ttl: Some(Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS)),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("CART_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let base_url = parse_base_url("CART_API_URL", &api_url)?;

        let timeout_secs = parse_secs(&lookup, "CART_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_API_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let ttl_secs = parse_secs(
            &lookup,
            "CART_PRODUCT_CACHE_TTL_SECS",
            DEFAULT_PRODUCT_CACHE_TTL_SECS,
        )?;

        let storage_path = lookup("CART_STORAGE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);

        let storage_key = lookup("CART_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            catalog: CatalogConfig {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                product_cache_ttl: (ttl_secs > 0).then_some(Duration::from_secs(ttl_secs)),
            },
            storage_path,
            storage_key,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the service base URL, accepting only http(s).
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

/// Parse a whole number of seconds, falling back to `default` when unset.
fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.catalog.base_url.as_str(), "http://localhost:3333/");
        assert_eq!(config.catalog.timeout, Duration::from_secs(30));
        assert_eq!(config.catalog.product_cache_ttl, Some(Duration::from_secs(300)));
        assert_eq!(config.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
        assert_eq!(config.storage_key, "@RocketShoes:cart");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CART_API_URL", "https://api.rocketshoes.test/v1"),
            ("CART_API_TIMEOUT_SECS", "5"),
            ("CART_PRODUCT_CACHE_TTL_SECS", "0"),
            ("CART_STORAGE_PATH", "/tmp/cart.json"),
            ("CART_STORAGE_KEY", "@Test:cart"),
        ])
        .unwrap();

        assert_eq!(config.catalog.base_url.host_str(), Some("api.rocketshoes.test"));
        assert_eq!(config.catalog.timeout, Duration::from_secs(5));
        assert_eq!(config.catalog.product_cache_ttl, None);
        assert_eq!(config.storage_path, PathBuf::from("/tmp/cart.json"));
        assert_eq!(config.storage_key, "@Test:cart");
    }

    #[test]
    fn test_invalid_url() {
        let err = config_from(&[("CART_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CART_API_URL"));

        assert!(config_from(&[("CART_API_URL", "ftp://files.example.com")]).is_err());
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(config_from(&[("CART_API_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("CART_API_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_empty_storage_key() {
        assert!(config_from(&[("CART_STORAGE_KEY", "  ")]).is_err());
    }
}
