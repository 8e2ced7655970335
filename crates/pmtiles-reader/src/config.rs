//! Reader configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ReaderError, ReaderResult};

/// Default number of cached headers and directories
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 100;

/// Default size of the first read, covering the header and usually the root directory
pub const DEFAULT_INITIAL_FETCH_LENGTH: u64 = 16_384;

/// How directory fetches are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Cache in-flight fetches so concurrent callers share one request
    #[default]
    SharedFuture,
    /// Cache only completed values
    ResolvedValue,
}

impl FromStr for CacheStrategy {
    type Err = ReaderError;

    fn from_str(s: &str) -> ReaderResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shared" | "shared-future" | "shared_future" => Ok(Self::SharedFuture),
            "resolved" | "resolved-value" | "resolved_value" => Ok(Self::ResolvedValue),
            other => Err(ReaderError::InvalidConfig(format!(
                "unknown cache strategy '{other}'"
            ))),
        }
    }
}

/// Settings for opening archives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Maximum number of cached headers and directories
    pub max_cache_entries: usize,

    /// Cache implementation
    pub cache_strategy: CacheStrategy,

    /// Bytes requested by the first read of an archive
    pub initial_fetch_length: u64,

    /// Timeout for a single HTTP request
    pub request_timeout: Duration,

    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            cache_strategy: CacheStrategy::default(),
            initial_fetch_length: DEFAULT_INITIAL_FETCH_LENGTH,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("pmtiles-reader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ReaderConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> ReaderResult<Self> {
        let defaults = Self::default();
        let config = Self {
            max_cache_entries: std::env::var("PMTILES_MAX_CACHE_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_cache_entries),
            cache_strategy: match std::env::var("PMTILES_CACHE_STRATEGY") {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.cache_strategy,
            },
            initial_fetch_length: std::env::var("PMTILES_INITIAL_FETCH_LENGTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.initial_fetch_length),
            request_timeout: Duration::from_secs(
                std::env::var("PMTILES_REQUEST_TIMEOUT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            ),
            user_agent: std::env::var("PMTILES_USER_AGENT").unwrap_or(defaults.user_agent),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the cache capacity
    pub fn with_max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }

    /// Set the cache strategy
    pub fn with_cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = strategy;
        self
    }

    /// Set the size of the first read
    pub fn with_initial_fetch_length(mut self, length: u64) -> Self {
        self.initial_fetch_length = length;
        self
    }

    /// Set the HTTP request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the HTTP user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ReaderResult<()> {
        if self.max_cache_entries == 0 {
            return Err(ReaderError::InvalidConfig(
                "max_cache_entries must be greater than 0".to_string(),
            ));
        }
        if self.initial_fetch_length < pmtiles_formats::HEADER_SIZE as u64 {
            return Err(ReaderError::InvalidConfig(format!(
                "initial_fetch_length must cover the {}-byte header",
                pmtiles_formats::HEADER_SIZE
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ReaderError::InvalidConfig(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_cache_entries, 100);
        assert_eq!(config.initial_fetch_length, 16_384);
        assert_eq!(config.cache_strategy, CacheStrategy::SharedFuture);
    }

    #[test]
    fn test_builders() {
        let config = ReaderConfig::default()
            .with_max_cache_entries(5)
            .with_cache_strategy(CacheStrategy::ResolvedValue)
            .with_initial_fetch_length(512)
            .with_user_agent("test");
        assert_eq!(config.max_cache_entries, 5);
        assert_eq!(config.cache_strategy, CacheStrategy::ResolvedValue);
        assert_eq!(config.initial_fetch_length, 512);
        assert_eq!(config.user_agent, "test");
    }

    #[test]
    fn test_validation_failures() {
        assert!(ReaderConfig::default().with_max_cache_entries(0).validate().is_err());
        assert!(ReaderConfig::default().with_initial_fetch_length(100).validate().is_err());
        assert!(
            ReaderConfig::default()
                .with_request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("shared".parse::<CacheStrategy>().unwrap(), CacheStrategy::SharedFuture);
        assert_eq!(
            "Resolved-Value".parse::<CacheStrategy>().unwrap(),
            CacheStrategy::ResolvedValue
        );
        assert!("lru".parse::<CacheStrategy>().is_err());
    }
}
