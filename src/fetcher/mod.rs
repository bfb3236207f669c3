pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpFetcher;

/// A fetched page: final status, post-redirect URL and decoded body text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// URL the response was ultimately served from, after redirects.
    /// Relative references in the body resolve against this, not the
    /// requested URL.
    pub final_url: String,
    pub body: String,
}

/// Failure of a single GET. Timeouts are distinguished from other network
/// failures; callers that fold both into a negative outcome can still log
/// them differently.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

#[async_trait]
pub trait Fetcher {
    /// Perform a GET for `url`, following redirects, honoring the configured
    /// timeout. Non-2xx statuses are reported as [`FetchError::Network`].
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-request timeout in seconds (default: 15)
    pub timeout_secs: u64,

    /// User agent string to use
    pub user_agent: Option<String>,

    /// Value sent in the Accept header
    pub accept: String,

    /// Value sent in the Accept-Language header
    pub accept_language: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            accept: "text/html,application/xhtml+xml,*/*;q=0.9".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl FetcherConfig {
    /// Get the per-request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert!(config.user_agent.is_some());
        assert!(config.accept.starts_with("text/html"));
    }
}
