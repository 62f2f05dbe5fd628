//! Typed error hierarchy for floorwatch.
//!
//! Two top-level enums cover the library surfaces:
//! - `FeedError`: a single poll cycle (HTTP, decoding, validation, timeout)
//! - `ConfigError`: configuration values that cannot be honoured
//!
//! The CLI wraps both in `anyhow` with context.

use thiserror::Error;

/// Errors from one poll cycle of the production monitoring feed.
///
/// Any of these discards the whole cycle; the scheduler keeps the last
/// committed snapshot and flags the error.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid {endpoint} payload: {message}")]
    InvalidPayload { endpoint: String, message: String },

    #[error("Poll cycle timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

impl FeedError {
    /// Endpoint name the error originated from, if it came from a single read.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            FeedError::Http { endpoint, .. }
            | FeedError::Status { endpoint, .. }
            | FeedError::Decode { endpoint, .. }
            | FeedError::InvalidPayload { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

/// Errors from configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Backend base URL is empty")]
    EmptyBaseUrl,

    #[error("Invalid backend base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_endpoint_and_code() {
        let err = FeedError::Status {
            endpoint: "kpis".to_string(),
            status: 503,
        };
        assert_eq!(err.endpoint(), Some("kpis"));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("kpis"));
    }

    #[test]
    fn test_timeout_has_no_endpoint() {
        let err = FeedError::Timeout { after_ms: 10_000 };
        assert_eq!(err.endpoint(), None);
        assert!(err.to_string().contains("10000ms"));
    }

    #[test]
    fn test_all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&FeedError::InvalidFilter("x".into()));
        assert_std_error(&ConfigError::EmptyBaseUrl);
    }
}
