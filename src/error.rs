//! Error types for upstream fetches and pipeline runs

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single upstream request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP request failed with status: {0}")]
    Status(StatusCode),

    /// Response body did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// The overall fetch deadline passed before this request finished
    #[error("fetch deadline exceeded")]
    DeadlineExceeded,
}

impl FetchError {
    pub fn shape(message: impl Into<String>) -> Self {
        FetchError::Shape(message.into())
    }

    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => !e.is_decode() && !e.is_builder(),
            FetchError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Shape(_) | FetchError::DeadlineExceeded => false,
        }
    }
}

/// Whole-run failure, surfaced to whoever invoked the pipeline
#[derive(Debug, Error)]
pub enum CensusError {
    /// The geometry document could not be fetched or parsed
    #[error("failed to fetch zip code geometries")]
    Geo(#[source] FetchError),

    /// Every per-zip demographics query failed
    #[error("no demographics retrieved for any of {attempted} zip codes")]
    NoDemographics { attempted: usize },

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The blocking runtime could not be started
    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),
}
