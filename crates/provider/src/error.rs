//! Errors returned by upstream providers.

use thiserror::Error;
use weather_common::WeatherError;

/// Failure of a single upstream fetch. The client never retries on its own.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream rate limit exceeded")]
    RateLimited,

    /// No data exists for the requested date or location.
    #[error("no upstream data: {0}")]
    NotFound(String),

    /// The response could not be parsed.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// Transport failure or unexpected status.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Rejected before any network call.
    #[error("invalid upstream request parameter '{param}': {message}")]
    InvalidRequest { param: String, message: String },
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Unavailable(err.to_string())
        }
    }
}

impl From<UpstreamError> for WeatherError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound(msg) => WeatherError::DataNotAvailable(msg),
            UpstreamError::InvalidRequest { param, message } => WeatherError::invalid(param, message),
            other => WeatherError::UpstreamUnavailable(other.to_string()),
        }
    }
}
