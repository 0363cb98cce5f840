//! Error types for the weather services.

use thiserror::Error;

/// Result type alias using WeatherError.
pub type WeatherResult<T> = Result<T, WeatherError>;

/// Primary error type for weather operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WeatherError {
    // === Request Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("City is not configured for historical tracking: {0}")]
    CityNotTracked(String),

    // === Data Errors ===
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    // === Dependency Errors ===
    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeatherError {
    /// Shorthand for [`WeatherError::InvalidParameter`].
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        WeatherError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            WeatherError::InvalidParameter { .. } => "INVALID_PARAMETER",
            WeatherError::CityNotFound(_) => "CITY_NOT_FOUND",
            WeatherError::CityNotTracked(_) => "CITY_NOT_TRACKED",
            WeatherError::DataNotAvailable(_) => "DATA_NOT_AVAILABLE",
            WeatherError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            WeatherError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            WeatherError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WeatherError::InvalidParameter { .. } | WeatherError::CityNotTracked(_) => 400,

            WeatherError::CityNotFound(_) | WeatherError::DataNotAvailable(_) => 404,

            WeatherError::UpstreamUnavailable(_) | WeatherError::StorageUnavailable(_) => 503,

            WeatherError::Internal(_) => 500,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, WeatherError::StorageUnavailable(_))
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WeatherError::invalid("units", "bad").http_status_code(), 400);
        assert_eq!(WeatherError::CityNotFound("atlantis,xx".into()).http_status_code(), 404);
        assert_eq!(WeatherError::DataNotAvailable("x".into()).http_status_code(), 404);
        assert_eq!(WeatherError::UpstreamUnavailable("x".into()).http_status_code(), 503);
        assert_eq!(WeatherError::StorageUnavailable("x".into()).http_status_code(), 503);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WeatherError::CityNotFound("atlantis,xx".into()).error_code(),
            "CITY_NOT_FOUND"
        );
        assert!(WeatherError::StorageUnavailable("down".into()).is_storage());
        assert!(!WeatherError::Internal("oops".into()).is_storage());
    }
}
