//! Upstream weather providers.
//!
//! The orchestrator only sees the [`WeatherProvider`] trait; the Open-Meteo
//! client is the production implementation.

pub mod error;
pub mod open_meteo;

use async_trait::async_trait;
use chrono::NaiveDate;

use weather_common::{City, WeatherRecord};

pub use error::UpstreamError;
pub use open_meteo::{OpenMeteoClient, OpenMeteoConfig};

/// Longest forecast the provider is asked for.
pub const MAX_FORECAST_DAYS: u8 = 7;

/// Reject day counts outside `1..=MAX_FORECAST_DAYS` before any I/O.
pub fn validate_forecast_days(days: u8) -> Result<(), UpstreamError> {
    if (1..=MAX_FORECAST_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(UpstreamError::InvalidRequest {
            param: "days".to_string(),
            message: format!("must be between 1 and {}, got {}", MAX_FORECAST_DAYS, days),
        })
    }
}

/// Source of weather data. All values returned are canonical (Kelvin, m/s).
///
/// Implementations carry their own request deadline and never retry.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Provider name reported in response metadata.
    fn name(&self) -> &str;

    /// Current conditions at the city.
    async fn current(&self, city: &City) -> Result<WeatherRecord, UpstreamError>;

    /// Daily forecast starting today, one record per day in date order.
    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<WeatherRecord>, UpstreamError>;

    /// Daily summary for a past date.
    async fn historical(&self, city: &City, date: NaiveDate) -> Result<WeatherRecord, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_forecast_days() {
        assert!(validate_forecast_days(1).is_ok());
        assert!(validate_forecast_days(7).is_ok());
        assert!(matches!(
            validate_forecast_days(0),
            Err(UpstreamError::InvalidRequest { ref param, .. }) if param == "days"
        ));
        assert!(validate_forecast_days(8).is_err());
    }
}
