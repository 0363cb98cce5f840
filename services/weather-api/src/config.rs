//! Settings owned by the HTTP layer.

use std::time::Duration;

use weather_common::{WeatherError, WeatherResult};

pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

/// Pause between population fetches when the request names none, in seconds.
pub const DEFAULT_POPULATION_DELAY_SECS: f64 = 1.0;
pub const MAX_POPULATION_DELAY_SECS: f64 = 5.0;

pub const DEFAULT_FORECAST_DAYS: u8 = 5;

/// Values consumed by the gateway in front of the API, which enforces key
/// checks and rate limits.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub admin_api_key: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_api_key: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

impl ApiConfig {
    pub fn admin_key_configured(&self) -> bool {
        self.admin_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Validate a population delay given in seconds.
pub fn population_delay(secs: Option<f64>) -> WeatherResult<Duration> {
    let secs = secs.unwrap_or(DEFAULT_POPULATION_DELAY_SECS);
    if !secs.is_finite() || !(0.0..=MAX_POPULATION_DELAY_SECS).contains(&secs) {
        return Err(WeatherError::invalid(
            "delay",
            format!("must be between 0 and {} seconds", MAX_POPULATION_DELAY_SECS),
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}
