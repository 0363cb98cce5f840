//! HTTP request handlers.

pub mod admin;
pub mod cities;
pub mod health;
pub mod weather;

use weather_common::{UnitSystem, WeatherError, WeatherResult};

/// Parse the `units` query parameter, defaulting to metric.
pub(crate) fn parse_units(units: Option<&str>) -> WeatherResult<UnitSystem> {
    match units {
        Some(u) if !u.trim().is_empty() => u.parse(),
        _ => Ok(UnitSystem::default()),
    }
}

/// Parse a required numeric query parameter.
pub(crate) fn parse_number<T: std::str::FromStr>(param: &str, value: Option<&str>) -> WeatherResult<T> {
    let value = required(param, value)?;
    value
        .trim()
        .parse()
        .map_err(|_| WeatherError::invalid(param, format!("'{}' is not a valid number", value)))
}

pub(crate) fn required<'a>(param: &str, value: Option<&'a str>) -> WeatherResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(WeatherError::invalid(param, "missing required parameter")),
    }
}
