//! Unit systems and conversion from canonical units.
//!
//! Everything stored or cached is canonical: temperatures in Kelvin and wind
//! speeds in metres per second. Conversion happens once, at the response
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Metres per second to miles per hour.
pub const MS_TO_MPH: f64 = 2.23694;

/// Unit system requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Kelvin, m/s
    Standard,
    /// Celsius, m/s
    #[default]
    Metric,
    /// Fahrenheit, mph
    Imperial,
}

/// Physical quantity being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    WindSpeed,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Standard => "standard",
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            UnitSystem::Standard => "K",
            UnitSystem::Metric => "°C",
            UnitSystem::Imperial => "°F",
        }
    }

    pub fn wind_speed_label(&self) -> &'static str {
        match self {
            UnitSystem::Standard | UnitSystem::Metric => "m/s",
            UnitSystem::Imperial => "mph",
        }
    }

    /// Convert a Kelvin temperature into this unit system.
    pub fn temperature(&self, kelvin: f64) -> f64 {
        convert(kelvin, Quantity::Temperature, *self)
    }

    /// Convert a wind speed in m/s into this unit system.
    pub fn wind_speed(&self, metres_per_second: f64) -> f64 {
        convert(metres_per_second, Quantity::WindSpeed, *self)
    }
}

/// Convert a canonical value (Kelvin or m/s) into `target`.
///
/// Total over all inputs; invalid unit names are rejected when parsing
/// [`UnitSystem`], never here.
pub fn convert(value: f64, quantity: Quantity, target: UnitSystem) -> f64 {
    match (quantity, target) {
        (_, UnitSystem::Standard) => value,
        (Quantity::Temperature, UnitSystem::Metric) => value - KELVIN_OFFSET,
        (Quantity::Temperature, UnitSystem::Imperial) => (value - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0,
        (Quantity::WindSpeed, UnitSystem::Metric) => value,
        (Quantity::WindSpeed, UnitSystem::Imperial) => value * MS_TO_MPH,
    }
}

impl FromStr for UnitSystem {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(UnitSystem::Standard),
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(WeatherError::invalid(
                "units",
                format!("'{}' is not one of standard, metric, imperial", other),
            )),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
