//! Weather records in canonical units and their converted views.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::units::UnitSystem;

/// Kind of weather data. Each kind has its own freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Current,
    Forecast,
    Historical,
    Stats,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Current,
        DataKind::Forecast,
        DataKind::Historical,
        DataKind::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Current => "current",
            DataKind::Forecast => "forecast",
            DataKind::Historical => "historical",
            DataKind::Stats => "stats",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation or forecast for a city and day.
///
/// Temperatures are Kelvin and wind speed is m/s. This is the only shape that
/// is cached or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city_id: String,
    /// Calendar date; the natural key for historical records.
    pub date: NaiveDate,
    /// Observation time for current conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    /// Representative temperature (current reading, or daily mean).
    pub temperature_k: f64,
    pub temperature_min_k: f64,
    pub temperature_max_k: f64,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    pub precipitation_mm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f64>,
    /// WMO weather interpretation code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_code: Option<u16>,
}

impl WeatherRecord {
    /// Convert to the caller's unit system.
    pub fn to_report(&self, units: UnitSystem) -> WeatherReport {
        WeatherReport {
            city_id: self.city_id.clone(),
            date: self.date,
            observed_at: self.observed_at,
            units,
            temperature_unit: units.temperature_label(),
            wind_speed_unit: units.wind_speed_label(),
            temperature: units.temperature(self.temperature_k),
            temperature_min: units.temperature(self.temperature_min_k),
            temperature_max: units.temperature(self.temperature_max_k),
            wind_speed: units.wind_speed(self.wind_speed_ms),
            wind_direction: self.wind_direction_deg,
            humidity: self.humidity_pct,
            precipitation: self.precipitation_mm,
            cloud_cover: self.cloud_cover_pct,
            pressure: self.pressure_hpa,
            condition_code: self.condition_code,
        }
    }
}

/// A [`WeatherRecord`] converted for a response. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    pub units: UnitSystem,
    pub temperature_unit: &'static str,
    pub wind_speed_unit: &'static str,
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub wind_speed: f64,
    pub wind_direction: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Millimetres, in every unit system.
    pub precipitation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_code: Option<u16>,
}

/// Where a response came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseMeta {
    /// True when served from the cache.
    pub cached: bool,
    /// Name of the tier that produced the data (cache, store, upstream).
    pub source: String,
    pub data_kind: DataKind,
    pub provider: String,
}
