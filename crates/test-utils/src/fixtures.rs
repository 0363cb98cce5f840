//! Common test fixtures for the weather services.

use chrono::NaiveDate;
use weather_common::{City, CityRegistry, WeatherRecord};

/// Identifiers used across tests.
pub mod ids {
    /// Tracked for history by default.
    pub const LONDON: &str = "london,gb";
    pub const PARIS: &str = "paris,fr";
    pub const LUBLIN: &str = "lublin,pl";
    /// Known city that is not tracked for history.
    pub const BERLIN: &str = "berlin,de";
    /// Not a known city.
    pub const ATLANTIS: &str = "atlantis,xx";
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Registry with the built-in city table.
pub fn registry() -> CityRegistry {
    CityRegistry::builtin().unwrap()
}

/// A city with the given id and arbitrary coordinates.
pub fn city(id: &str) -> City {
    let (name, country) = id.split_once(',').unwrap_or((id, "xx"));
    City {
        id: id.to_string(),
        name: name.to_string(),
        country: country.to_uppercase(),
        state: None,
        latitude: 50.0,
        longitude: 10.0,
        utc_offset: "+00:00".to_string(),
    }
}

/// Daily record with the given mean temperature (Kelvin).
pub fn daily_record(city_id: &str, date: NaiveDate, temperature_k: f64) -> WeatherRecord {
    WeatherRecord {
        city_id: city_id.to_string(),
        date,
        observed_at: None,
        temperature_k,
        temperature_min_k: temperature_k - 4.0,
        temperature_max_k: temperature_k + 4.0,
        wind_speed_ms: 5.0,
        wind_direction_deg: 225,
        humidity_pct: Some(70.0),
        precipitation_mm: 1.0,
        cloud_cover_pct: None,
        pressure_hpa: None,
        condition_code: Some(3),
    }
}
