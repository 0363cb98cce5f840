//! Common types and utilities shared across the weather services.

pub mod city;
pub mod dates;
pub mod error;
pub mod record;
pub mod stats;
pub mod units;

pub use city::{City, CityRegistry};
pub use dates::{parse_date, DateRange, HISTORICAL_EPOCH};
pub use error::{WeatherError, WeatherResult};
pub use record::{DataKind, ResponseMeta, WeatherRecord, WeatherReport};
pub use stats::{StatsReport, WeatherStats};
pub use units::{convert, Quantity, UnitSystem};
