//! Aggregate statistics over a range of daily records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{WeatherError, WeatherResult};
use crate::units::UnitSystem;
use crate::WeatherRecord;

/// Aggregates computed in canonical units (Kelvin, m/s, mm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStats {
    pub city_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: usize,
    pub temperature_min_k: f64,
    pub temperature_max_k: f64,
    pub temperature_mean_k: f64,
    pub precipitation_total_mm: f64,
    pub days_with_precipitation: usize,
    pub wind_speed_mean_ms: f64,
    pub wind_speed_max_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<HumidityStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumidityStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl WeatherStats {
    /// Aggregate records of one city. The slice must not be empty.
    pub fn from_records(records: &[WeatherRecord]) -> WeatherResult<Self> {
        let first = records
            .first()
            .ok_or_else(|| WeatherError::DataNotAvailable("no records in range".to_string()))?;

        let n = records.len() as f64;
        let mut t_min = f64::INFINITY;
        let mut t_max = f64::NEG_INFINITY;
        let mut t_sum = 0.0;
        let mut precip_total = 0.0;
        let mut precip_days = 0;
        let mut wind_sum = 0.0;
        let mut wind_max = f64::NEG_INFINITY;
        let mut start = first.date;
        let mut end = first.date;

        for r in records {
            t_min = t_min.min(r.temperature_k);
            t_max = t_max.max(r.temperature_k);
            t_sum += r.temperature_k;
            precip_total += r.precipitation_mm;
            if r.precipitation_mm > 0.0 {
                precip_days += 1;
            }
            wind_sum += r.wind_speed_ms;
            wind_max = wind_max.max(r.wind_speed_ms);
            start = start.min(r.date);
            end = end.max(r.date);
        }

        let humidity: Vec<f64> = records.iter().filter_map(|r| r.humidity_pct).collect();
        let humidity = if humidity.is_empty() {
            None
        } else {
            Some(HumidityStats {
                mean: humidity.iter().sum::<f64>() / humidity.len() as f64,
                min: humidity.iter().copied().fold(f64::INFINITY, f64::min),
                max: humidity.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        };

        Ok(Self {
            city_id: first.city_id.clone(),
            start_date: start,
            end_date: end,
            days: records.len(),
            temperature_min_k: t_min,
            temperature_max_k: t_max,
            temperature_mean_k: t_sum / n,
            precipitation_total_mm: precip_total,
            days_with_precipitation: precip_days,
            wind_speed_mean_ms: wind_sum / n,
            wind_speed_max_ms: wind_max,
            humidity,
        })
    }

    /// Convert the aggregate once for a response.
    pub fn to_report(&self, units: UnitSystem) -> StatsReport {
        StatsReport {
            city_id: self.city_id.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            days: self.days,
            units,
            temperature: TemperatureSummary {
                min: units.temperature(self.temperature_min_k),
                max: units.temperature(self.temperature_max_k),
                average: units.temperature(self.temperature_mean_k),
                unit: units.temperature_label(),
            },
            precipitation: PrecipitationSummary {
                total: self.precipitation_total_mm,
                days_with_precipitation: self.days_with_precipitation,
            },
            wind: WindSummary {
                average_speed: units.wind_speed(self.wind_speed_mean_ms),
                max_speed: units.wind_speed(self.wind_speed_max_ms),
                unit: units.wind_speed_label(),
            },
            humidity: self.humidity,
        }
    }
}

/// Converted statistics returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub city_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: usize,
    pub units: UnitSystem,
    pub temperature: TemperatureSummary,
    pub precipitation: PrecipitationSummary,
    pub wind: WindSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<HumidityStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSummary {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub unit: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipitationSummary {
    pub total: f64,
    pub days_with_precipitation: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindSummary {
    pub average_speed: f64,
    pub max_speed: f64,
    pub unit: &'static str,
}
