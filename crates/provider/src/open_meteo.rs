//! Open-Meteo client.
//!
//! Open-Meteo serves forecasts and historical data from two different
//! endpoints with the same response layout. Temperatures arrive in Celsius
//! and are converted to Kelvin here; wind speed is requested in m/s so no
//! conversion is needed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use weather_common::units::KELVIN_OFFSET;
use weather_common::{City, WeatherRecord};

use crate::error::UpstreamError;
use crate::{validate_forecast_days, WeatherProvider};

const DAILY_VARIABLES: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,\
wind_speed_10m_max,wind_direction_10m_dominant,weather_code";

const CURRENT_VARIABLES: &str = "temperature_2m,relative_humidity_2m,precipitation,cloud_cover,\
pressure_msl,wind_speed_10m,wind_direction_10m,weather_code";

/// Configuration for the Open-Meteo client.
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    /// Endpoint for current conditions and forecasts
    pub forecast_url: String,
    /// Endpoint for past days
    pub historical_url: String,
    /// Whole-request deadline
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            historical_url: "https://historical-forecast-api.open-meteo.com/v1/forecast"
                .to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for Open-Meteo.
///
/// Owns one pooled `reqwest::Client` for the life of the process; the pool
/// is released when the client is dropped.
pub struct OpenMeteoClient {
    client: Client,
    config: OpenMeteoConfig,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenMeteoConfig {
        &self.config
    }

    /// Consume the client at shutdown. There is no explicit close in
    /// `reqwest`; the idle connections go away when `self` drops at the end
    /// of this call.
    pub fn close(self) {
        debug!("Closing Open-Meteo client");
        drop(self.client);
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<Forecast, UpstreamError> {
        debug!(url = %url, "Requesting Open-Meteo");

        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(UpstreamError::NotFound(format!("{} returned 404", url)));
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(UpstreamError::RateLimited),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                let reason = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.reason)
                    .unwrap_or(body);
                return Err(bad_request(url, reason));
            }
            s => {
                warn!(status = %s, url = %url, "Unexpected Open-Meteo status");
                return Err(UpstreamError::Unavailable(format!("{} returned {}", url, s)));
            }
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<Forecast>(&body)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    fn base_params(city: &City) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", format!("{:.4}", city.latitude)),
            ("longitude", format!("{:.4}", city.longitude)),
            ("timezone", "auto".to_string()),
            ("wind_speed_unit", "ms".to_string()),
        ]
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    fn name(&self) -> &str {
        "OpenMeteo"
    }

    #[instrument(skip(self, city), fields(city = %city.id))]
    async fn current(&self, city: &City) -> Result<WeatherRecord, UpstreamError> {
        let mut params = Self::base_params(city);
        params.push(("current", CURRENT_VARIABLES.to_string()));
        params.push(("daily", DAILY_VARIABLES.to_string()));
        params.push(("forecast_days", "1".to_string()));

        let forecast = self.fetch(&self.config.forecast_url, &params).await?;
        forecast.current_record(&city.id)
    }

    #[instrument(skip(self, city), fields(city = %city.id))]
    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<WeatherRecord>, UpstreamError> {
        validate_forecast_days(days)?;

        let mut params = Self::base_params(city);
        params.push(("daily", DAILY_VARIABLES.to_string()));
        params.push(("forecast_days", days.to_string()));

        let forecast = self.fetch(&self.config.forecast_url, &params).await?;
        let daily = forecast.daily_block()?;
        let records = (0..daily.time.len())
            .map(|i| daily.record(i, &city.id))
            .collect::<Result<Vec<_>, _>>()?;

        if records.len() < days as usize {
            return Err(UpstreamError::Malformed(format!(
                "expected {} forecast days, got {}",
                days,
                records.len()
            )));
        }
        Ok(records.into_iter().take(days as usize).collect())
    }

    #[instrument(skip(self, city), fields(city = %city.id, date = %date))]
    async fn historical(&self, city: &City, date: NaiveDate) -> Result<WeatherRecord, UpstreamError> {
        let day = date.format("%Y-%m-%d").to_string();
        let mut params = Self::base_params(city);
        params.push(("daily", DAILY_VARIABLES.to_string()));
        params.push(("start_date", day.clone()));
        params.push(("end_date", day));

        let forecast = self.fetch(&self.config.historical_url, &params).await?;
        let daily = forecast.daily_block()?;
        if daily.time.is_empty() {
            return Err(UpstreamError::NotFound(format!("no data for {} on {}", city.id, date)));
        }

        let record = daily.record(0, &city.id)?;
        if record.date != date {
            return Err(UpstreamError::Malformed(format!(
                "asked for {}, upstream answered {}",
                date, record.date
            )));
        }
        Ok(record)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    utc_offset_seconds: i64,
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    cloud_cover: Option<f64>,
    pressure_msl: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    weather_code: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
}

/// Open-Meteo answers 400 both for dates it has no data for and for
/// requests it cannot parse. Only the former means "no data".
fn bad_request(url: &str, reason: String) -> UpstreamError {
    let lower = reason.to_lowercase();
    let about_dates = lower.contains("date") && (lower.contains("range") || lower.contains("out of"));
    if about_dates {
        UpstreamError::NotFound(reason)
    } else {
        warn!(url = %url, reason = %reason, "Open-Meteo rejected request");
        UpstreamError::Unavailable(format!("{} rejected request: {}", url, reason))
    }
}

fn required(values: &[Option<f64>], i: usize, field: &str) -> Result<f64, UpstreamError> {
    values
        .get(i)
        .copied()
        .flatten()
        .ok_or_else(|| UpstreamError::Malformed(format!("missing {}[{}]", field, i)))
}

fn optional(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

fn direction(deg: Option<f64>) -> u16 {
    deg.map(|d| d.rem_euclid(360.0).round() as u16 % 360).unwrap_or(0)
}

impl Forecast {
    fn daily_block(&self) -> Result<&DailyBlock, UpstreamError> {
        self.daily
            .as_ref()
            .ok_or_else(|| UpstreamError::Malformed("response has no daily block".to_string()))
    }

    fn current_record(&self, city_id: &str) -> Result<WeatherRecord, UpstreamError> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| UpstreamError::Malformed("response has no current block".to_string()))?;

        let local = NaiveDateTime::parse_from_str(&current.time, "%Y-%m-%dT%H:%M")
            .map_err(|e| UpstreamError::Malformed(format!("bad current time '{}': {}", current.time, e)))?;
        let observed_at: DateTime<Utc> =
            (local - chrono::Duration::seconds(self.utc_offset_seconds)).and_utc();

        let temperature = current
            .temperature_2m
            .ok_or_else(|| UpstreamError::Malformed("missing current temperature_2m".to_string()))?;
        let wind_speed = current
            .wind_speed_10m
            .ok_or_else(|| UpstreamError::Malformed("missing current wind_speed_10m".to_string()))?;

        // Today's extremes come from the daily block when present
        let (t_min, t_max) = match &self.daily {
            Some(daily) => (
                optional(&daily.temperature_2m_min, 0).unwrap_or(temperature),
                optional(&daily.temperature_2m_max, 0).unwrap_or(temperature),
            ),
            None => (temperature, temperature),
        };

        Ok(WeatherRecord {
            city_id: city_id.to_string(),
            date: local.date(),
            observed_at: Some(observed_at),
            temperature_k: kelvin(temperature),
            temperature_min_k: kelvin(t_min.min(temperature)),
            temperature_max_k: kelvin(t_max.max(temperature)),
            wind_speed_ms: wind_speed,
            wind_direction_deg: direction(current.wind_direction_10m),
            humidity_pct: current.relative_humidity_2m,
            precipitation_mm: current.precipitation.unwrap_or(0.0),
            cloud_cover_pct: current.cloud_cover,
            pressure_hpa: current.pressure_msl,
            condition_code: current.weather_code.map(|c| c as u16),
        })
    }
}

impl DailyBlock {
    fn record(&self, i: usize, city_id: &str) -> Result<WeatherRecord, UpstreamError> {
        let time = self
            .time
            .get(i)
            .ok_or_else(|| UpstreamError::Malformed(format!("missing time[{}]", i)))?;
        let date = NaiveDate::parse_from_str(time, "%Y-%m-%d")
            .map_err(|e| UpstreamError::Malformed(format!("bad date '{}': {}", time, e)))?;

        let t_min = required(&self.temperature_2m_min, i, "temperature_2m_min")?;
        let t_max = required(&self.temperature_2m_max, i, "temperature_2m_max")?;

        Ok(WeatherRecord {
            city_id: city_id.to_string(),
            date,
            observed_at: None,
            temperature_k: kelvin((t_min + t_max) / 2.0),
            temperature_min_k: kelvin(t_min),
            temperature_max_k: kelvin(t_max),
            wind_speed_ms: required(&self.wind_speed_10m_max, i, "wind_speed_10m_max")?,
            wind_direction_deg: direction(optional(&self.wind_direction_10m_dominant, i)),
            humidity_pct: None,
            precipitation_mm: optional(&self.precipitation_sum, i).unwrap_or(0.0),
            cloud_cover_pct: None,
            pressure_hpa: None,
            condition_code: optional(&self.weather_code, i).map(|c| c as u16),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_consumes_client() {
        let client = OpenMeteoClient::new(OpenMeteoConfig::default()).unwrap();
        assert_eq!(client.config().request_timeout, Duration::from_secs(30));
        client.close();
    }

    #[test]
    fn test_bad_request_only_not_found_for_dates() {
        assert!(matches!(
            bad_request("u", "Parameter 'start_date' is out of allowed range from 2016-01-01".into()),
            UpstreamError::NotFound(_)
        ));
        assert!(matches!(
            bad_request("u", "Latitude must be in range of -90 to 90°. Given: 91.0.".into()),
            UpstreamError::Unavailable(_)
        ));
        assert!(matches!(
            bad_request("u", "Cannot initialize WeatherVariable from invalid String value foo".into()),
            UpstreamError::Unavailable(_)
        ));
    }

    #[test]
    fn test_daily_record_converts_to_kelvin() {
        let daily: DailyBlock = serde_json::from_value(serde_json::json!({
            "time": ["2024-01-01"],
            "temperature_2m_max": [10.0],
            "temperature_2m_min": [0.0],
            "precipitation_sum": [2.5],
            "wind_speed_10m_max": [7.5],
            "wind_direction_10m_dominant": [359.6],
            "weather_code": [61.0]
        }))
        .unwrap();

        let record = daily.record(0, "london,gb").unwrap();
        assert!((record.temperature_k - 278.15).abs() < 1e-9);
        assert!((record.temperature_min_k - 273.15).abs() < 1e-9);
        assert!((record.temperature_max_k - 283.15).abs() < 1e-9);
        assert_eq!(record.wind_speed_ms, 7.5);
        assert_eq!(record.wind_direction_deg, 0);
        assert_eq!(record.condition_code, Some(61));
    }

    #[test]
    fn test_null_temperature_is_malformed() {
        let daily: DailyBlock = serde_json::from_value(serde_json::json!({
            "time": ["2024-01-01"],
            "temperature_2m_max": [null],
            "temperature_2m_min": [1.0],
            "wind_speed_10m_max": [3.0]
        }))
        .unwrap();

        assert!(matches!(
            daily.record(0, "london,gb"),
            Err(UpstreamError::Malformed(_))
        ));
    }

    #[test]
    fn test_current_uses_utc_offset() {
        let forecast: Forecast = serde_json::from_value(serde_json::json!({
            "utc_offset_seconds": 3600,
            "current": {
                "time": "2024-06-01T13:00",
                "temperature_2m": 20.0,
                "wind_speed_10m": 4.0,
                "wind_direction_10m": 90.0
            },
            "daily": {
                "time": ["2024-06-01"],
                "temperature_2m_max": [24.0],
                "temperature_2m_min": [12.0]
            }
        }))
        .unwrap();

        let record = forecast.current_record("paris,fr").unwrap();
        let observed = record.observed_at.unwrap();
        assert_eq!(observed.to_rfc3339(), "2024-06-01T12:00:00+00:00");
        assert!((record.temperature_k - 293.15).abs() < 1e-9);
        assert!((record.temperature_min_k - 285.15).abs() < 1e-9);
        assert_eq!(record.precipitation_mm, 0.0);
    }
}
