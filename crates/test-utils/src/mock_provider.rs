//! Scripted weather provider for orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use provider::{validate_forecast_days, UpstreamError, WeatherProvider};
use weather_common::{City, WeatherRecord};

use crate::fixtures::daily_record;

type Hook = Box<dyn Fn(&City, NaiveDate) + Send + Sync>;

/// Number of upstream calls made, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub current: usize,
    pub forecast: usize,
    pub historical: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.current + self.forecast + self.historical
    }
}

/// Provider that answers from a script and counts every call.
///
/// Unscripted dates get a record at [`ScriptedProvider::DEFAULT_TEMPERATURE_K`].
pub struct ScriptedProvider {
    temperatures: Mutex<HashMap<NaiveDate, f64>>,
    failures: Mutex<HashMap<NaiveDate, UpstreamError>>,
    fail_all: Mutex<Option<UpstreamError>>,
    on_historical: Mutex<Option<Hook>>,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
    historical_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    pub const DEFAULT_TEMPERATURE_K: f64 = 285.0;

    pub fn new() -> Self {
        Self {
            temperatures: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            fail_all: Mutex::new(None),
            on_historical: Mutex::new(None),
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
            historical_calls: AtomicUsize::new(0),
        }
    }

    /// Answer `date` with this mean temperature.
    pub fn with_temperature(self, date: NaiveDate, temperature_k: f64) -> Self {
        lock(&self.temperatures).insert(date, temperature_k);
        self
    }

    /// Fail historical fetches for `date`.
    pub fn fail_on(&self, date: NaiveDate, err: UpstreamError) {
        lock(&self.failures).insert(date, err);
    }

    /// Fail every call until cleared with `None`.
    pub fn fail_all(&self, err: Option<UpstreamError>) {
        *lock(&self.fail_all) = err;
    }

    /// Run `hook` at the start of every historical fetch.
    pub fn on_historical(&self, hook: impl Fn(&City, NaiveDate) + Send + Sync + 'static) {
        *lock(&self.on_historical) = Some(Box::new(hook));
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            current: self.current_calls.load(Ordering::SeqCst),
            forecast: self.forecast_calls.load(Ordering::SeqCst),
            historical: self.historical_calls.load(Ordering::SeqCst),
        }
    }

    fn check_fail_all(&self) -> Result<(), UpstreamError> {
        match lock(&self.fail_all).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_for(&self, city: &City, date: NaiveDate) -> WeatherRecord {
        let temperature = lock(&self.temperatures)
            .get(&date)
            .copied()
            .unwrap_or(Self::DEFAULT_TEMPERATURE_K);
        daily_record(&city.id, date, temperature)
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn current(&self, city: &City) -> Result<WeatherRecord, UpstreamError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail_all()?;

        let now = Utc::now();
        let mut record = self.record_for(city, now.date_naive());
        record.observed_at = Some(now);
        Ok(record)
    }

    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<WeatherRecord>, UpstreamError> {
        validate_forecast_days(days)?;
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail_all()?;

        let today = Utc::now().date_naive();
        Ok((0..days as i64)
            .map(|i| self.record_for(city, today + Duration::days(i)))
            .collect())
    }

    async fn historical(&self, city: &City, date: NaiveDate) -> Result<WeatherRecord, UpstreamError> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = lock(&self.on_historical).as_ref() {
            hook(city, date);
        }
        self.check_fail_all()?;

        if let Some(err) = lock(&self.failures).get(&date) {
            return Err(err.clone());
        }
        Ok(self.record_for(city, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{city, ymd};

    #[test]
    fn test_scripted_answers_and_counts() {
        let provider = ScriptedProvider::new().with_temperature(ymd(2024, 1, 1), 280.0);
        provider.fail_on(ymd(2024, 1, 2), UpstreamError::NotFound("gap".into()));
        let paris = city("paris,fr");

        let record = tokio_test::block_on(provider.historical(&paris, ymd(2024, 1, 1))).unwrap();
        assert_eq!(record.temperature_k, 280.0);

        let err = tokio_test::block_on(provider.historical(&paris, ymd(2024, 1, 2))).unwrap_err();
        assert!(matches!(err, UpstreamError::NotFound(_)));

        let record = tokio_test::block_on(provider.historical(&paris, ymd(2024, 1, 3))).unwrap();
        assert_eq!(record.temperature_k, ScriptedProvider::DEFAULT_TEMPERATURE_K);

        assert_eq!(provider.calls().historical, 3);
        assert_eq!(provider.calls().total(), 3);
    }

    #[test]
    fn test_forecast_validates_days_without_counting() {
        let provider = ScriptedProvider::new();
        let result = tokio_test::block_on(provider.forecast(&city("paris,fr"), 9));
        assert!(result.is_err());
        assert_eq!(provider.calls().forecast, 0);

        let records = tokio_test::block_on(provider.forecast(&city("paris,fr"), 3)).unwrap();
        assert_eq!(records.len(), 3);
    }
}
