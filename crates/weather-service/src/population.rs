//! Bulk population of the historical store.
//!
//! Dates are fetched one at a time, oldest first, with a pause between
//! fetches to stay under the upstream rate limit. Cancellation is checked
//! between dates and interrupts the pause; a fetch in flight always
//! completes.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use weather_common::{DateRange, WeatherError, WeatherResult};

use crate::metrics;
use crate::service::WeatherService;
use crate::tiers::{with_storage_deadline, HistoricalQuery};

/// Parameters of a population run.
#[derive(Debug, Clone)]
pub struct PopulationRequest {
    pub city: String,
    /// Days before `until` to fetch; `until` itself is always included.
    pub days_back: u32,
    /// Pause between consecutive fetches.
    pub delay: Duration,
    /// Last date to fetch. Defaults to today.
    pub until: Option<NaiveDate>,
}

impl PopulationRequest {
    pub fn new(city: impl Into<String>, days_back: u32, delay: Duration) -> Self {
        Self {
            city: city.into(),
            days_back,
            delay,
            until: None,
        }
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDate {
    pub date: NaiveDate,
    pub error: String,
}

/// Summary of a population run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationReport {
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_requested: usize,
    pub succeeded: Vec<NaiveDate>,
    pub failed: Vec<FailedDate>,
    /// True when the run stopped early because it was cancelled.
    pub cancelled: bool,
}

impl PopulationReport {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl WeatherService {
    /// Fetch every date of the lookback window from upstream and persist it,
    /// replacing whatever the store and cache held.
    ///
    /// Per-date failures are recorded in the report. The run only fails as a
    /// whole on invalid input, when the store cannot be set up, or after
    /// `max_consecutive_storage_failures` storage failures in a row.
    #[instrument(skip(self, cancel), fields(city = %request.city, days_back = request.days_back))]
    pub async fn populate_historical(
        &self,
        request: PopulationRequest,
        cancel: CancellationToken,
    ) -> WeatherResult<PopulationReport> {
        let city = self.cities.resolve(&request.city)?.clone();
        if !self.cities.is_tracked(&city.id) {
            return Err(WeatherError::CityNotTracked(city.id));
        }
        let max_days = self.settings.max_population_days;
        if request.days_back < 1 || request.days_back > max_days {
            return Err(WeatherError::invalid(
                "days_back",
                format!("must be between 1 and {}, got {}", max_days, request.days_back),
            ));
        }

        let until = request.until.unwrap_or_else(|| Utc::now().date_naive());
        let range = DateRange::lookback(until, request.days_back);

        with_storage_deadline(self.settings.storage_timeout, "history setup", self.store.setup())
            .await?;

        info!(
            start = %range.start,
            end = %range.end,
            delay_ms = request.delay.as_millis() as u64,
            "Starting historical population"
        );

        let mut report = PopulationReport {
            city: city.id.clone(),
            start_date: range.start,
            end_date: range.end,
            days_requested: range.days(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        };
        let mut storage_failures = 0usize;

        for (i, date) in range.iter().enumerate() {
            if i > 0 && !request.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(request.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                warn!(date = %date, "Population cancelled");
                report.cancelled = true;
                break;
            }

            let query = HistoricalQuery {
                city: city.clone(),
                date,
                tracked: true,
            };
            match self.history.refresh(&query).await {
                Ok(_) => {
                    storage_failures = 0;
                    metrics::record_population_date(true);
                    report.succeeded.push(date);
                }
                Err(e) => {
                    metrics::record_population_date(false);
                    warn!(date = %date, error = %e, "Failed to populate date");

                    if e.is_storage() {
                        storage_failures += 1;
                    } else {
                        storage_failures = 0;
                    }
                    report.failed.push(FailedDate {
                        date,
                        error: e.to_string(),
                    });

                    if storage_failures >= self.settings.max_consecutive_storage_failures {
                        error!(
                            failures = storage_failures,
                            "Historical store unavailable, aborting population"
                        );
                        return Err(WeatherError::StorageUnavailable(format!(
                            "population of {} aborted after {} consecutive storage failures: {}",
                            city.id, storage_failures, e
                        )));
                    }
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Historical population finished"
        );
        Ok(report)
    }
}
