//! Application state shared by all handlers.

use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use weather_service::WeatherService;

use crate::config::ApiConfig;

pub struct AppState {
    pub service: WeatherService,
    pub config: ApiConfig,
    /// Renders the process-wide metrics recorder.
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: WeatherService, config: ApiConfig, prometheus: PrometheusHandle) -> Self {
        Self {
            service,
            config,
            prometheus,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
