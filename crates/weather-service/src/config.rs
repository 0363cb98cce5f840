//! Settings for the weather service.

use std::time::Duration;

use storage::CacheTtls;

/// Limits, deadlines and cache TTLs used by [`WeatherService`](crate::WeatherService).
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Expiry per data kind.
    pub ttls: CacheTtls,

    /// Deadline for one upstream fetch.
    pub upstream_timeout: Duration,

    /// Deadline for one cache or historical-store call. Kept below
    /// `upstream_timeout`.
    pub storage_timeout: Duration,

    pub max_forecast_days: u8,

    /// Longest range accepted by the stats endpoint, in days.
    pub max_stats_days: usize,

    /// Largest `days_back` accepted by bulk population.
    pub max_population_days: u32,

    /// Consecutive storage failures after which population gives up.
    pub max_consecutive_storage_failures: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ttls: CacheTtls::default(),
            upstream_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(2),
            max_forecast_days: provider::MAX_FORECAST_DAYS,
            max_stats_days: 366,
            max_population_days: 365,
            max_consecutive_storage_failures: 3,
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ServiceSettings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// TTLs are in seconds; `CACHE_TTL_HISTORICAL=0` means no expiry.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(ttl) = env_secs("CACHE_TTL_CURRENT") {
            settings.ttls.current = Some(ttl);
        }
        if let Some(ttl) = env_secs("CACHE_TTL_FORECAST") {
            settings.ttls.forecast = Some(ttl);
        }
        if let Some(ttl) = env_secs("CACHE_TTL_HISTORICAL") {
            settings.ttls.historical = (!ttl.is_zero()).then_some(ttl);
        }
        if let Some(ttl) = env_secs("CACHE_TTL_STATS") {
            settings.ttls.stats = Some(ttl);
        }

        if let Some(timeout) = env_secs("UPSTREAM_TIMEOUT_SECS") {
            settings.upstream_timeout = timeout;
        }
        if let Ok(val) = std::env::var("STORAGE_TIMEOUT_MS") {
            if let Ok(ms) = val.trim().parse() {
                settings.storage_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("MAX_POPULATION_DAYS") {
            if let Ok(days) = val.trim().parse() {
                settings.max_population_days = days;
            }
        }

        settings
    }
}
