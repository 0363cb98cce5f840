//! Metric names and recording helpers.
//!
//! Only the `metrics` facade is used here; the binary installs the
//! Prometheus recorder. Without a recorder every call is a no-op.

use std::time::Duration;

use metrics::{counter, histogram};
use weather_common::DataKind;

/// A tier produced the value.
pub fn record_tier_hit(kind: DataKind, tier: &'static str) {
    counter!("weather_tier_hits_total", "kind" => kind.as_str(), "tier" => tier).increment(1);
}

/// A tier had nothing for the query.
pub fn record_tier_miss(kind: DataKind, tier: &'static str) {
    counter!("weather_tier_misses_total", "kind" => kind.as_str(), "tier" => tier).increment(1);
}

/// A tier failed and the cascade moved on or gave up.
pub fn record_tier_error(kind: DataKind, tier: &'static str) {
    counter!("weather_tier_errors_total", "kind" => kind.as_str(), "tier" => tier).increment(1);
}

/// One upstream fetch and its latency.
pub fn record_upstream(kind: DataKind, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("weather_upstream_requests_total", "kind" => kind.as_str(), "outcome" => outcome)
        .increment(1);
    histogram!("weather_upstream_duration_seconds", "kind" => kind.as_str())
        .record(elapsed.as_secs_f64());
}

/// One inbound request served or failed.
pub fn record_request(kind: DataKind, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("weather_requests_total", "kind" => kind.as_str(), "outcome" => outcome).increment(1);
}

/// One date processed by bulk population.
pub fn record_population_date(ok: bool) {
    let outcome = if ok { "succeeded" } else { "failed" };
    counter!("weather_population_dates_total", "outcome" => outcome).increment(1);
}
