//! Read-through behaviour of current, forecast, historical and stats requests.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;

use provider::UpstreamError;
use storage::HistoricalStore;
use test_utils::{assert_approx_eq, daily_record, ids, ymd, ScriptedProvider};
use weather_common::{DataKind, UnitSystem, WeatherError};
use weather_service::ClearStatus;

use common::{harness, harness_with};

#[tokio::test]
async fn test_unknown_city_fails_before_any_io() {
    let h = harness();

    let err = h
        .service
        .current_weather(ids::ATLANTIS, UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::CityNotFound(_)));

    let err = h
        .service
        .historical(ids::ATLANTIS, ymd(2024, 1, 1), UnitSystem::Metric)
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 404);

    assert_eq!(h.provider.calls().total(), 0);
    assert_eq!(h.backend.stats().hits.load(Ordering::Relaxed), 0);
    assert_eq!(h.backend.stats().misses.load(Ordering::Relaxed), 0);
    assert_eq!(h.store.upsert_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_current_served_from_cache_within_ttl() {
    let h = harness();

    let first = h
        .service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(!first.meta.cached);
    assert_eq!(first.meta.source, "upstream");
    assert_eq!(first.meta.data_kind, DataKind::Current);
    assert_eq!(first.meta.provider, "Scripted");

    tokio::time::advance(Duration::from_secs(29 * 60)).await;
    let second = h
        .service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(second.meta.cached);
    assert_eq!(h.provider.calls().current, 1);

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    let third = h
        .service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(!third.meta.cached);
    assert_eq!(h.provider.calls().current, 2);
}

#[tokio::test]
async fn test_units_converted_at_the_boundary() {
    let h = harness();

    let metric = h
        .service
        .current_weather(ids::PARIS, UnitSystem::Metric)
        .await
        .unwrap();
    let imperial = h
        .service
        .current_weather(ids::PARIS, UnitSystem::Imperial)
        .await
        .unwrap();
    let standard = h
        .service
        .current_weather(ids::PARIS, UnitSystem::Standard)
        .await
        .unwrap();

    // one upstream call; every unit system reads the same canonical entry
    assert_eq!(h.provider.calls().current, 1);
    assert_approx_eq!(standard.data.temperature, ScriptedProvider::DEFAULT_TEMPERATURE_K);
    assert_approx_eq!(metric.data.temperature, 11.85, 1e-9);
    assert_approx_eq!(imperial.data.temperature, 53.33, 1e-9);
    assert_approx_eq!(imperial.data.wind_speed, 5.0 * 2.23694, 1e-9);
    assert_eq!(imperial.data.temperature_unit, "°F");
    assert_eq!(imperial.data.wind_speed_unit, "mph");
}

#[tokio::test]
async fn test_forecast_days_validated_and_keyed() {
    let h = harness();

    for days in [0, 8] {
        let err = h
            .service
            .forecast(ids::LONDON, days, UnitSystem::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::InvalidParameter { ref param, .. } if param == "days"));
    }
    assert_eq!(h.provider.calls().forecast, 0);

    let three = h.service.forecast(ids::LONDON, 3, UnitSystem::Metric).await.unwrap();
    assert_eq!(three.data.len(), 3);
    assert!(three.data.windows(2).all(|w| w[0].date < w[1].date));

    let five = h.service.forecast(ids::LONDON, 5, UnitSystem::Metric).await.unwrap();
    assert_eq!(five.data.len(), 5);
    assert!(!five.meta.cached);

    let three_again = h.service.forecast(ids::LONDON, 3, UnitSystem::Metric).await.unwrap();
    assert!(three_again.meta.cached);
    assert_eq!(h.provider.calls().forecast, 2);
}

#[tokio::test]
async fn test_upstream_failure_is_not_cached() {
    let h = harness();
    h.provider.fail_all(Some(UpstreamError::Timeout));

    let err = h
        .service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::UpstreamUnavailable(_)));
    assert!(h.backend.is_empty().await);

    h.provider.fail_all(None);
    let ok = h
        .service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(!ok.meta.cached);
}

#[tokio::test]
async fn test_historical_writes_through_for_tracked_cities_only() {
    let h = harness();
    let date = ymd(2024, 1, 15);

    let paris = h
        .service
        .historical(ids::PARIS, date, UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(paris.meta.source, "upstream");
    assert_eq!(h.store.count_for(ids::PARIS).await, 1);

    let berlin = h
        .service
        .historical(ids::BERLIN, date, UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(berlin.meta.source, "upstream");
    assert_eq!(h.store.count_for(ids::BERLIN).await, 0);

    let berlin_again = h
        .service
        .historical(ids::BERLIN, date, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(berlin_again.meta.cached);
    assert_eq!(h.provider.calls().historical, 2);
}

#[tokio::test]
async fn test_store_hit_rewarms_cache() {
    let h = harness();
    let date = ymd(2023, 7, 1);
    h.store.upsert(&daily_record(ids::LONDON, date, 295.0)).await.unwrap();

    let first = h
        .service
        .historical(ids::LONDON, date, UnitSystem::Standard)
        .await
        .unwrap();
    assert_eq!(first.meta.source, "store");
    assert_approx_eq!(first.data.temperature, 295.0);

    let second = h
        .service
        .historical(ids::LONDON, date, UnitSystem::Standard)
        .await
        .unwrap();
    assert_eq!(second.meta.source, "cache");
    assert_eq!(h.provider.calls().historical, 0);
}

#[tokio::test(start_paused = true)]
async fn test_historical_cache_entries_outlive_a_day() {
    let h = harness();
    let date = ymd(2024, 2, 1);

    h.service
        .historical(ids::BERLIN, date, UnitSystem::Metric)
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;

    let again = h
        .service
        .historical(ids::BERLIN, date, UnitSystem::Metric)
        .await
        .unwrap();
    assert!(again.meta.cached);
    assert_eq!(h.provider.calls().historical, 1);
}

#[tokio::test]
async fn test_historical_not_found_is_distinct_from_unavailable() {
    let h = harness();
    let date = ymd(2024, 3, 3);
    h.provider
        .fail_on(date, UpstreamError::NotFound("no data".to_string()));

    let err = h
        .service
        .historical(ids::PARIS, date, UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::DataNotAvailable(_)));
    assert_eq!(h.store.count_for(ids::PARIS).await, 0);

    let err = h
        .service
        .historical(ids::PARIS, ymd(1970, 1, 1), UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { .. }));
}

#[tokio::test]
async fn test_today_is_not_a_historical_date() {
    let h = harness();
    let today = Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap();

    let err = h
        .service
        .historical(ids::BERLIN, today, UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { ref param, .. } if param == "date"));

    let err = h
        .service
        .stats(ids::BERLIN, yesterday, today, UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { ref param, .. } if param == "end_date"));
    assert_eq!(h.provider.calls().total(), 0);

    let record = h
        .service
        .historical(ids::BERLIN, yesterday, UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(record.data.date, yesterday);
}

#[tokio::test]
async fn test_storage_outages_degrade_to_upstream() {
    let h = harness();

    h.store.set_offline(true);
    let record = h
        .service
        .historical(ids::PARIS, ymd(2024, 1, 2), UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(record.meta.source, "upstream");

    h.backend.set_offline(true);
    let current = h
        .service
        .current_weather(ids::PARIS, UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(current.meta.source, "upstream");
}

#[tokio::test]
async fn test_stats_aggregates_canonically() {
    let h = harness();
    for (day, k) in [(1, 280.0), (2, 290.0), (3, 300.0)] {
        h.store
            .upsert(&daily_record(ids::PARIS, ymd(2024, 1, day), k))
            .await
            .unwrap();
    }

    let standard = h
        .service
        .stats(ids::PARIS, ymd(2024, 1, 1), ymd(2024, 1, 3), UnitSystem::Standard)
        .await
        .unwrap();
    assert_approx_eq!(standard.data.temperature.average, 290.0);
    assert_approx_eq!(standard.data.temperature.min, 280.0);
    assert_approx_eq!(standard.data.temperature.max, 300.0);
    assert_eq!(standard.meta.source, "aggregate");

    let metric = h
        .service
        .stats(ids::PARIS, ymd(2024, 1, 1), ymd(2024, 1, 3), UnitSystem::Metric)
        .await
        .unwrap();
    assert_approx_eq!(metric.data.temperature.average, 16.85, 1e-9);
    assert!(metric.meta.cached);

    let imperial = h
        .service
        .stats(ids::PARIS, ymd(2024, 1, 1), ymd(2024, 1, 3), UnitSystem::Imperial)
        .await
        .unwrap();
    assert_approx_eq!(imperial.data.temperature.average, 62.33, 1e-9);

    assert_eq!(h.provider.calls().total(), 0);
}

#[tokio::test]
async fn test_stats_fails_on_missing_date() {
    let h = harness();
    h.provider
        .fail_on(ymd(2024, 1, 2), UpstreamError::NotFound("gap".to_string()));

    let err = h
        .service
        .stats(ids::BERLIN, ymd(2024, 1, 1), ymd(2024, 1, 3), UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::DataNotAvailable(_)));
}

#[tokio::test]
async fn test_stats_range_validation() {
    let h = harness();

    let err = h
        .service
        .stats(ids::PARIS, ymd(2024, 1, 3), ymd(2024, 1, 1), UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { .. }));

    let err = h
        .service
        .stats(ids::PARIS, ymd(2022, 1, 1), ymd(2023, 6, 1), UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { ref param, .. } if param == "end_date"));
    assert_eq!(h.provider.calls().total(), 0);
}

#[tokio::test]
async fn test_clear_without_historical_keeps_store() {
    let h = harness();
    let date = ymd(2024, 1, 10);

    h.service
        .historical(ids::LONDON, date, UnitSystem::Metric)
        .await
        .unwrap();
    h.service
        .current_weather(ids::LONDON, UnitSystem::Metric)
        .await
        .unwrap();

    let report = h.service.clear_cache(ids::LONDON, false).await.unwrap();
    assert_eq!(report.cache_keys_removed, 2);
    assert_eq!(report.historical_records_removed, None);
    assert_eq!(report.status, ClearStatus::Success);

    let after = h
        .service
        .historical(ids::LONDON, date, UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(after.meta.source, "store");
    assert_eq!(h.provider.calls().historical, 1);

    let report = h.service.clear_cache(ids::LONDON, true).await.unwrap();
    assert_eq!(report.historical_records_removed, Some(1));
    assert_eq!(h.store.count_for(ids::LONDON).await, 0);

    let report = h.service.clear_cache(ids::LONDON, true).await.unwrap();
    assert_eq!(report.status, ClearStatus::NoData);
}

#[tokio::test]
async fn test_cache_stats_reports_both_stores() {
    let h = harness_with(ScriptedProvider::new());
    h.service
        .current_weather(ids::LUBLIN, UnitSystem::Metric)
        .await
        .unwrap();
    h.service
        .historical(ids::LUBLIN, ymd(2024, 5, 5), UnitSystem::Metric)
        .await
        .unwrap();

    let stats = h.service.cache_stats().await.unwrap();
    assert_eq!(stats.cache.total_keys, 2);
    assert_eq!(stats.cache.by_kind["historical"], 1);
    assert_eq!(stats.historical.total_records, 1);
    assert_eq!(stats.historical.records_by_city[ids::LUBLIN], 1);
    assert_eq!(stats.tracked_cities.len(), 3);
}
