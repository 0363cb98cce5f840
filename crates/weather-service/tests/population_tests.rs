//! Bulk population of the historical store.

mod common;

use std::time::Duration;

use provider::UpstreamError;
use storage::HistoricalStore;
use test_utils::{assert_approx_eq, daily_record, ids, ymd, ScriptedProvider};
use weather_common::{UnitSystem, WeatherError};
use weather_service::{CancellationToken, PopulationRequest};

use common::{harness, harness_with};

fn request(city: &str, days_back: u32) -> PopulationRequest {
    PopulationRequest::new(city, days_back, Duration::ZERO).until(ymd(2024, 3, 10))
}

#[tokio::test]
async fn test_population_is_idempotent() {
    let h = harness();

    let first = h
        .service
        .populate_historical(request(ids::PARIS, 10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.start_date, ymd(2024, 2, 29));
    assert_eq!(first.end_date, ymd(2024, 3, 10));
    assert_eq!(first.days_requested, 11);
    assert_eq!(first.succeeded.len(), 11);
    assert!(first.failed.is_empty());
    assert!(!first.cancelled);

    let second = h
        .service
        .populate_historical(request(ids::PARIS, 10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.processed(), 11);

    assert_eq!(h.store.count_for(ids::PARIS).await, 11);
    assert_eq!(h.provider.calls().historical, 22);
}

#[tokio::test]
async fn test_failed_dates_are_reported_not_fatal() {
    let h = harness();
    h.provider
        .fail_on(ymd(2024, 3, 8), UpstreamError::NotFound("gap".to_string()));

    let report = h
        .service
        .populate_historical(request(ids::LONDON, 4), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].date, ymd(2024, 3, 8));
    assert!(!report.succeeded.contains(&ymd(2024, 3, 8)));
    assert_eq!(h.store.count_for(ids::LONDON).await, 4);
}

#[tokio::test]
async fn test_population_replaces_stored_values() {
    let date = ymd(2024, 3, 10);
    let h = harness_with(ScriptedProvider::new().with_temperature(date, 300.0));
    h.store.upsert(&daily_record(ids::PARIS, date, 250.0)).await.unwrap();

    let before = h
        .service
        .historical(ids::PARIS, date, UnitSystem::Standard)
        .await
        .unwrap();
    assert_approx_eq!(before.data.temperature, 250.0);

    h.service
        .populate_historical(request(ids::PARIS, 1), CancellationToken::new())
        .await
        .unwrap();

    let stored = h.store.get(ids::PARIS, date).await.unwrap().unwrap();
    assert_approx_eq!(stored.temperature_k, 300.0);

    let after = h
        .service
        .historical(ids::PARIS, date, UnitSystem::Standard)
        .await
        .unwrap();
    assert_eq!(after.meta.source, "cache");
    assert_approx_eq!(after.data.temperature, 300.0);
}

#[tokio::test]
async fn test_rejects_untracked_cities_and_bad_windows() {
    let h = harness();

    let err = h
        .service
        .populate_historical(request(ids::BERLIN, 5), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::CityNotTracked(_)));

    let err = h
        .service
        .populate_historical(request(ids::ATLANTIS, 5), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::CityNotFound(_)));

    for days_back in [0, 366] {
        let err = h
            .service
            .populate_historical(request(ids::PARIS, days_back), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::InvalidParameter { ref param, .. } if param == "days_back"));
    }

    assert_eq!(h.provider.calls().total(), 0);
}

#[tokio::test]
async fn test_store_setup_failure_aborts_before_fetching() {
    let h = harness();
    h.store.set_offline(true);

    let err = h
        .service
        .populate_historical(request(ids::PARIS, 3), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::StorageUnavailable(_)));
    assert_eq!(h.provider.calls().historical, 0);
}

#[tokio::test]
async fn test_consecutive_storage_failures_abort_run() {
    let h = harness();
    let store = h.store.clone();
    h.provider.on_historical(move |_, date| {
        if date >= ymd(2024, 3, 5) {
            store.set_offline(true);
        }
    });

    let err = h
        .service
        .populate_historical(request(ids::PARIS, 9), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::StorageUnavailable(_)));
    // 03-01 to 03-04 stored, then three failing dates
    assert_eq!(h.provider.calls().historical, 7);
    h.store.set_offline(false);
    assert_eq!(h.store.count_for(ids::PARIS).await, 4);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = h
        .service
        .populate_historical(request(ids::LUBLIN, 5), cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.processed(), 0);
    assert_eq!(h.provider.calls().historical, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_delay_and_keeps_completed_dates() {
    let h = harness();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    h.provider.on_historical(move |_, date| {
        if date == ymd(2024, 3, 3) {
            trigger.cancel();
        }
    });

    let request = PopulationRequest::new(ids::LONDON, 9, Duration::from_secs(60)).until(ymd(2024, 3, 10));
    let report = h.service.populate_historical(request, cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(
        report.succeeded,
        vec![ymd(2024, 3, 1), ymd(2024, 3, 2), ymd(2024, 3, 3)]
    );
    assert_eq!(h.store.count_for(ids::LONDON).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_dates_are_paced_by_delay() {
    let h = harness();
    let started = tokio::time::Instant::now();

    let request = PopulationRequest::new(ids::PARIS, 3, Duration::from_secs(2)).until(ymd(2024, 3, 10));
    let report = h
        .service
        .populate_historical(request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 4);
    // no pause before the first date
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(8));
}
