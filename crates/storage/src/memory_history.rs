//! In-process historical store for development runs and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use weather_common::{WeatherError, WeatherRecord, WeatherResult};

use crate::history::{HistoricalStore, HistoryStats};

/// Historical store held in a `BTreeMap` keyed by (city, date).
#[derive(Default)]
pub struct MemoryHistoricalStore {
    records: RwLock<BTreeMap<(String, NaiveDate), WeatherRecord>>,
    offline: AtomicBool,
    /// Number of successful upserts, overwrites included
    upserts: AtomicU64,
}

impl MemoryHistoricalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StorageUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    /// Number of records held for a city.
    pub async fn count_for(&self, city_id: &str) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(city, _)| city == city_id)
            .count()
    }

    fn check_online(&self) -> WeatherResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(WeatherError::StorageUnavailable(
                "historical store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistoricalStore for MemoryHistoricalStore {
    async fn setup(&self) -> WeatherResult<()> {
        self.check_online()
    }

    async fn get(&self, city_id: &str, date: NaiveDate) -> WeatherResult<Option<WeatherRecord>> {
        self.check_online()?;
        let records = self.records.read().await;
        Ok(records.get(&(city_id.to_string(), date)).cloned())
    }

    async fn get_range(
        &self,
        city_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherRecord>> {
        self.check_online()?;
        if start > end {
            return Ok(Vec::new());
        }
        let records = self.records.read().await;
        let lo = (city_id.to_string(), start);
        let hi = (city_id.to_string(), end);
        Ok(records.range(lo..=hi).map(|(_, r)| r.clone()).collect())
    }

    async fn upsert(&self, record: &WeatherRecord) -> WeatherResult<()> {
        self.check_online()?;
        self.records
            .write()
            .await
            .insert((record.city_id.clone(), record.date), record.clone());
        self.upserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_by_city(&self, city_id: &str) -> WeatherResult<u64> {
        self.check_online()?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|(city, _), _| city != city_id);
        Ok((before - records.len()) as u64)
    }

    async fn stats(&self) -> WeatherResult<HistoryStats> {
        self.check_online()?;
        let records = self.records.read().await;

        let mut stats = HistoryStats {
            total_records: records.len() as u64,
            ..Default::default()
        };
        for (city, date) in records.keys() {
            *stats.records_by_city.entry(city.clone()).or_insert(0) += 1;
            stats.earliest = Some(stats.earliest.map_or(*date, |d| d.min(*date)));
            stats.latest = Some(stats.latest.map_or(*date, |d| d.max(*date)));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(city: &str, date: NaiveDate, temperature_k: f64) -> WeatherRecord {
        WeatherRecord {
            city_id: city.to_string(),
            date,
            observed_at: None,
            temperature_k,
            temperature_min_k: temperature_k - 5.0,
            temperature_max_k: temperature_k + 5.0,
            wind_speed_ms: 3.0,
            wind_direction_deg: 90,
            humidity_pct: Some(60.0),
            precipitation_mm: 0.0,
            cloud_cover_pct: None,
            pressure_hpa: None,
            condition_code: None,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let store = MemoryHistoricalStore::new();
        store.upsert(&record("paris,fr", ymd(2024, 1, 1), 280.0)).await.unwrap();
        store.upsert(&record("paris,fr", ymd(2024, 1, 1), 281.0)).await.unwrap();

        assert_eq!(store.count_for("paris,fr").await, 1);
        let got = store.get("paris,fr", ymd(2024, 1, 1)).await.unwrap().unwrap();
        assert_eq!(got.temperature_k, 281.0);
        assert_eq!(store.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_range_is_ascending_and_scoped_to_city() {
        let store = MemoryHistoricalStore::new();
        for day in [3, 1, 2, 5] {
            store.upsert(&record("paris,fr", ymd(2024, 1, day), 280.0)).await.unwrap();
        }
        store.upsert(&record("london,gb", ymd(2024, 1, 2), 280.0)).await.unwrap();

        let range = store
            .get_range("paris,fr", ymd(2024, 1, 1), ymd(2024, 1, 3))
            .await
            .unwrap();
        let dates: Vec<_> = range.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 2), ymd(2024, 1, 3)]);

        assert!(store
            .get_range("paris,fr", ymd(2023, 1, 1), ymd(2023, 12, 31))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_city_and_stats() {
        let store = MemoryHistoricalStore::new();
        store.upsert(&record("paris,fr", ymd(2024, 1, 1), 280.0)).await.unwrap();
        store.upsert(&record("paris,fr", ymd(2024, 1, 2), 280.0)).await.unwrap();
        store.upsert(&record("london,gb", ymd(2023, 6, 1), 280.0)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.earliest, Some(ymd(2023, 6, 1)));
        assert_eq!(stats.latest, Some(ymd(2024, 1, 2)));
        assert_eq!(stats.records_by_city["paris,fr"], 2);

        assert_eq!(store.delete_by_city("paris,fr").await.unwrap(), 2);
        assert_eq!(store.delete_by_city("paris,fr").await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn test_offline_is_not_a_miss() {
        let store = MemoryHistoricalStore::new();
        store.set_offline(true);
        let err = store.get("paris,fr", ymd(2024, 1, 1)).await.unwrap_err();
        assert!(err.is_storage());
    }
}
