//! Tier implementations: cache, historical store, upstream provider and
//! the stats aggregator.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};

use provider::WeatherProvider;
use storage::{CacheKey, HistoricalStore, WeatherCache};
use weather_common::{City, DataKind, DateRange, WeatherError, WeatherRecord, WeatherResult, WeatherStats};

use crate::cascade::{Cascade, Tier};
use crate::metrics;

pub const CACHE_TIER: &str = "cache";
pub const STORE_TIER: &str = "store";
pub const UPSTREAM_TIER: &str = "upstream";
pub const AGGREGATE_TIER: &str = "aggregate";

// ============================================================================
// Queries
// ============================================================================

/// Queries that have a cache entry.
pub trait Cached {
    fn cache_key(&self) -> CacheKey;
}

#[derive(Debug, Clone)]
pub struct CurrentQuery {
    pub city: City,
}

#[derive(Debug, Clone)]
pub struct ForecastQuery {
    pub city: City,
    pub days: u8,
}

#[derive(Debug, Clone)]
pub struct HistoricalQuery {
    pub city: City,
    pub date: NaiveDate,
    /// Whether the city's history is persisted in the store.
    pub tracked: bool,
}

#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub city: City,
    pub range: DateRange,
    pub tracked: bool,
}

impl Cached for CurrentQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::current(&self.city.id)
    }
}

impl Cached for ForecastQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::forecast(&self.city.id, self.days)
    }
}

impl Cached for HistoricalQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::historical(&self.city.id, self.date)
    }
}

impl Cached for StatsQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::stats(&self.city.id, self.range.start, self.range.end)
    }
}

impl fmt::Display for CurrentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.city.id)
    }
}

impl fmt::Display for ForecastQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} days)", self.city.id, self.days)
    }
}

impl fmt::Display for HistoricalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.city.id, self.date)
    }
}

impl fmt::Display for StatsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} to {}", self.city.id, self.range.start, self.range.end)
    }
}

/// Run a storage call under `timeout`; an elapsed deadline is `StorageUnavailable`.
pub async fn with_storage_deadline<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = WeatherResult<T>>,
) -> WeatherResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(WeatherError::StorageUnavailable(format!(
            "{} timed out after {}ms",
            what,
            timeout.as_millis()
        ))),
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Cache tier for any query with a cache key.
pub struct CacheTier {
    cache: WeatherCache,
    timeout: Duration,
}

impl CacheTier {
    pub fn new(cache: WeatherCache, timeout: Duration) -> Self {
        Self { cache, timeout }
    }
}

#[async_trait]
impl<Q, V> Tier<Q, V> for CacheTier
where
    Q: Cached + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn name(&self) -> &'static str {
        CACHE_TIER
    }

    async fn load(&self, query: &Q) -> WeatherResult<Option<V>> {
        let key = query.cache_key();
        with_storage_deadline(self.timeout, "cache get", self.cache.get(&key)).await
    }

    async fn store(&self, query: &Q, value: &V) -> WeatherResult<()> {
        let key = query.cache_key();
        with_storage_deadline(self.timeout, "cache set", self.cache.set(&key, value)).await
    }
}

// ============================================================================
// Historical store
// ============================================================================

/// Historical store tier. Untracked cities always miss and are never written.
pub struct StoreTier {
    store: Arc<dyn HistoricalStore>,
    timeout: Duration,
}

impl StoreTier {
    pub fn new(store: Arc<dyn HistoricalStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }
}

#[async_trait]
impl Tier<HistoricalQuery, WeatherRecord> for StoreTier {
    fn name(&self) -> &'static str {
        STORE_TIER
    }

    async fn load(&self, query: &HistoricalQuery) -> WeatherResult<Option<WeatherRecord>> {
        if !query.tracked {
            return Ok(None);
        }
        with_storage_deadline(
            self.timeout,
            "history get",
            self.store.get(&query.city.id, query.date),
        )
        .await
    }

    async fn store(&self, query: &HistoricalQuery, value: &WeatherRecord) -> WeatherResult<()> {
        if !query.tracked {
            return Ok(());
        }
        with_storage_deadline(self.timeout, "history upsert", self.store.upsert(value)).await
    }

    fn persists(&self) -> bool {
        true
    }
}

// ============================================================================
// Upstream
// ============================================================================

/// Upstream provider tier. Always the last tier of a cascade.
pub struct UpstreamTier {
    provider: Arc<dyn WeatherProvider>,
    timeout: Duration,
}

impl UpstreamTier {
    pub fn new(provider: Arc<dyn WeatherProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    async fn fetch<T>(
        &self,
        kind: DataKind,
        fut: impl Future<Output = Result<T, provider::UpstreamError>>,
    ) -> WeatherResult<Option<T>> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(e)) => Err(WeatherError::from(e)),
            Err(_) => Err(WeatherError::UpstreamUnavailable(format!(
                "{} did not answer within {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
        };
        metrics::record_upstream(kind, result.is_ok(), started.elapsed());
        result
    }
}

#[async_trait]
impl Tier<CurrentQuery, WeatherRecord> for UpstreamTier {
    fn name(&self) -> &'static str {
        UPSTREAM_TIER
    }

    async fn load(&self, query: &CurrentQuery) -> WeatherResult<Option<WeatherRecord>> {
        self.fetch(DataKind::Current, self.provider.current(&query.city))
            .await
    }
}

#[async_trait]
impl Tier<ForecastQuery, Vec<WeatherRecord>> for UpstreamTier {
    fn name(&self) -> &'static str {
        UPSTREAM_TIER
    }

    async fn load(&self, query: &ForecastQuery) -> WeatherResult<Option<Vec<WeatherRecord>>> {
        self.fetch(
            DataKind::Forecast,
            self.provider.forecast(&query.city, query.days),
        )
        .await
    }
}

#[async_trait]
impl Tier<HistoricalQuery, WeatherRecord> for UpstreamTier {
    fn name(&self) -> &'static str {
        UPSTREAM_TIER
    }

    async fn load(&self, query: &HistoricalQuery) -> WeatherResult<Option<WeatherRecord>> {
        self.fetch(
            DataKind::Historical,
            self.provider.historical(&query.city, query.date),
        )
        .await
    }
}

// ============================================================================
// Stats aggregate
// ============================================================================

/// Builds range statistics by resolving every date through the historical
/// cascade. Any date that cannot be resolved fails the whole range.
pub struct AggregateTier {
    history: Arc<Cascade<HistoricalQuery, WeatherRecord>>,
}

impl AggregateTier {
    pub fn new(history: Arc<Cascade<HistoricalQuery, WeatherRecord>>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Tier<StatsQuery, WeatherStats> for AggregateTier {
    fn name(&self) -> &'static str {
        AGGREGATE_TIER
    }

    async fn load(&self, query: &StatsQuery) -> WeatherResult<Option<WeatherStats>> {
        let mut records = Vec::with_capacity(query.range.days());
        for date in query.range.iter() {
            let day = HistoricalQuery {
                city: query.city.clone(),
                date,
                tracked: query.tracked,
            };
            records.push(self.history.resolve(&day).await?.value);
        }
        WeatherStats::from_records(&records).map(Some)
    }
}
