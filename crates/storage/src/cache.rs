//! Weather cache: key layout and per-kind TTL policy over a [`CacheBackend`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use weather_common::{DataKind, WeatherResult};

use crate::backend::CacheBackend;

/// Namespace shared by every key this service writes.
pub const KEY_NAMESPACE: &str = "weather";

/// Cache key for one (city, kind, params) combination.
///
/// Rendered as `weather:{city}:{kind}[:{param}...]`. Every key of a city
/// shares the `weather:{city}:` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DataKind,
    pub city_id: String,
    pub params: Vec<String>,
}

impl CacheKey {
    pub fn current(city_id: &str) -> Self {
        Self::new(DataKind::Current, city_id, Vec::new())
    }

    pub fn forecast(city_id: &str, days: u8) -> Self {
        Self::new(DataKind::Forecast, city_id, vec![format!("d{}", days)])
    }

    pub fn historical(city_id: &str, date: NaiveDate) -> Self {
        Self::new(DataKind::Historical, city_id, vec![date.to_string()])
    }

    pub fn stats(city_id: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            DataKind::Stats,
            city_id,
            vec![start.to_string(), end.to_string()],
        )
    }

    fn new(kind: DataKind, city_id: &str, params: Vec<String>) -> Self {
        Self {
            kind,
            city_id: city_id.to_lowercase(),
            params,
        }
    }

    /// Prefix matching every key of `city_id`.
    pub fn city_prefix(city_id: &str) -> String {
        format!("{}:{}:", KEY_NAMESPACE, city_id.to_lowercase())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", KEY_NAMESPACE, self.city_id, self.kind)?;
        for param in &self.params {
            write!(f, ":{}", param)?;
        }
        Ok(())
    }
}

/// Expiry per data kind. `None` means the entry never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub current: Option<Duration>,
    pub forecast: Option<Duration>,
    pub historical: Option<Duration>,
    pub stats: Option<Duration>,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            current: Some(Duration::from_secs(30 * 60)),
            forecast: Some(Duration::from_secs(3 * 60 * 60)),
            historical: None,
            stats: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: DataKind) -> Option<Duration> {
        match kind {
            DataKind::Current => self.current,
            DataKind::Forecast => self.forecast,
            DataKind::Historical => self.historical,
            DataKind::Stats => self.stats,
        }
    }
}

/// Key distribution of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_keys: u64,
    /// Key count per data kind
    pub by_kind: BTreeMap<String, u64>,
}

/// Weather cache. Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct WeatherCache {
    backend: Arc<dyn CacheBackend>,
    ttls: CacheTtls,
}

impl WeatherCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttls: CacheTtls) -> Self {
        Self { backend, ttls }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Look up a value. A miss is `Ok(None)`.
    ///
    /// An entry that no longer decodes is removed and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> WeatherResult<Option<T>> {
        let key_str = key.to_string();
        let Some(raw) = self.backend.get(&key_str).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key_str, error = %e, "Dropping undecodable cache entry");
                self.backend.delete(&key_str).await?;
                Ok(None)
            }
        }
    }

    /// Store a value with the TTL of its kind.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> WeatherResult<()> {
        let raw = serde_json::to_string(value)?;
        let ttl = self.ttls.for_kind(key.kind);
        debug!(key = %key, ttl_secs = ?ttl.map(|t| t.as_secs()), "Cache set");
        self.backend.set_ex(&key.to_string(), &raw, ttl).await
    }

    /// Remove every entry for a city, across all kinds.
    pub async fn invalidate(&self, city_id: &str) -> WeatherResult<u64> {
        self.backend
            .delete_prefix(&CacheKey::city_prefix(city_id))
            .await
    }

    /// Count keys by kind.
    pub async fn stats(&self) -> WeatherResult<CacheStats> {
        let keys = self
            .backend
            .keys_with_prefix(&format!("{}:", KEY_NAMESPACE))
            .await?;

        let mut stats = CacheStats {
            total_keys: keys.len() as u64,
            by_kind: DataKind::ALL
                .iter()
                .map(|k| (k.as_str().to_string(), 0))
                .collect(),
        };
        for key in &keys {
            // weather:{city}:{kind}[:...]
            if let Some(kind) = key.split(':').nth(2) {
                *stats.by_kind.entry(kind.to_string()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    pub async fn ping(&self) -> WeatherResult<()> {
        self.backend.ping().await
    }
}
