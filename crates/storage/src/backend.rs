//! Key-value backends for the weather cache.
//!
//! [`RedisBackend`] is the production backend. [`MemoryBackend`] keeps
//! everything in process and is used for development runs and tests; it
//! reads time from `tokio::time` so expiry can be driven by a paused clock.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use weather_common::{WeatherError, WeatherResult};

/// Minimal key-value contract the cache policy needs.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>>;

    /// Store `value`; `None` means no expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Option<Duration>) -> WeatherResult<()>;

    async fn delete(&self, key: &str) -> WeatherResult<()>;

    /// Delete every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> WeatherResult<u64>;

    /// Live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> WeatherResult<Vec<String>>;

    async fn ping(&self) -> WeatherResult<()>;
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> WeatherError {
    WeatherError::StorageUnavailable(format!("{}: {}", context, err))
}

// ============================================================================
// Redis
// ============================================================================

/// Redis backend over a multiplexed async connection.
pub struct RedisBackend {
    conn: MultiplexedConnection,
}

impl RedisBackend {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> WeatherResult<Self> {
        let client = Client::open(redis_url).map_err(|e| unavailable("Redis connection failed", e))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| unavailable("Redis connection failed", e))?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }

    /// Collect keys matching `pattern` with incremental SCAN.
    async fn scan(&self, pattern: &str) -> WeatherResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable("Pattern search failed", e))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

/// Glob pattern matching every key that starts with `prefix`.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| unavailable("Cache get failed", e))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Option<Duration>) -> WeatherResult<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = match ttl {
            // SETEX rejects a zero expiry
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };
        result.map_err(|e| unavailable("Cache set failed", e))
    }

    async fn delete(&self, key: &str) -> WeatherResult<()> {
        let mut conn = self.conn.clone();
        let _: u64 = conn
            .del(key)
            .await
            .map_err(|e| unavailable("Cache delete failed", e))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> WeatherResult<u64> {
        let keys = self.scan(&prefix_pattern(prefix)).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let mut removed = 0u64;
        for chunk in keys.chunks(500) {
            let n: u64 = conn
                .del(chunk)
                .await
                .map_err(|e| unavailable("Delete failed", e))?;
            removed += n;
        }

        debug!(prefix = %prefix, removed = removed, "Deleted cache keys");
        Ok(removed)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> WeatherResult<Vec<String>> {
        self.scan(&prefix_pattern(prefix)).await
    }

    async fn ping(&self) -> WeatherResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("Redis ping failed", e))?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Counters for the in-memory backend. Lock-free reads.
#[derive(Debug, Default)]
pub struct MemoryBackendStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Entries dropped on read because their TTL had passed
    pub expired: AtomicU64,
    /// Entries pushed out by the capacity limit
    pub evictions: AtomicU64,
}

impl MemoryBackendStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-process LRU backend with lazy TTL expiry.
pub struct MemoryBackend {
    entries: RwLock<LruCache<String, Entry>>,
    stats: MemoryBackendStats,
    /// Set to simulate an unreachable cache.
    offline: AtomicBool,
}

impl MemoryBackend {
    pub const DEFAULT_CAPACITY: usize = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Backend holding at most `capacity` keys; least recently used go first.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            stats: MemoryBackendStats::default(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> &MemoryBackendStats {
        &self.stats
    }

    /// Make every call fail with `StorageUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> WeatherResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(WeatherError::StorageUnavailable("memory cache is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Number of entries held, including any not yet lazily expired.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let expired = match entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            None => false,
        };

        if expired {
            entries.pop(key);
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Option<Duration>) -> WeatherResult<()> {
        self.check_online()?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        let mut entries = self.entries.write().await;
        if let Some((old_key, _)) = entries.push(key.to_string(), entry) {
            if old_key != key {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> WeatherResult<()> {
        self.check_online()?;
        self.entries.write().await.pop(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> WeatherResult<u64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let doomed: Vec<(String, bool)> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.is_expired(now)))
            .collect();

        let mut removed = 0u64;
        for (key, expired) in doomed {
            entries.pop(&key);
            // Already-expired entries are gone as far as callers know
            if !expired {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> WeatherResult<Vec<String>> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn ping(&self) -> WeatherResult<()> {
        self.check_online()
    }
}
