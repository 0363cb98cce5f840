//! Storage for the weather services.
//!
//! Provides:
//! - A key-value cache with per-kind TTLs (Redis, or in-memory for dev/tests)
//! - A historical store with one record per (city, date) (PostgreSQL, or in-memory)

pub mod backend;
pub mod cache;
pub mod history;
pub mod memory_history;

pub use backend::{CacheBackend, MemoryBackend, MemoryBackendStats, RedisBackend};
pub use cache::{CacheKey, CacheStats, CacheTtls, WeatherCache};
pub use history::{HistoricalStore, HistoryStats, PgHistoricalStore, DEFAULT_HISTORY_TABLE};
pub use memory_history::MemoryHistoricalStore;
