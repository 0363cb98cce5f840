//! The weather orchestrator.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use provider::WeatherProvider;
use storage::{CacheStats, HistoricalStore, HistoryStats, WeatherCache};
use weather_common::{
    City, CityRegistry, DataKind, DateRange, ResponseMeta, StatsReport, UnitSystem, WeatherError,
    WeatherRecord, WeatherReport, WeatherResult, WeatherStats, HISTORICAL_EPOCH,
};

use crate::cascade::{Cascade, Resolved, Tier};
use crate::config::ServiceSettings;
use crate::metrics;
use crate::tiers::{
    with_storage_deadline, AggregateTier, CacheTier, CurrentQuery, ForecastQuery, HistoricalQuery,
    StatsQuery, StoreTier, UpstreamTier, CACHE_TIER,
};

/// A single converted record with its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherResponse {
    pub city: City,
    pub data: WeatherReport,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub city: City,
    pub days: u8,
    pub data: Vec<WeatherReport>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub city: City,
    pub data: StatsReport,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearStatus {
    Success,
    /// Nothing was stored for the city.
    NoData,
}

/// Outcome of clearing a city's cached and stored data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub city: String,
    pub cache_keys_removed: u64,
    /// `None` when historical clearing was not requested.
    pub historical_records_removed: Option<u64>,
    pub status: ClearStatus,
}

/// Cache and historical store contents.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStatsReport {
    pub cache: CacheStats,
    pub historical: HistoryStats,
    pub tracked_cities: Vec<String>,
}

/// Decides, per request, whether to answer from cache, historical store or
/// upstream, and keeps the faster tiers warm.
pub struct WeatherService {
    pub(crate) cities: Arc<CityRegistry>,
    pub(crate) cache: WeatherCache,
    pub(crate) store: Arc<dyn HistoricalStore>,
    pub(crate) provider: Arc<dyn WeatherProvider>,
    pub(crate) settings: ServiceSettings,
    current: Cascade<CurrentQuery, WeatherRecord>,
    forecast: Cascade<ForecastQuery, Vec<WeatherRecord>>,
    pub(crate) history: Arc<Cascade<HistoricalQuery, WeatherRecord>>,
    stats: Cascade<StatsQuery, WeatherStats>,
}

impl WeatherService {
    pub fn new(
        cities: Arc<CityRegistry>,
        cache: WeatherCache,
        store: Arc<dyn HistoricalStore>,
        provider: Arc<dyn WeatherProvider>,
        settings: ServiceSettings,
    ) -> Self {
        let cache_tier = Arc::new(CacheTier::new(cache.clone(), settings.storage_timeout));
        let store_tier = Arc::new(StoreTier::new(store.clone(), settings.storage_timeout));
        let upstream = Arc::new(UpstreamTier::new(provider.clone(), settings.upstream_timeout));

        let current = Cascade::new(
            DataKind::Current,
            vec![
                cache_tier.clone() as Arc<dyn Tier<CurrentQuery, WeatherRecord>>,
                upstream.clone() as Arc<dyn Tier<CurrentQuery, WeatherRecord>>,
            ],
        );
        let forecast = Cascade::new(
            DataKind::Forecast,
            vec![
                cache_tier.clone() as Arc<dyn Tier<ForecastQuery, Vec<WeatherRecord>>>,
                upstream.clone() as Arc<dyn Tier<ForecastQuery, Vec<WeatherRecord>>>,
            ],
        );
        let history = Arc::new(Cascade::new(
            DataKind::Historical,
            vec![
                cache_tier.clone() as Arc<dyn Tier<HistoricalQuery, WeatherRecord>>,
                store_tier as Arc<dyn Tier<HistoricalQuery, WeatherRecord>>,
                upstream as Arc<dyn Tier<HistoricalQuery, WeatherRecord>>,
            ],
        ));
        let stats = Cascade::new(
            DataKind::Stats,
            vec![
                cache_tier as Arc<dyn Tier<StatsQuery, WeatherStats>>,
                Arc::new(AggregateTier::new(history.clone())) as Arc<dyn Tier<StatsQuery, WeatherStats>>,
            ],
        );

        Self {
            cities,
            cache,
            store,
            provider,
            settings,
            current,
            forecast,
            history,
            stats,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn cities(&self) -> &CityRegistry {
        &self.cities
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn HistoricalStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn meta<V>(&self, resolved: &Resolved<V>, kind: DataKind) -> ResponseMeta {
        ResponseMeta {
            cached: resolved.source == CACHE_TIER,
            source: resolved.source.to_string(),
            data_kind: kind,
            provider: self.provider.name().to_string(),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Current conditions for a city.
    #[instrument(skip(self))]
    pub async fn current_weather(&self, city_id: &str, units: UnitSystem) -> WeatherResult<WeatherResponse> {
        let result = self.current_inner(city_id, units).await;
        metrics::record_request(DataKind::Current, result.is_ok());
        result
    }

    async fn current_inner(&self, city_id: &str, units: UnitSystem) -> WeatherResult<WeatherResponse> {
        let city = self.cities.resolve(city_id)?.clone();
        let resolved = self.current.resolve(&CurrentQuery { city: city.clone() }).await?;
        Ok(WeatherResponse {
            data: resolved.value.to_report(units),
            meta: self.meta(&resolved, DataKind::Current),
            city,
        })
    }

    /// Daily forecast of `days` days starting today.
    #[instrument(skip(self))]
    pub async fn forecast(&self, city_id: &str, days: u8, units: UnitSystem) -> WeatherResult<ForecastResponse> {
        let result = self.forecast_inner(city_id, days, units).await;
        metrics::record_request(DataKind::Forecast, result.is_ok());
        result
    }

    async fn forecast_inner(&self, city_id: &str, days: u8, units: UnitSystem) -> WeatherResult<ForecastResponse> {
        let city = self.cities.resolve(city_id)?.clone();
        if days < 1 || days > self.settings.max_forecast_days {
            return Err(WeatherError::invalid(
                "days",
                format!(
                    "must be between 1 and {}, got {}",
                    self.settings.max_forecast_days, days
                ),
            ));
        }

        let query = ForecastQuery { city: city.clone(), days };
        let resolved = self.forecast.resolve(&query).await?;
        Ok(ForecastResponse {
            data: resolved.value.iter().map(|r| r.to_report(units)).collect(),
            meta: self.meta(&resolved, DataKind::Forecast),
            days,
            city,
        })
    }

    /// Weather for one past date.
    #[instrument(skip(self))]
    pub async fn historical(&self, city_id: &str, date: NaiveDate, units: UnitSystem) -> WeatherResult<WeatherResponse> {
        let result = self.historical_inner(city_id, date, units).await;
        metrics::record_request(DataKind::Historical, result.is_ok());
        result
    }

    async fn historical_inner(&self, city_id: &str, date: NaiveDate, units: UnitSystem) -> WeatherResult<WeatherResponse> {
        let city = self.cities.resolve(city_id)?.clone();
        self.check_historical_date("date", date)?;

        let query = HistoricalQuery {
            tracked: self.cities.is_tracked(&city.id),
            city: city.clone(),
            date,
        };
        let resolved = self.history.resolve(&query).await?;
        Ok(WeatherResponse {
            data: resolved.value.to_report(units),
            meta: self.meta(&resolved, DataKind::Historical),
            city,
        })
    }

    /// Aggregates over `start..=end`, converted once at the end.
    #[instrument(skip(self))]
    pub async fn stats(
        &self,
        city_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        units: UnitSystem,
    ) -> WeatherResult<StatsResponse> {
        let result = self.stats_inner(city_id, start, end, units).await;
        metrics::record_request(DataKind::Stats, result.is_ok());
        result
    }

    async fn stats_inner(
        &self,
        city_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        units: UnitSystem,
    ) -> WeatherResult<StatsResponse> {
        let city = self.cities.resolve(city_id)?.clone();
        let range = DateRange::new(start, end)?;
        self.check_historical_date("start_date", start)?;
        self.check_historical_date("end_date", end)?;
        if range.days() > self.settings.max_stats_days {
            return Err(WeatherError::invalid(
                "end_date",
                format!(
                    "range covers {} days, at most {} allowed",
                    range.days(),
                    self.settings.max_stats_days
                ),
            ));
        }

        let query = StatsQuery {
            tracked: self.cities.is_tracked(&city.id),
            city: city.clone(),
            range,
        };
        let resolved = self.stats.resolve(&query).await?;
        Ok(StatsResponse {
            data: resolved.value.to_report(units),
            meta: self.meta(&resolved, DataKind::Stats),
            city,
        })
    }

    /// Reads stop at yesterday; today is still changing and cached entries
    /// for past days never expire.
    fn check_historical_date(&self, param: &str, date: NaiveDate) -> WeatherResult<()> {
        let latest = Self::today().pred_opt().unwrap_or(NaiveDate::MIN);
        if date < HISTORICAL_EPOCH || date > latest {
            return Err(WeatherError::invalid(
                param,
                format!(
                    "{} is outside the available range {} to {}",
                    date, HISTORICAL_EPOCH, latest
                ),
            ));
        }
        Ok(())
    }

    /// Remove a city's cache entries and, if asked, its stored history.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self, city_id: &str, clear_historical: bool) -> WeatherResult<ClearReport> {
        let city = self.cities.resolve(city_id)?;
        let timeout = self.settings.storage_timeout;

        let cache_keys_removed =
            with_storage_deadline(timeout, "cache invalidate", self.cache.invalidate(&city.id)).await?;

        let historical_records_removed = if clear_historical {
            Some(
                with_storage_deadline(timeout, "history delete", self.store.delete_by_city(&city.id))
                    .await?,
            )
        } else {
            None
        };

        let removed_any = cache_keys_removed > 0 || historical_records_removed.unwrap_or(0) > 0;
        let status = if removed_any {
            ClearStatus::Success
        } else {
            ClearStatus::NoData
        };

        info!(
            city = %city.id,
            cache_keys_removed = cache_keys_removed,
            historical_records_removed = ?historical_records_removed,
            "Cleared city data"
        );

        Ok(ClearReport {
            city: city.id.clone(),
            cache_keys_removed,
            historical_records_removed,
            status,
        })
    }

    /// Key distribution of the cache and contents of the historical store.
    pub async fn cache_stats(&self) -> WeatherResult<StorageStatsReport> {
        let timeout = self.settings.storage_timeout;
        let cache = with_storage_deadline(timeout, "cache stats", self.cache.stats()).await?;
        let historical = with_storage_deadline(timeout, "history stats", self.store.stats()).await?;

        Ok(StorageStatsReport {
            cache,
            historical,
            tracked_cities: self.cities.tracked_ids().map(str::to_string).collect(),
        })
    }

    /// Check both storage backends respond.
    pub async fn ready(&self) -> WeatherResult<()> {
        let timeout = self.settings.storage_timeout;
        with_storage_deadline(timeout, "cache ping", self.cache.ping()).await?;
        with_storage_deadline(timeout, "history stats", self.store.stats()).await?;
        Ok(())
    }

    pub fn list_cities(&self) -> Vec<City> {
        self.cities.list().into_iter().cloned().collect()
    }

    pub fn search_cities(&self, query: &str, limit: usize) -> WeatherResult<Vec<City>> {
        Ok(self
            .cities
            .search(query, limit)?
            .into_iter()
            .cloned()
            .collect())
    }
}
