//! Ordered read-through chain of data sources.
//!
//! A [`Cascade`] holds tiers from fastest to most authoritative, for example
//! cache, then historical store, then upstream. Reads walk the chain until a
//! tier has the value and then write it back into the tiers that missed.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use weather_common::{DataKind, WeatherError, WeatherResult};

use crate::metrics;

/// One source of values for queries of type `Q`.
#[async_trait]
pub trait Tier<Q: Sync, V: Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` is a miss.
    async fn load(&self, query: &Q) -> WeatherResult<Option<V>>;

    /// Write back a value found further down the chain.
    async fn store(&self, _query: &Q, _value: &V) -> WeatherResult<()> {
        Ok(())
    }

    /// Durable tiers must accept backfill during a forced refresh.
    fn persists(&self) -> bool {
        false
    }
}

/// A value and the tier that produced it.
#[derive(Debug, Clone)]
pub struct Resolved<V> {
    pub value: V,
    pub source: &'static str,
}

/// Tiers in lookup order; the last one is authoritative.
pub struct Cascade<Q: Sync, V: Sync> {
    kind: DataKind,
    tiers: Vec<Arc<dyn Tier<Q, V>>>,
}

impl<Q, V> Cascade<Q, V>
where
    Q: Display + Send + Sync,
    V: Send + Sync,
{
    pub fn new(kind: DataKind, tiers: Vec<Arc<dyn Tier<Q, V>>>) -> Self {
        Self { kind, tiers }
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    fn last_index(&self) -> WeatherResult<usize> {
        self.tiers
            .len()
            .checked_sub(1)
            .ok_or_else(|| WeatherError::Internal(format!("{} cascade has no tiers", self.kind)))
    }

    /// Walk the tiers in order and return the first hit.
    ///
    /// A failing tier other than the last is treated as a miss. Tiers that
    /// missed are backfilled; backfill failures are logged only.
    pub async fn resolve(&self, query: &Q) -> WeatherResult<Resolved<V>> {
        let last = self.last_index()?;

        for (i, tier) in self.tiers.iter().enumerate() {
            match tier.load(query).await {
                Ok(Some(value)) => {
                    metrics::record_tier_hit(self.kind, tier.name());
                    debug!(query = %query, tier = tier.name(), "Cascade hit");
                    self.backfill(query, &value, i, false).await?;
                    return Ok(Resolved {
                        value,
                        source: tier.name(),
                    });
                }
                Ok(None) => {
                    metrics::record_tier_miss(self.kind, tier.name());
                }
                Err(e) if i < last => {
                    metrics::record_tier_error(self.kind, tier.name());
                    warn!(query = %query, tier = tier.name(), error = %e, "Tier failed, falling through");
                }
                Err(e) => {
                    metrics::record_tier_error(self.kind, tier.name());
                    return Err(e);
                }
            }
        }

        Err(self.not_found(query))
    }

    /// Load from the authoritative tier only and write the result through
    /// every other tier.
    ///
    /// Backfill failures of tiers that [`persist`](Tier::persists) are
    /// returned; the rest are logged.
    pub async fn refresh(&self, query: &Q) -> WeatherResult<Resolved<V>> {
        let last = self.last_index()?;
        let tier = &self.tiers[last];

        let value = match tier.load(query).await {
            Ok(Some(value)) => value,
            Ok(None) => return Err(self.not_found(query)),
            Err(e) => {
                metrics::record_tier_error(self.kind, tier.name());
                return Err(e);
            }
        };

        self.backfill(query, &value, last, true).await?;
        Ok(Resolved {
            value,
            source: tier.name(),
        })
    }

    /// Store `value` in tiers `0..upto`, nearest to the source first.
    async fn backfill(&self, query: &Q, value: &V, upto: usize, strict: bool) -> WeatherResult<()> {
        for tier in self.tiers[..upto].iter().rev() {
            if let Err(e) = tier.store(query, value).await {
                if strict && tier.persists() {
                    return Err(e);
                }
                warn!(query = %query, tier = tier.name(), error = %e, "Backfill failed");
            }
        }
        Ok(())
    }

    fn not_found(&self, query: &Q) -> WeatherError {
        WeatherError::DataNotAvailable(format!("no {} data for {}", self.kind, query))
    }
}
