//! Weather request orchestration.
//!
//! [`WeatherService`] answers current, forecast, historical and stats
//! requests through [`Cascade`]s of cache, historical store and upstream
//! tiers, and runs bulk population of the historical store.

pub mod cascade;
pub mod config;
pub mod metrics;
pub mod population;
pub mod service;
pub mod tiers;

pub use cascade::{Cascade, Resolved, Tier};
pub use config::ServiceSettings;
pub use population::{FailedDate, PopulationReport, PopulationRequest};
pub use service::{
    ClearReport, ClearStatus, ForecastResponse, StatsResponse, StorageStatsReport, WeatherResponse,
    WeatherService,
};

pub use tokio_util::sync::CancellationToken;
