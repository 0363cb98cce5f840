//! Service wired to in-memory backends and a scripted provider.

use std::sync::Arc;

use storage::{MemoryBackend, MemoryHistoricalStore, WeatherCache};
use test_utils::{registry, ScriptedProvider};
use weather_service::{ServiceSettings, WeatherService};

pub struct Harness {
    pub service: WeatherService,
    pub provider: Arc<ScriptedProvider>,
    pub backend: Arc<MemoryBackend>,
    pub store: Arc<MemoryHistoricalStore>,
}

pub fn harness() -> Harness {
    harness_with(ScriptedProvider::new())
}

pub fn harness_with(provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(MemoryHistoricalStore::new());
    let settings = ServiceSettings::default();

    let service = WeatherService::new(
        Arc::new(registry()),
        WeatherCache::new(backend.clone(), settings.ttls),
        store.clone(),
        provider.clone(),
        settings,
    );

    Harness {
        service,
        provider,
        backend,
        store,
    }
}
