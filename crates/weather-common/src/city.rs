//! City reference data.
//!
//! The registry is built once at startup and never mutated afterwards, so it
//! can be shared across requests behind an `Arc` without locking.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WeatherError, WeatherResult};

/// Built-in city table shipped with the crate.
const BUILTIN_CITIES: &str = include_str!("../data/cities.yaml");

/// Maximum number of search results returned at once.
pub const MAX_SEARCH_LIMIT: usize = 10;

/// A known city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Identifier in `name,country-code` form, lowercase (e.g. `london,gb`).
    pub id: String,
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// UTC offset such as `+01:00`.
    pub utc_offset: String,
}

/// On-disk layout of a cities file.
#[derive(Debug, Deserialize)]
struct CitiesFile {
    #[serde(default)]
    tracked: Vec<String>,
    cities: Vec<City>,
}

/// Immutable lookup table of known cities.
#[derive(Debug, Clone)]
pub struct CityRegistry {
    cities: BTreeMap<String, City>,
    /// Cities whose history is persisted in the historical store.
    tracked: BTreeSet<String>,
}

impl CityRegistry {
    /// Build a registry from cities and the ids tracked for history.
    ///
    /// Ids are normalized to lowercase. A tracked id that is not a known city
    /// is rejected.
    pub fn new(
        cities: impl IntoIterator<Item = City>,
        tracked: impl IntoIterator<Item = String>,
    ) -> WeatherResult<Self> {
        let mut map = BTreeMap::new();
        for mut city in cities {
            city.id = city.id.trim().to_lowercase();
            if city.id.is_empty() {
                return Err(WeatherError::invalid("cities", "city id must not be empty"));
            }
            if map.insert(city.id.clone(), city).is_some() {
                return Err(WeatherError::invalid("cities", "duplicate city id"));
            }
        }

        let mut tracked_ids = BTreeSet::new();
        for id in tracked {
            let id = id.trim().to_lowercase();
            if !map.contains_key(&id) {
                return Err(WeatherError::invalid(
                    "tracked",
                    format!("tracked city '{}' is not a known city", id),
                ));
            }
            tracked_ids.insert(id);
        }

        Ok(Self {
            cities: map,
            tracked: tracked_ids,
        })
    }

    /// Registry with the built-in city table.
    pub fn builtin() -> WeatherResult<Self> {
        Self::from_yaml(BUILTIN_CITIES)
    }

    /// Parse a registry from YAML (`cities:` list plus optional `tracked:` ids).
    pub fn from_yaml(content: &str) -> WeatherResult<Self> {
        let file: CitiesFile = serde_yaml::from_str(content)
            .map_err(|e| WeatherError::invalid("cities", format!("invalid cities file: {}", e)))?;
        Self::new(file.cities, file.tracked)
    }

    /// Load a registry from a YAML file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> WeatherResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WeatherError::invalid("cities", format!("failed to read {:?}: {}", path, e))
        })?;
        let registry = Self::from_yaml(&content)?;
        tracing::info!(
            cities = registry.len(),
            tracked = registry.tracked.len(),
            "Loaded city table from {:?}",
            path
        );
        Ok(registry)
    }

    /// Look up a city by exact identifier.
    pub fn get(&self, id: &str) -> Option<&City> {
        self.cities.get(&id.trim().to_lowercase())
    }

    /// Resolve an identifier or display name to a known city.
    ///
    /// The identifier is tried first; a case-insensitive display-name match is
    /// the fallback.
    pub fn resolve(&self, id_or_name: &str) -> WeatherResult<&City> {
        let key = id_or_name.trim().to_lowercase();
        if let Some(city) = self.cities.get(&key) {
            return Ok(city);
        }

        self.cities
            .values()
            .find(|c| c.name.to_lowercase() == key)
            .ok_or_else(|| WeatherError::CityNotFound(id_or_name.to_string()))
    }

    /// Whether the city's history is persisted.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.tracked.contains(&id.trim().to_lowercase())
    }

    pub fn tracked_ids(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(String::as_str)
    }

    /// All cities sorted by "name, country".
    pub fn list(&self) -> Vec<&City> {
        let mut cities: Vec<&City> = self.cities.values().collect();
        cities.sort_by_key(|c| format!("{}, {}", c.name, c.country));
        cities
    }

    /// Search cities.
    ///
    /// - two letters: all cities in that country
    /// - contains a comma: exact identifier
    /// - otherwise: substring match on the display name
    pub fn search(&self, query: &str, limit: usize) -> WeatherResult<Vec<&City>> {
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(WeatherError::invalid(
                "limit",
                format!("must be between 1 and {}", MAX_SEARCH_LIMIT),
            ));
        }

        let q = query.trim().to_lowercase();
        let mut results: Vec<&City> = if q.chars().count() == 2 {
            self.cities
                .values()
                .filter(|c| c.country.to_lowercase() == q)
                .collect()
        } else if q.contains(',') {
            self.cities.get(&q).into_iter().collect()
        } else {
            self.cities
                .values()
                .filter(|c| c.name.to_lowercase().contains(&q))
                .collect()
        };

        if results.is_empty() {
            return Err(WeatherError::CityNotFound(query.to_string()));
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        results.truncate(limit);
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
