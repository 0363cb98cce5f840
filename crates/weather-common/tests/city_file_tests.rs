//! Loading city tables from YAML files.

use std::io::Write;

use weather_common::{CityRegistry, WeatherError};

const SMALL_TABLE: &str = r#"
tracked:
  - "Gdansk,PL"
cities:
  - id: "Gdansk,PL"
    name: "Gdańsk"
    country: "PL"
    state: "Pomeranian"
    latitude: 54.352
    longitude: 18.6466
    utc_offset: "+01:00"
  - id: "reykjavik,is"
    name: "Reykjavik"
    country: "IS"
    latitude: 64.1466
    longitude: -21.9426
    utc_offset: "+00:00"
"#;

#[test]
fn test_load_from_file_normalizes_ids() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SMALL_TABLE.as_bytes()).unwrap();

    let registry = CityRegistry::load_from_file(file.path()).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.get("gdansk,pl").is_some());
    assert!(registry.is_tracked("gdansk,pl"));
    assert!(!registry.is_tracked("reykjavik,is"));
    assert!(registry.get("reykjavik,is").unwrap().state.is_none());
}

#[test]
fn test_missing_file_is_rejected() {
    let err = CityRegistry::load_from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, WeatherError::InvalidParameter { .. }));
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let yaml = r#"
cities:
  - { id: "a,aa", name: "A", country: "AA", latitude: 0.0, longitude: 0.0, utc_offset: "+00:00" }
  - { id: "A,AA", name: "A2", country: "AA", latitude: 1.0, longitude: 1.0, utc_offset: "+00:00" }
"#;
    assert!(CityRegistry::from_yaml(yaml).is_err());
}
