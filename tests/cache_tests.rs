mod common;

use brrtrouter_core::definition::{CommandDefinition, Definition, RawRoute, RouteDefinition};
use brrtrouter_core::error::{CacheError, ScanError, SetupError};
use brrtrouter_core::manifest::ManifestScanner;
use brrtrouter_core::registry::{CacheFile, Registry, SetupOptions, SetupSource};
use brrtrouter_core::router::{HttpInput, Router};
use common::fixtures::{command_registry, route_registry, ZOO_MANIFEST};
use common::temp_files::{cleanup_temp_files, create_temp_yaml, temp_path};
use http::Method;
use serde_json::Value;
use std::sync::Arc;

fn options(cache: &std::path::Path) -> SetupOptions {
    SetupOptions {
        cache_path: Some(cache.to_path_buf()),
        ..SetupOptions::default()
    }
}

/// Scanner that must not be called
fn unreachable_scanner() -> Result<Vec<RawRoute>, ScanError> {
    Err(ScanError::new("scanner called on a warm start"))
}

#[test]
fn test_warm_start_matches_like_cold_start() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");
    let cold = route_registry(&manifest);
    CacheFile::new(&cache).write(&cold).unwrap();

    let mut warm = Registry::<RouteDefinition>::new();
    let source = warm.setup(&unreachable_scanner, &options(&cache)).unwrap();
    assert_eq!(source, SetupSource::Cache);
    assert_eq!(warm.len(), cold.len());
    for (a, b) in cold.all().iter().zip(warm.all()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.matcher_source(), b.matcher_source());
    }

    let cold_router = Router::new(Arc::new(cold));
    let warm_router = Router::new(Arc::new(warm));
    for (method, uri) in [
        (Method::GET, "/zoo/animals/42"),
        (Method::GET, "/zoo/animals/lion"),
        (Method::GET, "/zoo/enclosures"),
        (Method::POST, "/zoo/animals"),
        (Method::GET, "/zoo/files/a/b"),
        (Method::GET, "/nope"),
    ] {
        let input = HttpInput::new(method, uri);
        let a = cold_router.route(&input).unwrap().matched();
        let b = warm_router.route(&input).unwrap().matched();
        assert_eq!(a.as_ref().map(|m| m.name()), b.as_ref().map(|m| m.name()), "{uri}");
        assert_eq!(
            a.map(|m| m.params_map()),
            b.map(|m| m.params_map()),
            "{uri}"
        );
    }

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_command_cache_round_trip() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");
    let cold = command_registry(&manifest);
    CacheFile::new(&cache).write(&cold).unwrap();

    let warm = CacheFile::new(&cache).read::<CommandDefinition>().unwrap();
    assert_eq!(**warm.get("feed").unwrap(), **cold.get("feed").unwrap());
    assert_eq!(warm.get("feed").unwrap().description.as_deref(), Some("Feed an animal"));

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_route_cache_is_not_a_command_cache() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");

    // route entries do not even parse as command entries
    CacheFile::new(&cache).write(&route_registry(&manifest)).unwrap();
    let err = CacheFile::new(&cache).read::<CommandDefinition>().unwrap_err();
    assert!(matches!(err, CacheError::Malformed(_)), "{err}");

    // with no entries the envelope kind still tells them apart
    CacheFile::new(&cache).write(&Registry::<RouteDefinition>::new()).unwrap();
    let err = CacheFile::new(&cache).read::<CommandDefinition>().unwrap_err();
    assert!(matches!(err, CacheError::KindMismatch { .. }), "{err}");

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_edited_cache_file_fails_checksum() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");
    CacheFile::new(&cache).write(&route_registry(&manifest)).unwrap();

    let mut document: Value = serde_json::from_str(&std::fs::read_to_string(&cache).unwrap()).unwrap();
    document["entries"][0]["target"] = Value::String("Evil::root".into());
    std::fs::write(&cache, serde_json::to_string(&document).unwrap()).unwrap();

    let mut registry = Registry::<RouteDefinition>::new();
    let err = registry.setup(&unreachable_scanner, &options(&cache)).unwrap_err();
    assert!(matches!(err, SetupError::Cache(CacheError::Checksum { .. })), "{err}");
    assert!(registry.is_empty());

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_future_schema_version_is_rejected() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");
    CacheFile::new(&cache).write(&route_registry(&manifest)).unwrap();

    let mut document: Value = serde_json::from_str(&std::fs::read_to_string(&cache).unwrap()).unwrap();
    document["schema_version"] = Value::from(2);
    std::fs::write(&cache, serde_json::to_string(&document).unwrap()).unwrap();

    let err = CacheFile::new(&cache).read::<RouteDefinition>().unwrap_err();
    assert!(matches!(err, CacheError::SchemaVersion { found: 2, .. }), "{err}");

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_truncated_cache_file_is_malformed() {
    let cache = temp_path("json");
    std::fs::write(&cache, r#"{"schema_version": 1, "kind": "route", "entr"#).unwrap();

    let err = CacheFile::new(&cache).read::<RouteDefinition>().unwrap_err();
    assert!(matches!(err, CacheError::Malformed(_)), "{err}");

    cleanup_temp_files(&[cache]);
}

#[test]
fn test_force_rebuild_ignores_cache_and_rescans() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");
    std::fs::write(&cache, "garbage").unwrap();

    let mut registry = Registry::<RouteDefinition>::new();
    let rebuild = SetupOptions {
        force_rebuild: true,
        ..options(&cache)
    };
    let source = registry.setup(&ManifestScanner::new(&manifest), &rebuild).unwrap();
    assert_eq!(source, SetupSource::Scanner);
    assert_eq!(registry.len(), 8);

    // a second setup without force is a no-op
    let source = registry.setup(&unreachable_scanner, &options(&cache)).unwrap();
    assert_eq!(source, SetupSource::Unchanged);

    cleanup_temp_files(&[manifest, cache]);
}

#[test]
fn test_missing_cache_file_falls_back_to_scanner() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let cache = temp_path("json");

    let mut registry = Registry::<RouteDefinition>::new();
    let source = registry.setup(&ManifestScanner::new(&manifest), &options(&cache)).unwrap();
    assert_eq!(source, SetupSource::Scanner);
    assert!(!cache.exists());

    cleanup_temp_files(&[manifest]);
}
