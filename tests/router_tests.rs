mod common;

use brrtrouter_core::definition::Definition;
use brrtrouter_core::error::DispatchError;
use brrtrouter_core::router::{HttpInput, MatchOutcome};
use common::fixtures::{route_registry, route_router, ZOO_MANIFEST};
use common::temp_files::{cleanup_temp_files, create_temp_yaml};
use http::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[test]
fn test_verb_zoo_matches() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let router = route_router(&manifest);

    let cases: Vec<(Method, &str, &str)> = vec![
        (Method::GET, "/", "root"),
        (Method::GET, "/zoo/animals", "animals.list"),
        (Method::POST, "/zoo/animals", "animals.create"),
        (Method::GET, "/zoo/animals/42", "animals.show"),
        (Method::PUT, "/zoo/animals/42", "animals.show"),
        (Method::PATCH, "/zoo/animals/42", "animals.show"),
        (Method::DELETE, "/zoo/animals/42", "animals.show"),
        (Method::GET, "/zoo/animals/lion", "animals.by_species"),
        (Method::HEAD, "/zoo/health", "health"),
        (Method::OPTIONS, "/zoo/files/a.txt", "files"),
        (Method::GET, "/zoo/enclosures", "enclosures.page"),
        (Method::GET, "/zoo/enclosures/3", "enclosures.page"),
    ];

    for (method, path, expected) in cases {
        let outcome = router.route(&HttpInput::new(method.clone(), path)).unwrap();
        let hit = outcome
            .matched()
            .unwrap_or_else(|| panic!("{method} {path} did not match"));
        assert_eq!(hit.name(), expected, "{method} {path}");
    }

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_params_are_cast() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let router = route_router(&manifest);

    let params = |method: Method, uri: &str| -> BTreeMap<String, Value> {
        router
            .route(&HttpInput::new(method, uri))
            .unwrap()
            .matched()
            .unwrap()
            .params_map()
    };

    assert_eq!(params(Method::GET, "/zoo/animals/42")["id"], json!(42));
    assert_eq!(params(Method::GET, "/zoo/animals/lion")["species"], json!("lion"));
    assert_eq!(params(Method::GET, "/zoo/enclosures")["page"], json!(1));
    assert_eq!(params(Method::GET, "/zoo/enclosures/7?sort=desc")["page"], json!(7));
    assert_eq!(
        params(Method::GET, "/zoo/files/maps/north/wing.png")["path"],
        json!(["maps", "north", "wing.png"])
    );

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_unknown_paths_do_not_match() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let router = route_router(&manifest);

    for path in ["/zoo", "/zoo/animals/42/photos", "/zoo/enclosures/first", "/museum"] {
        match router.route(&HttpInput::new(Method::GET, path)).unwrap() {
            MatchOutcome::NotMatched(miss) => {
                assert!(!miss.method_not_allowed(), "{path} should be a plain miss");
            }
            MatchOutcome::Matched(hit) => panic!("{path} unexpectedly matched {}", hit.name()),
        }
    }

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_wrong_method_reports_allowed_methods() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let router = route_router(&manifest);

    let MatchOutcome::NotMatched(miss) = router
        .route(&HttpInput::new(Method::POST, "/zoo/animals/42"))
        .unwrap()
    else {
        panic!("POST on a GET/PUT/PATCH/DELETE route must not match");
    };
    assert_eq!(
        miss.allowed,
        vec![Method::GET, Method::PUT, Method::PATCH, Method::DELETE]
    );

    let MatchOutcome::NotMatched(miss) = router
        .route(&HttpInput::new(Method::DELETE, "/zoo/health"))
        .unwrap()
    else {
        panic!("DELETE /zoo/health must not match");
    };
    assert_eq!(miss.allowed, vec![Method::GET]);

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_cast_overflow_is_an_error() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let router = route_router(&manifest);

    let err = router
        .route(&HttpInput::new(Method::GET, "/zoo/animals/99999999999999999999"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::ParameterCast(ref e) if e.parameter == "id"));

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_generated_paths_match_their_route() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let registry = route_registry(&manifest);
    let router = route_router(&manifest);

    let cases = vec![
        ("animals.show", json!({"id": 42}), "/zoo/animals/42"),
        ("animals.by_species", json!({"species": "snow-leopard"}), "/zoo/animals/snow-leopard"),
        ("enclosures.page", json!({}), "/zoo/enclosures"),
        ("enclosures.page", json!({"page": 4}), "/zoo/enclosures/4"),
        ("files", json!({"path": ["maps", "east.png"]}), "/zoo/files/maps/east.png"),
    ];

    for (name, data, expected) in cases {
        let data: BTreeMap<String, Value> = serde_json::from_value(data).unwrap();
        let route = registry.get(name).unwrap();
        let path = route.generate(&data).unwrap();
        assert_eq!(path, expected, "{name}");

        let hit = router
            .route(&HttpInput::new(Method::GET, &path))
            .unwrap()
            .matched()
            .unwrap();
        assert_eq!(hit.name(), name);
    }

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_generate_rejects_values_outside_the_pattern() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let registry = route_registry(&manifest);

    let show = registry.get("animals.show").unwrap();
    let data = BTreeMap::from([("id".to_string(), json!("lion"))]);
    assert!(show.generate(&data).is_err());
    assert!(show.generate(&BTreeMap::new()).is_err());

    cleanup_temp_files(&[manifest]);
}

#[test]
fn test_registry_preserves_manifest_order() {
    let manifest = create_temp_yaml(ZOO_MANIFEST);
    let registry = route_registry(&manifest);

    let names: Vec<_> = registry.all().iter().map(|r| r.name()).collect();
    assert_eq!(
        names,
        [
            "root",
            "animals.list",
            "animals.create",
            "animals.show",
            "animals.by_species",
            "enclosures.page",
            "files",
            "health"
        ]
    );

    cleanup_temp_files(&[manifest]);
}
