use super::*;
use crate::definition::{
    CommandDefinition, Definition, Parameter, RawCommand, RawRoute, RouteDefinition, TypeCaster,
};
use crate::error::{ArgumentError, DispatchError};
use crate::registry::Registry;
use http::Method;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn routes(raws: Vec<RawRoute>) -> Router<RouteDefinition> {
    let defs = raws
        .into_iter()
        .map(|raw| RouteDefinition::compile(raw).unwrap());
    Router::new(Arc::new(Registry::from_definitions(defs)))
}

fn commands(raws: Vec<RawCommand>) -> Router<CommandDefinition> {
    let defs = raws
        .into_iter()
        .map(|raw| CommandDefinition::compile(raw).unwrap());
    Router::new(Arc::new(Registry::from_definitions(defs)))
}

fn get(router: &Router<RouteDefinition>, uri: &str) -> Option<MatchResult<RouteDefinition>> {
    router
        .route(&HttpInput::new(Method::GET, uri))
        .unwrap()
        .matched()
}

fn run(router: &Router<CommandDefinition>, line: &str) -> Result<MatchOutcome<CommandDefinition>, DispatchError> {
    router.route(&CommandInput::parse(line))
}

#[test]
fn test_digit_constraint() {
    let router = routes(vec![RawRoute::new("users.show", "/users/{id}", "show")
        .param(Parameter::new("id").pattern(r"\d+"))]);

    let hit = get(&router, "/users/42").unwrap();
    assert_eq!(hit.name(), "users.show");
    assert_eq!(hit.params_map(), BTreeMap::from([("id".to_string(), json!("42"))]));
    assert!(get(&router, "/users/abc").is_none());
}

#[test]
fn test_static_lookup_before_dynamic() {
    let router = routes(vec![
        RawRoute::new("users.show", "/users/{id}", "show").param(Parameter::new("id")),
        RawRoute::new("users.me", "/users/me", "me"),
    ]);
    assert_eq!(get(&router, "/users/me").unwrap().name(), "users.me");
    assert_eq!(get(&router, "/users/7").unwrap().name(), "users.show");
}

#[test]
fn test_first_registered_dynamic_wins() {
    let router = routes(vec![
        RawRoute::new("first", "/posts/{slug}", "a").param(Parameter::new("slug")),
        RawRoute::new("second", "/posts/{id}", "b").param(Parameter::new("id").pattern(r"\d+")),
    ]);
    for _ in 0..10 {
        assert_eq!(get(&router, "/posts/12").unwrap().name(), "first");
    }
}

#[test]
fn test_method_filtering_and_allowed_methods() {
    let router = routes(vec![
        RawRoute::new("items.list", "/items", "list").method(Method::GET),
        RawRoute::new("items.create", "/items", "create").method(Method::POST),
        RawRoute::new("items.update", "/items/{id}", "update")
            .method(Method::PUT)
            .param(Parameter::new("id")),
    ]);

    let post = router
        .route(&HttpInput::new(Method::POST, "/items"))
        .unwrap()
        .matched()
        .unwrap();
    assert_eq!(post.name(), "items.create");

    match router.route(&HttpInput::new(Method::DELETE, "/items/3")).unwrap() {
        MatchOutcome::NotMatched(miss) => {
            assert!(miss.method_not_allowed());
            assert_eq!(miss.allowed, vec![Method::PUT]);
        }
        MatchOutcome::Matched(hit) => panic!("unexpected match {}", hit.name()),
    }

    match router.route(&HttpInput::new(Method::GET, "/nothing")).unwrap() {
        MatchOutcome::NotMatched(miss) => assert!(!miss.method_not_allowed()),
        MatchOutcome::Matched(hit) => panic!("unexpected match {}", hit.name()),
    }
}

#[test]
fn test_query_string_is_split_off() {
    let input = HttpInput::new(Method::GET, "/search?q=rust+lang&page=2&q=final%21");
    assert_eq!(input.path, "/search");
    assert_eq!(input.query_param("q"), Some("final!"));
    assert_eq!(input.query[0], ("q".to_string(), "rust lang".to_string()));

    let router = routes(vec![RawRoute::new("search", "/search", "search")]);
    assert!(get(&router, "/search?q=x").is_some());
}

#[test]
fn test_optional_segment_default_and_cast() {
    let router = routes(vec![RawRoute::new("page", "/pages/{n?}", "page")
        .param(
            Parameter::new("n")
                .pattern(r"\d+")
                .cast(TypeCaster::Integer)
                .with_default(json!(1)),
        )]);

    assert_eq!(get(&router, "/pages/5").unwrap().get("n"), Some(&json!(5)));
    assert_eq!(get(&router, "/pages").unwrap().get("n"), Some(&json!(1)));
}

#[test]
fn test_repeatable_capture_is_split() {
    let router = routes(vec![RawRoute::new("files", "/files/{path}", "files")
        .param(Parameter::new("path").repeatable())]);
    let hit = get(&router, "/files/a/b/c.txt").unwrap();
    assert_eq!(hit.get("path"), Some(&json!(["a", "b", "c.txt"])));
}

#[test]
fn test_uncaptured_parameter_is_not_extracted() {
    let router = routes(vec![RawRoute::new("v", "/{version}/status", "status")
        .param(Parameter::new("version").pattern(r"v\d").uncaptured())]);
    let hit = get(&router, "/v2/status").unwrap();
    assert!(hit.params.is_empty());
}

#[test]
fn test_cast_failure_is_an_error() {
    let router = routes(vec![RawRoute::new("n", "/n/{n}", "n")
        .param(Parameter::new("n").cast(TypeCaster::Integer))]);
    let err = router
        .route(&HttpInput::new(Method::GET, "/n/abc"))
        .unwrap_err();
    match err {
        DispatchError::ParameterCast(cast) => {
            assert_eq!(cast.parameter, "n");
            assert_eq!(cast.value, "abc");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_generate_then_match_returns_data() {
    let router = routes(vec![RawRoute::new("post", "/blog/{year}/{slug}", "post")
        .param(Parameter::new("year").pattern(r"\d{4}").cast(TypeCaster::Integer))
        .param(Parameter::new("slug").pattern("[a-z-]+"))]);
    let route = router.registry().get("post").unwrap();
    let data = BTreeMap::from([
        ("year".to_string(), json!(2024)),
        ("slug".to_string(), json!("hello-world")),
    ]);
    let path = route.generate(&data).unwrap();
    assert_eq!(path, "/blog/2024/hello-world");
    assert_eq!(get(&router, &path).unwrap().params_map(), data);
}

fn deploy() -> RawCommand {
    RawCommand::new("deploy", "deploy {env} {--dry-run}", "DeployCommand")
        .param(Parameter::argument("env"))
        .param(Parameter::argument("dry-run"))
}

#[test]
fn test_command_arguments_and_flag() {
    let router = commands(vec![deploy()]);
    let hit = run(&router, "deploy staging --dry-run").unwrap().matched().unwrap();
    assert_eq!(hit.params_map(), BTreeMap::from([("env".to_string(), json!("staging"))]));
    assert_eq!(hit.options_map(), BTreeMap::from([("dry-run".to_string(), json!(true))]));

    let hit = run(&router, "deploy prod").unwrap().matched().unwrap();
    assert_eq!(hit.get("dry-run"), Some(&json!(false)));
}

#[test]
fn test_unknown_command_is_no_match() {
    let router = commands(vec![deploy()]);
    assert!(!run(&router, "rollback prod").unwrap().is_match());
    assert!(!run(&router, "").unwrap().is_match());
}

#[test]
fn test_command_argument_errors() {
    let router = commands(vec![deploy()]);
    let cases = [
        ("deploy", ArgumentError::MissingArgument { name: "env".into() }),
        (
            "deploy prod eu",
            ArgumentError::TooManyArguments { token: "eu".into() },
        ),
        (
            "deploy prod --force",
            ArgumentError::UnknownOption { option: "--force".into() },
        ),
        (
            "deploy prod --dry-run=yes",
            ArgumentError::UnexpectedOptionValue { name: "dry-run".into() },
        ),
    ];
    for (line, expected) in cases {
        assert_eq!(
            run(&router, line).unwrap_err(),
            DispatchError::InvalidInput(expected),
            "{line}"
        );
    }
}

#[test]
fn test_value_options_short_names_and_arrays() {
    let router = commands(vec![RawCommand::new(
        "release",
        "release {version} {--c|channel=} {--tag=} {--n|dry-run}",
        "Release",
    )
    .param(Parameter::argument("version").pattern(r"\d+\.\d+\.\d+"))
    .param(Parameter::argument("channel").pattern("stable|beta").with_default(json!("stable")))
    .param(Parameter::argument("tag").repeatable())
    .param(Parameter::argument("dry-run"))]);

    let hit = run(&router, "release 1.2.3 -c beta --tag=a --tag b -n")
        .unwrap()
        .matched()
        .unwrap();
    assert_eq!(hit.get("version"), Some(&json!("1.2.3")));
    assert_eq!(hit.get("channel"), Some(&json!("beta")));
    assert_eq!(hit.get("tag"), Some(&json!(["a", "b"])));
    assert_eq!(hit.get("dry-run"), Some(&json!(true)));

    let defaults = run(&router, "release 2.0.0").unwrap().matched().unwrap();
    assert_eq!(defaults.get("channel"), Some(&json!("stable")));
    assert_eq!(defaults.get("tag"), Some(&json!([])));

    assert_eq!(
        run(&router, "release 2.0.0 --channel").unwrap_err(),
        DispatchError::InvalidInput(ArgumentError::MissingOptionValue {
            name: "channel".into()
        })
    );
    assert!(matches!(
        run(&router, "release 2.0.0 -c nightly").unwrap_err(),
        DispatchError::InvalidInput(ArgumentError::InvalidValue { .. })
    ));
    assert!(matches!(
        run(&router, "release latest").unwrap_err(),
        DispatchError::InvalidInput(ArgumentError::InvalidValue { .. })
    ));
}

#[test]
fn test_value_option_does_not_swallow_next_option() {
    let router = commands(vec![RawCommand::new(
        "release",
        "release {version} {--c|channel=} {--n|dry-run}",
        "Release",
    )
    .param(Parameter::argument("version"))
    .param(Parameter::argument("channel"))
    .param(Parameter::argument("dry-run"))]);

    for line in [
        "release 1.0.0 --channel --dry-run",
        "release 1.0.0 --channel -n",
        "release 1.0.0 -c --channel=beta",
        "release 1.0.0 --channel -- beta",
    ] {
        assert_eq!(
            run(&router, line).unwrap_err(),
            DispatchError::InvalidInput(ArgumentError::MissingOptionValue {
                name: "channel".into()
            }),
            "{line}"
        );
    }

    // undeclared dashes and negative numbers are still values
    let hit = run(&router, "release 1.0.0 --channel -5").unwrap().matched().unwrap();
    assert_eq!(hit.get("channel"), Some(&json!("-5")));
}

#[test]
fn test_repeatable_argument_and_end_of_options() {
    let router = commands(vec![RawCommand::new("rm", "rm {--f|force} {files}", "Remove")
        .param(Parameter::argument("force"))
        .param(Parameter::argument("files").repeatable())]);

    let hit = run(&router, "rm -f a.txt -- --weird -5").unwrap().matched().unwrap();
    assert_eq!(hit.get("files"), Some(&json!(["a.txt", "--weird", "-5"])));
    assert_eq!(hit.get("force"), Some(&json!(true)));

    assert_eq!(
        run(&router, "rm").unwrap_err(),
        DispatchError::InvalidInput(ArgumentError::MissingArgument {
            name: "files".into()
        })
    );
}

#[test]
fn test_negative_number_is_positional() {
    let router = commands(vec![RawCommand::new("seek", "seek {offset}", "Seek")
        .param(Parameter::argument("offset").pattern(r"-?\d+").cast(TypeCaster::Integer))]);
    let hit = run(&router, "seek -15").unwrap().matched().unwrap();
    assert_eq!(hit.get("offset"), Some(&json!(-15)));
}

#[test]
fn test_optional_argument_is_null_without_default() {
    let router = commands(vec![RawCommand::new("greet", "greet {name?}", "Greet")
        .param(Parameter::argument("name"))]);
    let hit = run(&router, "greet").unwrap().matched().unwrap();
    assert_eq!(hit.get("name"), Some(&json!(null)));
}
