use super::*;
use crate::definition::{Definition, RawRoute, RouteDefinition, Stage};
use crate::dispatcher::{Context, Output};
use crate::error::DispatchError;
use crate::middleware::{from_fn, MiddlewareSet, StageResult, TracingMiddleware};
use crate::router::HttpInput;
use http::Method;
use serde_json::json;

fn ctx() -> Context<RouteDefinition> {
    Context::new(HttpInput::new(Method::GET, "/"))
}

fn deny() -> MiddlewareSet<RouteDefinition> {
    let mut set = MiddlewareSet::new();
    set.register(
        "deny",
        from_fn::<RouteDefinition, _>("deny", |_ctx, _next| Ok(Output::error(403, "denied"))),
    );
    set.register(
        "pass",
        from_fn::<RouteDefinition, _>("pass", |ctx, next| next.run(ctx)),
    );
    set
}

#[test]
fn test_add_and_units() {
    let mut pipeline = Pipeline::<RouteDefinition>::new();
    assert!(pipeline.is_empty());
    pipeline
        .add(Stage::Received, TracingMiddleware)
        .add(Stage::Matched, TracingMiddleware);
    let pipeline = pipeline.with(Stage::Matched, TracingMiddleware);

    assert_eq!(pipeline.len(), 3);
    assert_eq!(pipeline.units(Stage::Matched).len(), 2);
    assert!(pipeline.units(Stage::Dispatched).is_empty());
}

#[test]
fn test_chain_puts_global_units_first() {
    let route = RouteDefinition::compile(
        RawRoute::new("home", "/", "home").with_middleware(Stage::Matched, "pass"),
    )
    .unwrap();
    let pipeline = Pipeline::new().with(Stage::Matched, TracingMiddleware);

    let chain = pipeline.chain(Stage::Matched, &deny(), Some(&route)).unwrap();
    let names: Vec<&str> = chain.iter().map(|u| u.name()).collect();
    assert_eq!(names, vec!["tracing", "pass"]);
    assert_eq!(format!("{chain:?}"), r#"[Middleware("tracing"), Middleware("pass")]"#);

    let global_only = pipeline.chain(Stage::Matched, &deny(), None).unwrap();
    assert_eq!(global_only.len(), 1);
}

#[test]
fn test_chain_unknown_reference() {
    let route = RouteDefinition::compile(
        RawRoute::new("home", "/", "home").with_middleware(Stage::Dispatched, "missing"),
    )
    .unwrap();
    let Err(err) = Pipeline::new().chain(Stage::Dispatched, &deny(), Some(&route)) else {
        panic!("unresolved reference must not build a chain");
    };
    assert!(matches!(err, DispatchError::UnknownMiddleware { stage: Stage::Dispatched, .. }));
}

#[test]
fn test_run_stage_records_trail_and_restores_stage() {
    let mut ctx = ctx();
    let mut core = |ctx: &mut Context<RouteDefinition>| {
        assert_eq!(ctx.stage, Stage::Matched);
        Ok(Output::ok(json!("done")))
    };
    let out = run_stage(Stage::Matched, &[], &mut ctx, &mut core).unwrap();

    assert_eq!(out.body, json!("done"));
    assert_eq!(ctx.trail, vec![Stage::Matched]);
    assert_eq!(ctx.stage, Stage::Received);
    assert_eq!(ctx.short_circuit, None);
}

#[test]
fn test_run_stage_marks_short_circuit() {
    let set = deny();
    let units = vec![set.get("deny").unwrap().clone()];
    let mut ctx = ctx();
    let mut core = |_: &mut Context<RouteDefinition>| -> StageResult {
        panic!("core must not run")
    };
    let out = run_stage(Stage::Received, &units, &mut ctx, &mut core).unwrap();

    assert_eq!(out.status, 403);
    assert_eq!(ctx.short_circuit, Some(Stage::Received));
}

#[test]
fn test_nested_stages_keep_innermost_short_circuit() {
    let set = deny();
    let inner = vec![set.get("deny").unwrap().clone()];
    let mut ctx = ctx();

    let mut outer_core = |ctx: &mut Context<RouteDefinition>| {
        let mut inner_core = |_: &mut Context<RouteDefinition>| Ok(Output::default());
        run_stage(Stage::Matched, &inner, ctx, &mut inner_core)
    };
    let out = run_stage(Stage::Received, &[], &mut ctx, &mut outer_core).unwrap();

    assert_eq!(out.status, 403);
    assert_eq!(ctx.trail, vec![Stage::Received, Stage::Matched]);
    assert_eq!(ctx.short_circuit, Some(Stage::Matched));
}

#[test]
fn test_error_is_not_a_short_circuit() {
    let mut ctx = ctx();
    let mut core = |_: &mut Context<RouteDefinition>| -> StageResult {
        Err(DispatchError::middleware("auth", "expired"))
    };
    assert!(run_stage(Stage::Matched, &[], &mut ctx, &mut core).is_err());
    assert_eq!(ctx.short_circuit, None);
}
