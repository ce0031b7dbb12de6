use super::*;
use crate::definition::{MiddlewareRef, RouteDefinition, Stage};
use crate::dispatcher::{Context, Output};
use crate::error::DispatchError;
use crate::router::HttpInput;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ctx() -> Context<RouteDefinition> {
    Context::new(HttpInput::new(Method::GET, "/health"))
}

fn record(name: &'static str) -> Arc<dyn Middleware<RouteDefinition>> {
    Arc::new(from_fn::<RouteDefinition, _>(name, move |ctx, next| {
        let mut seen = ctx
            .attributes
            .get("order")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        seen.push_str(name);
        ctx.attributes.insert("order".into(), json!(seen));
        next.run(ctx)
    }))
}

fn run_chain(
    units: &[Arc<dyn Middleware<RouteDefinition>>],
    ctx: &mut Context<RouteDefinition>,
    core_calls: &AtomicUsize,
) -> StageResult {
    let mut core = |_: &mut Context<RouteDefinition>| {
        core_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Output::ok(json!("core")))
    };
    Next::new(units, &mut core).run(ctx)
}

#[test]
fn test_units_run_in_order_then_core() {
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> =
        vec![record("a"), record("b"), record("c")];
    let calls = AtomicUsize::new(0);
    let mut ctx = ctx();

    let out = run_chain(&units, &mut ctx, &calls).unwrap();
    assert_eq!(out.body, json!("core"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.attributes["order"], json!("abc"));
}

#[test]
fn test_unit_without_next_skips_rest_and_core() {
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> = vec![
        record("a"),
        Arc::new(from_fn::<RouteDefinition, _>("deny", |_ctx, _next| {
            Ok(Output::error(403, "denied"))
        })),
        record("c"),
    ];
    let calls = AtomicUsize::new(0);
    let mut ctx = ctx();

    let out = run_chain(&units, &mut ctx, &calls).unwrap();
    assert_eq!(out.status, 403);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.attributes["order"], json!("a"));
}

#[test]
fn test_unit_can_transform_output() {
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> =
        vec![Arc::new(from_fn::<RouteDefinition, _>("stamp", |ctx, next| {
            let mut out = next.run(ctx)?;
            out.set_header("x-request-id", ctx.request_id.to_string());
            Ok(out)
        }))];
    let calls = AtomicUsize::new(0);
    let mut ctx = ctx();

    let out = run_chain(&units, &mut ctx, &calls).unwrap();
    assert_eq!(out.get_header("X-Request-Id"), Some(ctx.request_id.to_string().as_str()));
}

#[test]
fn test_next_remaining_counts_units() {
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> =
        vec![record("a"), record("b")];
    let mut core = |_: &mut Context<RouteDefinition>| Ok(Output::default());
    assert_eq!(Next::new(&units, &mut core).remaining(), 2);
}

#[test]
fn test_set_resolves_in_reference_order() {
    let mut set = MiddlewareSet::<RouteDefinition>::new();
    set.register_arc("a", record("a"))
        .register_arc("b", record("b"));
    assert_eq!(set.len(), 2);

    let mut resolved = Vec::new();
    set.resolve_into(
        Stage::Matched,
        &[MiddlewareRef::from("b"), MiddlewareRef::from("a")],
        &mut resolved,
    )
    .unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].name(), "b");
    assert_eq!(resolved[1].name(), "a");
}

#[test]
fn test_set_rejects_unknown_reference() {
    let set = MiddlewareSet::<RouteDefinition>::new();
    let mut resolved = Vec::new();
    let err = set
        .resolve_into(Stage::Received, &[MiddlewareRef::from("auth")], &mut resolved)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnknownMiddleware { ref name, stage: Stage::Received } if name == "auth"
    ));
    assert!(resolved.is_empty());
}

#[test]
fn test_metrics_counts_runs_and_short_circuits() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> = vec![metrics.clone()];
    let calls = AtomicUsize::new(0);

    let mut plain = ctx();
    run_chain(&units, &mut plain, &calls).unwrap();

    let mut cut = ctx();
    let mut core = |ctx: &mut Context<RouteDefinition>| {
        ctx.short_circuit = Some(Stage::Matched);
        Ok(Output::error(401, "nope"))
    };
    Next::new(&units, &mut core).run(&mut cut).unwrap();

    let mut failing = ctx();
    let mut core = |_: &mut Context<RouteDefinition>| {
        Err(DispatchError::middleware("auth", "backend down"))
    };
    assert!(Next::new(&units, &mut core).run(&mut failing).is_err());

    assert_eq!(metrics.runs(), 3);
    assert_eq!(metrics.errors(), 1);
    assert_eq!(metrics.short_circuits(Stage::Matched), 1);
    assert_eq!(metrics.short_circuits(Stage::Received), 0);
    assert_eq!(metrics.total_short_circuits(), 1);
}

#[test]
fn test_tracing_passes_output_through() {
    let units: Vec<Arc<dyn Middleware<RouteDefinition>>> = vec![Arc::new(TracingMiddleware)];
    let calls = AtomicUsize::new(0);
    let mut ctx = ctx();

    let out = run_chain(&units, &mut ctx, &calls).unwrap();
    assert_eq!(out.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(units[0].name(), "tracing");
}
