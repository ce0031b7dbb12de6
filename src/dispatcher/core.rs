//! Dispatcher core module - hot path for pipeline execution.
//!
//! # JSF Compliance (Rule 206)
//!
//! This module is part of the request hot path. The following clippy lints
//! are denied to keep allocation out of the per-request code:
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building
//! - `clippy::unnecessary_to_owned` - Prevents .to_owned() on borrowed data

// NOTE: error and panic paths allocate their messages; these are off the fast path
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::{Container, Context, Output};
use crate::definition::Stage;
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::middleware::{MiddlewareSet, StageResult};
use crate::pipeline::{run_stage, Pipeline};
use crate::registry::Registry;
use crate::router::{MatchOutcome, Routable, Router};

/// Matches inputs and drives them through the staged pipeline
///
/// One `Dispatcher` serves one definition kind: `Dispatcher<RouteDefinition>`
/// for HTTP-style input, `Dispatcher<CommandDefinition>` for argv input.
/// It holds only shared, read-only state, so `dispatch` takes `&self` and a
/// dispatcher can be shared across threads behind an `Arc`.
pub struct Dispatcher<D: Routable> {
    router: Router<D>,
    pipeline: Pipeline<D>,
    middleware: MiddlewareSet<D>,
    container: Arc<dyn Container>,
}

impl<D: Routable> fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kind", &D::KIND)
            .field("definitions", &self.router.registry().len())
            .field("pipeline", &self.pipeline)
            .field("middleware", &self.middleware)
            .finish()
    }
}

impl<D: Routable> Dispatcher<D> {
    #[must_use]
    pub fn new(router: Router<D>, container: Arc<dyn Container>) -> Self {
        Self {
            router,
            pipeline: Pipeline::new(),
            middleware: MiddlewareSet::new(),
            container,
        }
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline<D>) -> Self {
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: MiddlewareSet<D>) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline<D> {
        &mut self.pipeline
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareSet<D> {
        &mut self.middleware
    }

    #[must_use]
    pub fn router(&self) -> &Router<D> {
        &self.router
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<D>> {
        self.router.registry()
    }

    /// Match without running the pipeline.
    ///
    /// # Errors
    ///
    /// Casting or argument failures of the selected definition.
    pub fn match_input(&self, input: &D::Input) -> Result<MatchOutcome<D>, DispatchError> {
        self.router.route(input)
    }

    /// Run `input` through the pipeline and return its output.
    ///
    /// Never fails: errors raised anywhere in the run are routed through
    /// `throwable-caught` and come back as an [`Output`].
    pub fn dispatch(&self, input: D::Input) -> Output {
        self.handle(input).1
    }

    /// Like [`dispatch`](Self::dispatch), also returning the finished context.
    pub fn handle(&self, input: D::Input) -> (Context<D>, Output) {
        self.handle_with_id(input, RequestId::new())
    }

    /// [`handle`](Self::handle) under a caller-supplied request id
    pub fn handle_with_id(&self, input: D::Input, request_id: RequestId) -> (Context<D>, Output) {
        let mut ctx = Context::with_request_id(input, request_id);
        let start = Instant::now();

        let output = match self.received(&mut ctx) {
            Ok(output) => output,
            Err(err) => self.catch(&mut ctx, err),
        };

        info!(
            request_id = %ctx.request_id,
            kind = D::KIND,
            input = %D::describe(&ctx.input),
            definition = ctx.matched_name().unwrap_or("-"),
            status = output.status,
            short_circuit = ?ctx.short_circuit,
            duration_us = start.elapsed().as_micros(),
            "Dispatch complete"
        );
        (ctx, output)
    }

    /// Run the post-processing stage (`sending` for routes, `exited` for
    /// commands) over an output produced by [`handle`](Self::handle).
    pub fn finish(&self, ctx: &mut Context<D>, output: Output) -> Output {
        let stage = D::FINAL_STAGE;
        let definition = matched_definition(ctx);
        let chain = match self.pipeline.chain(stage, &self.middleware, definition.as_deref()) {
            Ok(chain) => chain,
            Err(err) => return self.catch(ctx, err),
        };

        let mut produced = Some(output);
        let mut core = |_: &mut Context<D>| Ok(produced.take().unwrap_or_default());
        match run_stage(stage, &chain, ctx, &mut core) {
            Ok(output) => output,
            Err(err) => self.catch(ctx, err),
        }
    }

    /// [`handle`](Self::handle) followed by [`finish`](Self::finish)
    pub fn process(&self, input: D::Input) -> Output {
        let (mut ctx, output) = self.handle(input);
        self.finish(&mut ctx, output)
    }

    /// Check every middleware reference of every registered definition.
    ///
    /// # Errors
    ///
    /// One [`DispatchError::UnknownMiddleware`] per unresolved reference.
    pub fn verify_middleware(&self) -> Result<(), Vec<DispatchError>> {
        let mut missing = Vec::new();
        for definition in self.registry().all() {
            for (stage, refs) in definition.middleware() {
                for reference in refs {
                    if !self.middleware.contains(reference.as_str()) {
                        warn!(
                            definition = %definition.name(),
                            stage = %stage,
                            middleware = %reference,
                            "Unknown middleware reference"
                        );
                        missing.push(DispatchError::UnknownMiddleware {
                            name: reference.to_string(),
                            stage: *stage,
                        });
                    }
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    fn received(&self, ctx: &mut Context<D>) -> StageResult {
        let chain = self.pipeline.chain(Stage::Received, &self.middleware, None)?;
        let mut core = |ctx: &mut Context<D>| self.route(ctx);
        run_stage(Stage::Received, &chain, ctx, &mut core)
    }

    fn route(&self, ctx: &mut Context<D>) -> StageResult {
        match self.router.route(&ctx.input)? {
            MatchOutcome::Matched(result) => {
                let definition = Arc::clone(&result.definition);
                ctx.matched = Some(result);
                self.matched(ctx, &definition)
            }
            MatchOutcome::NotMatched(miss) => {
                ctx.no_match = Some(miss);
                self.not_matched(ctx)
            }
        }
    }

    fn matched(&self, ctx: &mut Context<D>, definition: &D) -> StageResult {
        let chain = self
            .pipeline
            .chain(Stage::Matched, &self.middleware, Some(definition))?;
        let mut core = |ctx: &mut Context<D>| {
            let output = self.invoke(ctx)?;
            self.dispatched(ctx, definition, output)
        };
        run_stage(Stage::Matched, &chain, ctx, &mut core)
    }

    fn not_matched(&self, ctx: &mut Context<D>) -> StageResult {
        let chain = self
            .pipeline
            .chain(Stage::NotMatched, &self.middleware, None)?;
        let mut core = |ctx: &mut Context<D>| {
            let input = D::describe(&ctx.input);
            Ok(match &ctx.no_match {
                Some(miss) => Output::not_matched(miss, &input),
                None => Output::not_matched(&Default::default(), &input),
            })
        };
        run_stage(Stage::NotMatched, &chain, ctx, &mut core)
    }

    fn dispatched(&self, ctx: &mut Context<D>, definition: &D, output: Output) -> StageResult {
        let chain = self
            .pipeline
            .chain(Stage::Dispatched, &self.middleware, Some(definition))?;
        let mut provisional = Some(output);
        let mut core = |_: &mut Context<D>| Ok(provisional.take().unwrap_or_default());
        run_stage(Stage::Dispatched, &chain, ctx, &mut core)
    }

    /// Invoke the matched target through the container; errors and panics
    /// both become [`DispatchError::Target`].
    fn invoke(&self, ctx: &Context<D>) -> StageResult {
        let Some(matched) = ctx.matched.as_ref() else {
            return Err(DispatchError::Target {
                target: String::new(),
                message: "no matched definition in context".into(),
            });
        };
        let target = matched.definition.target();
        let arguments = matched.arguments();

        debug!(
            request_id = %ctx.request_id,
            definition = %matched.name(),
            target = %target,
            arguments = arguments.len(),
            "Invoking dispatch target"
        );

        let start = Instant::now();
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            self.container.invoke(target, &arguments)
        }));
        let elapsed = start.elapsed();

        match invoked {
            Ok(Ok(output)) => {
                debug!(
                    request_id = %ctx.request_id,
                    target = %target,
                    status = output.status,
                    duration_us = elapsed.as_micros(),
                    "Dispatch target returned"
                );
                Ok(output)
            }
            Ok(Err(err)) => {
                warn!(
                    request_id = %ctx.request_id,
                    target = %target,
                    error = %err,
                    duration_us = elapsed.as_micros(),
                    "Dispatch target failed"
                );
                Err(DispatchError::Target {
                    target: target.to_string(),
                    message: err.to_string(),
                })
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %ctx.request_id,
                    target = %target,
                    panic_message = %message,
                    "Dispatch target panicked - CRITICAL"
                );
                Err(DispatchError::Target {
                    target: target.to_string(),
                    message: format!("handler panicked: {message}"),
                })
            }
        }
    }

    /// Route an error into `throwable-caught`.
    ///
    /// Units of that stage see the error on `ctx.error` and may replace the
    /// fallback output; an error raised inside the lane itself ends the run
    /// with that error's output.
    fn catch(&self, ctx: &mut Context<D>, err: DispatchError) -> Output {
        warn!(
            request_id = %ctx.request_id,
            trail = ?ctx.trail,
            error = %err,
            "Diverting to throwable-caught"
        );
        let fallback = Output::from_error(&err);
        ctx.error = Some(err);

        let definition = matched_definition(ctx);
        let chain = match self
            .pipeline
            .chain(Stage::ThrowableCaught, &self.middleware, definition.as_deref())
        {
            Ok(chain) => chain,
            Err(second) => {
                error!(request_id = %ctx.request_id, error = %second, "throwable-caught chain unavailable");
                return Output::from_error(&second);
            }
        };

        let mut core = |_: &mut Context<D>| Ok(fallback.clone());
        match run_stage(Stage::ThrowableCaught, &chain, ctx, &mut core) {
            Ok(output) => output,
            Err(second) => {
                error!(request_id = %ctx.request_id, error = %second, "throwable-caught failed");
                Output::from_error(&second)
            }
        }
    }
}

fn matched_definition<D: Routable>(ctx: &Context<D>) -> Option<Arc<D>> {
    ctx.matched.as_ref().map(|m| Arc::clone(&m.definition))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
