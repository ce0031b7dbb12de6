use std::time::Instant;

use tracing::{debug, info_span, warn};

use super::{Middleware, Next, StageResult};
use crate::dispatcher::Context;
use crate::router::Routable;

/// Opens an `info` span around the rest of the stage it is placed in
///
/// Span fields: `request_id`, `stage`, `definition` (when matched). The
/// outcome is logged with `status` and `latency_us` when the chain returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl<D: Routable> Middleware<D> for TracingMiddleware {
    fn name(&self) -> &str {
        "tracing"
    }

    fn handle(&self, ctx: &mut Context<D>, next: Next<'_, D>) -> StageResult {
        let span = info_span!(
            "stage",
            request_id = %ctx.request_id,
            stage = %ctx.stage,
            definition = ctx.matched_name().unwrap_or("-"),
        );
        let _entered = span.enter();
        let start = Instant::now();

        let result = next.run(ctx);
        let latency_us = start.elapsed().as_micros();
        match &result {
            Ok(output) => debug!(
                status = output.status,
                latency_us,
                short_circuit = ?ctx.short_circuit,
                "Stage complete"
            ),
            Err(err) => warn!(error = %err, latency_us, "Stage failed"),
        }
        result
    }
}
