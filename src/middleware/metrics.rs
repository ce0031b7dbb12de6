use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{Middleware, Next, StageResult};
use crate::definition::Stage;
use crate::dispatcher::Context;
use crate::router::Routable;

/// Counts pipeline activity observed from the stage it is placed in
///
/// Register it as a global `received` unit to see every run. All counters
/// are atomics updated with `Ordering::Relaxed`; values are eventually
/// consistent across threads and cheap to collect.
///
/// Collected:
/// - runs observed and their average latency
/// - runs per matched / not-matched outcome
/// - short-circuits, per stage that cut the run short
/// - runs that diverted into `throwable-caught`
#[derive(Debug)]
pub struct MetricsMiddleware {
    runs: AtomicUsize,
    total_latency_ns: AtomicU64,
    matched: AtomicUsize,
    not_matched: AtomicUsize,
    errors: AtomicUsize,
    short_circuits: [AtomicUsize; Stage::ALL.len()],
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self {
            runs: AtomicUsize::new(0),
            total_latency_ns: AtomicU64::new(0),
            matched: AtomicUsize::new(0),
            not_matched: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            short_circuits: Default::default(),
        }
    }
}

fn stage_index(stage: Stage) -> usize {
    Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0)
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }

    /// Mean latency of the observed chain; zero before the first run
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.runs.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    #[must_use]
    pub fn matched(&self) -> usize {
        self.matched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn not_matched(&self) -> usize {
        self.not_matched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Runs cut short by a unit of `stage`
    #[must_use]
    pub fn short_circuits(&self, stage: Stage) -> usize {
        self.short_circuits[stage_index(stage)].load(Ordering::Relaxed)
    }

    /// Runs cut short by any stage
    #[must_use]
    pub fn total_short_circuits(&self) -> usize {
        self.short_circuits
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

impl<D: Routable> Middleware<D> for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    fn handle(&self, ctx: &mut Context<D>, next: Next<'_, D>) -> StageResult {
        let start = Instant::now();
        let result = next.run(ctx);

        self.runs.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        if ctx.matched.is_some() {
            self.matched.fetch_add(1, Ordering::Relaxed);
        } else if ctx.no_match.is_some() {
            self.not_matched.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(stage) = ctx.short_circuit {
            self.short_circuits[stage_index(stage)].fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}
