//! Pipeline core module - per-stage chain execution.
//!
//! # JSF Compliance (Rule 206)
//!
//! Stage chains are assembled from shared `Arc` units; running a stage only
//! clones pointers, never the units themselves.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::definition::Stage;
use crate::dispatcher::Context;
use crate::error::DispatchError;
use crate::middleware::{CoreAction, Middleware, MiddlewareSet, Next, StageResult};
use crate::router::Routable;

/// Chain of units for one stage
pub type StageChain<D> = Vec<Arc<dyn Middleware<D>>>;

/// Global middleware units, per stage
///
/// Units registered here run for every input, ahead of the units a matched
/// definition references for the same stage.
pub struct Pipeline<D: Routable> {
    stages: BTreeMap<Stage, StageChain<D>>,
}

impl<D: Routable> Default for Pipeline<D> {
    fn default() -> Self {
        Self {
            stages: BTreeMap::new(),
        }
    }
}

impl<D: Routable> Clone for Pipeline<D> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<D: Routable> fmt::Debug for Pipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (stage, units) in &self.stages {
            let names: Vec<&str> = units.iter().map(|u| u.name()).collect();
            map.entry(&stage.as_str(), &names);
        }
        map.finish()
    }
}

impl<D: Routable> Pipeline<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a global unit to `stage`.
    pub fn add<M>(&mut self, stage: Stage, unit: M) -> &mut Self
    where
        M: Middleware<D> + 'static,
    {
        self.add_arc(stage, Arc::new(unit))
    }

    /// Append an already shared unit to `stage`.
    pub fn add_arc(&mut self, stage: Stage, unit: Arc<dyn Middleware<D>>) -> &mut Self {
        self.stages.entry(stage).or_default().push(unit);
        self
    }

    /// Builder form of [`add`](Self::add)
    #[must_use]
    pub fn with<M>(mut self, stage: Stage, unit: M) -> Self
    where
        M: Middleware<D> + 'static,
    {
        self.add(stage, unit);
        self
    }

    /// Global units of `stage`, in registration order
    #[must_use]
    pub fn units(&self, stage: Stage) -> &[Arc<dyn Middleware<D>>] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of global units across all stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assemble the chain for `stage`: global units, then the units
    /// `definition` references for that stage.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownMiddleware`] when a reference has no unit in `set`.
    pub fn chain(
        &self,
        stage: Stage,
        set: &MiddlewareSet<D>,
        definition: Option<&D>,
    ) -> Result<StageChain<D>, DispatchError> {
        let global = self.units(stage);
        let refs = definition.map_or(&[][..], |d| d.stage_middleware(stage));
        let mut chain = Vec::with_capacity(global.len() + refs.len());
        chain.extend(global.iter().cloned());
        set.resolve_into(stage, refs, &mut chain)?;
        Ok(chain)
    }
}

/// Run one stage: `units` in order, then `core`.
///
/// Enters `stage` on the context for the duration of the run and appends it
/// to `ctx.trail`. When the chain returns an output without the core action
/// having been reached, the stage is recorded as `ctx.short_circuit` (the
/// innermost such stage wins). Errors are returned untouched.
pub fn run_stage<D: Routable>(
    stage: Stage,
    units: &[Arc<dyn Middleware<D>>],
    ctx: &mut Context<D>,
    core: &mut CoreAction<'_, D>,
) -> StageResult {
    let previous = ctx.stage;
    ctx.stage = stage;
    ctx.trail.push(stage);

    let start = Instant::now();
    let mut reached = false;
    let result = {
        let mut tracked = |ctx: &mut Context<D>| {
            reached = true;
            core(ctx)
        };
        Next::new(units, &mut tracked).run(ctx)
    };

    if !reached && result.is_ok() {
        ctx.short_circuit.get_or_insert(stage);
        debug!(
            request_id = %ctx.request_id,
            stage = %stage,
            units = units.len(),
            "Stage short-circuited"
        );
    }
    debug!(
        request_id = %ctx.request_id,
        stage = %stage,
        units = units.len(),
        reached_core = reached,
        ok = result.is_ok(),
        duration_us = start.elapsed().as_micros(),
        "Stage finished"
    );

    ctx.stage = previous;
    result
}
