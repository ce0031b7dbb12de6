use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::definition::{MiddlewareRef, Stage};
use crate::dispatcher::{Context, Output};
use crate::error::DispatchError;
use crate::router::Routable;

/// Result every middleware unit and core action produces
pub type StageResult = Result<Output, DispatchError>;

/// Core action at the end of a stage's chain
pub type CoreAction<'a, D> = dyn FnMut(&mut Context<D>) -> StageResult + 'a;

/// One unit of a stage's chain of responsibility
///
/// A unit may:
/// * call `next.run(ctx)` and return (or transform) its output;
/// * return an output without calling `next`, which short-circuits the
///   stage and every stage that would follow it;
/// * mutate `ctx` before delegating;
/// * return an error, which diverts the run into `throwable-caught`.
pub trait Middleware<D: Routable>: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle(&self, ctx: &mut Context<D>, next: Next<'_, D>) -> StageResult;
}

impl<D: Routable> fmt::Debug for dyn Middleware<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name()).finish()
    }
}

/// Remainder of a stage's chain: the following units, then the core action
pub struct Next<'a, D: Routable> {
    units: &'a [Arc<dyn Middleware<D>>],
    core: &'a mut CoreAction<'a, D>,
}

impl<'a, D: Routable> Next<'a, D> {
    pub fn new(units: &'a [Arc<dyn Middleware<D>>], core: &'a mut CoreAction<'a, D>) -> Self {
        Self { units, core }
    }

    /// Number of units left before the core action
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.units.len()
    }

    /// Hand the context to the next unit, or to the core action when none is left.
    pub fn run(self, ctx: &mut Context<D>) -> StageResult {
        match self.units.split_first() {
            Some((unit, rest)) => unit.handle(
                ctx,
                Next {
                    units: rest,
                    core: self.core,
                },
            ),
            None => (self.core)(ctx),
        }
    }
}

/// Middleware built from a closure
pub struct FnMiddleware<D, F> {
    name: String,
    f: F,
    _kind: PhantomData<fn() -> D>,
}

impl<D, F> fmt::Debug for FnMiddleware<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

impl<D, F> Middleware<D> for FnMiddleware<D, F>
where
    D: Routable,
    F: for<'a> Fn(&mut Context<D>, Next<'a, D>) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ctx: &mut Context<D>, next: Next<'_, D>) -> StageResult {
        (self.f)(ctx, next)
    }
}

/// Wrap a closure as a named middleware unit.
///
/// ```rust
/// use brrtrouter_core::definition::RouteDefinition;
/// use brrtrouter_core::dispatcher::Output;
/// use brrtrouter_core::middleware::{from_fn, Middleware};
///
/// let deny = from_fn::<RouteDefinition, _>("deny", |_ctx, _next| Ok(Output::error(403, "denied")));
/// assert_eq!(Middleware::<RouteDefinition>::name(&deny), "deny");
/// ```
pub fn from_fn<D, F>(name: impl Into<String>, f: F) -> FnMiddleware<D, F>
where
    D: Routable,
    F: for<'a> Fn(&mut Context<D>, Next<'a, D>) -> StageResult + Send + Sync,
{
    FnMiddleware {
        name: name.into(),
        f,
        _kind: PhantomData,
    }
}

/// Named middleware units that definitions reference by name
pub struct MiddlewareSet<D: Routable> {
    units: HashMap<String, Arc<dyn Middleware<D>>>,
}

impl<D: Routable> Default for MiddlewareSet<D> {
    fn default() -> Self {
        Self {
            units: HashMap::new(),
        }
    }
}

impl<D: Routable> Clone for MiddlewareSet<D> {
    fn clone(&self) -> Self {
        Self {
            units: self
                .units
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect(),
        }
    }
}

impl<D: Routable> fmt::Debug for MiddlewareSet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.units.keys().collect();
        names.sort();
        f.debug_struct("MiddlewareSet").field("units", &names).finish()
    }
}

impl<D: Routable> MiddlewareSet<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a unit under `name`.
    pub fn register<M>(&mut self, name: impl Into<String>, unit: M) -> &mut Self
    where
        M: Middleware<D> + 'static,
    {
        self.units.insert(name.into(), Arc::new(unit));
        self
    }

    /// Register an already shared unit under `name`.
    pub fn register_arc(&mut self, name: impl Into<String>, unit: Arc<dyn Middleware<D>>) -> &mut Self {
        self.units.insert(name.into(), unit);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Middleware<D>>> {
        self.units.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Resolve references attached to `stage`, appending them to `into` in order.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownMiddleware`] for the first reference with no unit.
    pub fn resolve_into(
        &self,
        stage: Stage,
        refs: &[MiddlewareRef],
        into: &mut Vec<Arc<dyn Middleware<D>>>,
    ) -> Result<(), DispatchError> {
        for reference in refs {
            let unit = self
                .units
                .get(reference.as_str())
                .ok_or_else(|| DispatchError::UnknownMiddleware {
                    name: reference.to_string(),
                    stage,
                })?;
            into.push(Arc::clone(unit));
        }
        Ok(())
    }
}
