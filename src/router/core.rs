//! Router core module - hot path for request and command matching.
//!
//! # JSF Compliance (Rule 206)
//!
//! Matching runs per request. Extracted parameters live in a [`ParamVec`]
//! (inline for up to [`MAX_INLINE_PARAMS`] entries) keyed by the `Arc<str>`
//! names interned at compile time.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::definition::{Definition, Stage};
use crate::error::DispatchError;
use crate::registry::Registry;

/// Maximum number of extracted parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Extracted, cast parameters in template order.
pub type ParamVec = SmallVec<[(Arc<str>, Value); MAX_INLINE_PARAMS]>;

/// Matches slower than this are logged at `warn` unless the router is
/// given its own threshold.
pub const SLOW_MATCH_THRESHOLD: Duration = Duration::from_millis(1);

/// Successful match of an input against one definition
#[derive(Debug, Clone)]
pub struct MatchResult<D> {
    /// The matched definition (shared with the registry)
    pub definition: Arc<D>,
    /// Path captures or positional command arguments
    pub params: ParamVec,
    /// Command options; always empty for routes
    pub options: ParamVec,
}

impl<D: Definition> MatchResult<D> {
    #[must_use]
    pub fn new(definition: Arc<D>, params: ParamVec) -> Self {
        Self {
            definition,
            params,
            options: ParamVec::new(),
        }
    }

    /// Name of the matched definition
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Get an extracted parameter or option by name.
    ///
    /// Positional parameters shadow options of the same name, which the
    /// compiler never produces.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .chain(self.options.iter())
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Argument map handed to the container: parameters and options merged
    /// Note: This allocates
    #[must_use]
    pub fn arguments(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .chain(self.options.iter())
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Extracted parameters only, as an owned map
    #[must_use]
    pub fn params_map(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Command options only, as an owned map
    #[must_use]
    pub fn options_map(&self) -> BTreeMap<String, Value> {
        self.options
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// No definition accepted the input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoMatch {
    /// Methods of routes whose path matched but whose method set did not
    /// admit the request; empty when nothing matched the path at all.
    pub allowed: Vec<Method>,
}

impl NoMatch {
    /// The path exists under other methods
    #[must_use]
    pub fn method_not_allowed(&self) -> bool {
        !self.allowed.is_empty()
    }
}

/// Result of [`Router::route`]
#[derive(Debug, Clone)]
pub enum MatchOutcome<D> {
    Matched(MatchResult<D>),
    NotMatched(NoMatch),
}

impl<D> MatchOutcome<D> {
    #[must_use]
    pub fn matched(self) -> Option<MatchResult<D>> {
        match self {
            MatchOutcome::Matched(result) => Some(result),
            MatchOutcome::NotMatched(_) => None,
        }
    }

    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// A definition kind that knows how to match its own input shape
///
/// Implemented by [`RouteDefinition`](crate::definition::RouteDefinition)
/// (HTTP requests) and [`CommandDefinition`](crate::definition::CommandDefinition)
/// (argv vectors).
pub trait Routable: Definition {
    type Input: Debug + Send + Sync;

    /// Post-processing stage run by the outermost caller (`sending` / `exited`)
    const FINAL_STAGE: Stage;

    /// One-line description of an input for logs
    fn describe(input: &Self::Input) -> String;

    /// Match `input` against the registry.
    ///
    /// # Errors
    ///
    /// Casting and argument parsing failures of the selected definition.
    fn match_input(
        registry: &Registry<Self>,
        input: &Self::Input,
    ) -> Result<MatchOutcome<Self>, DispatchError>;
}

/// Read-only matcher over a shared registry
#[derive(Debug)]
pub struct Router<D: Routable> {
    registry: Arc<Registry<D>>,
    slow_threshold: Duration,
}

impl<D: Routable> Clone for Router<D> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            slow_threshold: self.slow_threshold,
        }
    }
}

impl<D: Routable> Router<D> {
    #[must_use]
    pub fn new(registry: Arc<Registry<D>>) -> Self {
        info!(
            kind = D::KIND,
            definitions_count = registry.len(),
            dynamic_count = registry.dynamic().count(),
            "Routing table loaded"
        );
        Self {
            registry,
            slow_threshold: SLOW_MATCH_THRESHOLD,
        }
    }

    /// Log matches slower than `threshold` at `warn` instead of [`SLOW_MATCH_THRESHOLD`].
    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<D>> {
        &self.registry
    }

    /// Match an input: O(1) static lookup first, then the dynamic
    /// definitions in registration order; the first that accepts wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use brrtrouter_core::definition::{Definition, Parameter, RawRoute, RouteDefinition};
    /// use brrtrouter_core::registry::Registry;
    /// use brrtrouter_core::router::{HttpInput, Router};
    /// use http::Method;
    /// use std::sync::Arc;
    ///
    /// let route = RouteDefinition::compile(
    ///     RawRoute::new("users.show", "/users/{id}", "show").param(Parameter::new("id").pattern(r"\d+")),
    /// )
    /// .unwrap();
    /// let router = Router::new(Arc::new(Registry::from_definitions([route])));
    ///
    /// let hit = router.route(&HttpInput::new(Method::GET, "/users/42")).unwrap();
    /// assert_eq!(hit.matched().unwrap().get("id"), Some(&serde_json::json!("42")));
    /// assert!(!router.route(&HttpInput::new(Method::GET, "/users/abc")).unwrap().is_match());
    /// ```
    pub fn route(&self, input: &D::Input) -> Result<MatchOutcome<D>, DispatchError> {
        debug!(kind = D::KIND, input = %D::describe(input), "Match attempt");

        let start = Instant::now();
        let outcome = D::match_input(&self.registry, input);
        let elapsed = start.elapsed();

        match &outcome {
            Ok(MatchOutcome::Matched(result)) => {
                if elapsed > self.slow_threshold {
                    warn!(
                        kind = D::KIND,
                        input = %D::describe(input),
                        name = %result.name(),
                        template = %result.definition.template(),
                        duration_us = elapsed.as_micros(),
                        "Slow match detected"
                    );
                } else {
                    info!(
                        kind = D::KIND,
                        input = %D::describe(input),
                        name = %result.name(),
                        template = %result.definition.template(),
                        params = result.params.len() + result.options.len(),
                        duration_us = elapsed.as_micros(),
                        "Matched"
                    );
                }
            }
            Ok(MatchOutcome::NotMatched(miss)) => {
                warn!(
                    kind = D::KIND,
                    input = %D::describe(input),
                    allowed = ?miss.allowed,
                    duration_us = elapsed.as_micros(),
                    "No match"
                );
            }
            Err(err) => {
                warn!(
                    kind = D::KIND,
                    input = %D::describe(input),
                    error = %err,
                    duration_us = elapsed.as_micros(),
                    "Match rejected input"
                );
            }
        }
        outcome
    }

    /// Print all registered definitions to stdout
    pub fn dump(&self) {
        println!("[{}s] count={}", D::KIND, self.registry.len());
        for definition in self.registry.all() {
            println!(
                "[{}] {} {} -> {}",
                D::KIND,
                definition.name(),
                definition.template(),
                definition.target()
            );
        }
    }
}
