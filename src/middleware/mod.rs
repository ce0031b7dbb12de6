//! # Middleware Module
//!
//! Units of the staged dispatch pipeline. Every unit implements
//! [`Middleware`] and is handed the mutable [`Context`](crate::dispatcher::Context)
//! plus a [`Next`] covering the rest of its stage.
//!
//! ## Placement
//!
//! Units run either globally for a stage (registered on the
//! [`Pipeline`](crate::pipeline::Pipeline)) or per definition, referenced by
//! name from a route/command and resolved through a [`MiddlewareSet`].
//! Global units for a stage always run before definition-level ones.
//!
//! ## Bundled Units
//!
//! - [`TracingMiddleware`] - an `info` span per stage with latency logging
//! - [`MetricsMiddleware`] - atomic counters for runs, outcomes, short-circuits
//!
//! ## Custom Units
//!
//! Closures become units through [`from_fn`]:
//!
//! ```rust
//! use brrtrouter_core::definition::RouteDefinition;
//! use brrtrouter_core::dispatcher::Output;
//! use brrtrouter_core::middleware::{from_fn, MiddlewareSet};
//!
//! let mut set = MiddlewareSet::<RouteDefinition>::new();
//! set.register(
//!     "require-token",
//!     from_fn::<RouteDefinition, _>("require-token", |ctx, next| {
//!         if ctx.attributes.contains_key("token") {
//!             next.run(ctx)
//!         } else {
//!             Ok(Output::error(401, "missing token"))
//!         }
//!     }),
//! );
//! assert!(set.contains("require-token"));
//! ```

mod core;
mod metrics;
mod tracing;

#[cfg(test)]
mod tests;

pub use core::{from_fn, CoreAction, FnMiddleware, Middleware, MiddlewareSet, Next, StageResult};
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;
