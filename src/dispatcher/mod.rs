//! # Dispatcher Module
//!
//! Matches an input against a registry and drives the matched (or
//! unmatched) input through the staged middleware pipeline down to the
//! dispatch target.
//!
//! ## Overview
//!
//! A [`Dispatcher`] owns:
//! - a [`Router`](crate::router::Router) over a shared, read-only registry
//! - a [`Pipeline`](crate::pipeline::Pipeline) of global units per stage
//! - a [`MiddlewareSet`](crate::middleware::MiddlewareSet) resolving the
//!   middleware names definitions reference
//! - a [`Container`] that turns a [`TargetRef`](crate::definition::TargetRef)
//!   into an invocation
//!
//! ## Request Flow
//!
//! 1. A [`Context`] is created for the input with a fresh request id
//! 2. `received` units run; their core attempts the match
//! 3. On a match, `matched` units run; their core invokes the target with
//!    the cast arguments, then `dispatched` units run over its output
//! 4. Without a match, `not-matched` units run over a 404/405 output
//! 5. Any error diverts to `throwable-caught`, whose units can replace the
//!    default error output
//! 6. The caller may run [`Dispatcher::finish`] for `sending` / `exited`
//!
//! ## Error Handling
//!
//! [`Dispatcher::dispatch`] never returns an error and never lets a handler
//! panic escape: failures, including panics caught around the target
//! invocation, end as an [`Output`]. Parameter cast and argument errors
//! become 400, everything else 500 unless a `throwable-caught` unit decides
//! otherwise.
//!
//! ## Example
//!
//! ```rust
//! use brrtrouter_core::definition::{Definition, Parameter, RawRoute, RouteDefinition};
//! use brrtrouter_core::dispatcher::{Dispatcher, HandlerContainer, Output};
//! use brrtrouter_core::registry::Registry;
//! use brrtrouter_core::router::{HttpInput, Router};
//! use http::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let route = RouteDefinition::compile(
//!     RawRoute::new("users.show", "/users/{id}", "UserController::show")
//!         .param(Parameter::new("id").pattern(r"\d+")),
//! )
//! .unwrap();
//! let router = Router::new(Arc::new(Registry::from_definitions([route])));
//!
//! let mut container = HandlerContainer::new();
//! container.register("UserController::show", |args| Ok(Output::ok(json!({ "id": args["id"] }))));
//!
//! let dispatcher = Dispatcher::new(router, Arc::new(container));
//! let out = dispatcher.dispatch(HttpInput::new(Method::GET, "/users/42"));
//! assert_eq!(out.status, 200);
//! assert_eq!(out.body, json!({ "id": "42" }));
//!
//! let miss = dispatcher.dispatch(HttpInput::new(Method::GET, "/users/abc"));
//! assert_eq!(miss.status, 404);
//! ```

mod container;
mod context;
mod core;


pub use container::{Arguments, Container, HandlerContainer, HandlerFn};
pub use context::{Context, HeaderVec, Output, MAX_INLINE_HEADERS};
pub use core::Dispatcher;
