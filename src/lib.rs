//! # BRRTRouter Core
//!
//! **BRRTRouter Core** compiles path and command templates into matchers,
//! stores the results in a cacheable registry, and dispatches HTTP requests
//! and command lines through a staged, short-circuiting middleware pipeline.
//!
//! ## Overview
//!
//! A definition (a [`RouteDefinition`] or a [`CommandDefinition`]) names a
//! template such as `/users/{id}` or `deploy {env} {--dry-run}`, the
//! [`Parameter`]s that constrain its placeholders, the target that serves
//! it, and the middleware attached to each pipeline stage. Templates are
//! compiled once; the same template and parameters can render concrete paths
//! back out with `generate`.
//!
//! ## Architecture
//!
//! - **[`compiler`]** - template parsing, matcher construction, and inverse generation
//! - **[`definition`]** - route and command records and the [`Definition`] trait
//! - **[`registry`]** - name-indexed store with a versioned, checksummed cache snapshot
//! - **[`router`]** - HTTP and argv matching with type casting
//! - **[`middleware`]** - the [`Middleware`] trait, named unit sets, bundled tracing and metrics units
//! - **[`pipeline`]** - per-stage unit chains and stage execution
//! - **[`dispatcher`]** - runs one input through every stage and the target
//! - **[`manifest`]** - YAML/JSON scanner feeding registry setup
//! - **[`config`]** - file and environment configuration
//! - **[`otel`]** - structured logging setup
//! - **[`cli`]** - the `brrtrouter-core` binary's commands
//!
//! ### Request Handling Flow
//!
//! ```text
//! input
//!   └─ received ── route
//!         ├─ matched ── invoke target ── dispatched
//!         └─ not-matched
//!   (any error) ─> throwable-caught
//! output ─> sending / exited
//! ```
//!
//! A unit that returns without calling its continuation short-circuits:
//! the rest of its stage, and everything nested inside it, is skipped.
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtrouter_core::definition::{Definition, Parameter, RawRoute, RouteDefinition, TypeCaster};
//! use brrtrouter_core::dispatcher::{Dispatcher, HandlerContainer, Output};
//! use brrtrouter_core::registry::Registry;
//! use brrtrouter_core::router::{HttpInput, Router};
//! use http::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let route = RouteDefinition::compile(
//!     RawRoute::new("users.show", "/users/{id}", "users.show")
//!         .method(Method::GET)
//!         .param(Parameter::new("id").pattern(r"\d+").cast(TypeCaster::Integer)),
//! )
//! .unwrap();
//!
//! let mut handlers = HandlerContainer::new();
//! handlers.register("users.show", |args| Ok(Output::ok(json!({ "id": args["id"] }))));
//!
//! let router = Router::new(Arc::new(Registry::from_definitions([route])));
//! let dispatcher = Dispatcher::new(router, Arc::new(handlers));
//!
//! let output = dispatcher.dispatch(HttpInput::new(Method::GET, "/users/7"));
//! assert_eq!(output.status, 200);
//! assert_eq!(output.body, json!({ "id": 7 }));
//! ```
//!
//! ## Features
//!
//! - **Two-Phase Matching**: O(1) lookup for static templates, ordered regex scan for the rest
//! - **Inverse Generation**: render paths and command lines from the same templates
//! - **Cache Snapshots**: skip scanning and compilation on warm starts; corrupt snapshots are rejected
//! - **Staged Middleware**: seven named stages with short-circuit tracking and an error lane
//! - **Structured Logging**: `tracing` spans and fields throughout, JSON or pretty output

pub mod cli;
pub mod compiler;
pub mod config;
pub mod definition;
pub mod dispatcher;
mod echo;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod middleware;
pub mod otel;
pub mod pipeline;
pub mod registry;
pub mod router;

pub use config::RouterConfig;
pub use definition::{
    CommandDefinition, Definition, Parameter, RawCommand, RawRoute, RouteDefinition, Stage,
    TypeCaster,
};
pub use dispatcher::{Container, Context, Dispatcher, HandlerContainer, Output};
pub use echo::EchoContainer;
pub use error::{CacheError, CompileError, DispatchError, SetupError, ValidationError};
pub use ids::RequestId;
pub use middleware::{Middleware, MiddlewareSet, Next};
pub use pipeline::Pipeline;
pub use registry::{Registry, Scanner, SetupOptions};
pub use router::{CommandInput, HttpInput, Router};
