//! # Definition Module
//!
//! Route and command records, the parameters that constrain their
//! placeholders, and the [`Definition`] trait the registry, cache codec and
//! dispatcher are generic over.
//!
//! A definition is born "raw" ([`RawRoute`], [`RawCommand`]) from the scanner
//! collaborator, compiled once, and never mutated afterwards:
//!
//! ```rust
//! use brrtrouter_core::definition::{Definition, Parameter, RawRoute, RouteDefinition};
//!
//! let raw = RawRoute::new("users.show", "/users/{id}", "UserController::show")
//!     .param(Parameter::new("id").pattern(r"\d+"));
//! let route = RouteDefinition::compile(raw).unwrap();
//! assert_eq!(route.name(), "users.show");
//! assert!(route.compiled.matcher.is_match("/users/42"));
//! ```

mod command;
mod route;
mod types;

pub use command::{CommandDefinition, RawCommand};
pub use route::{RawRoute, RouteDefinition};
pub use types::{
    MiddlewareRef, Parameter, Stage, StageMiddleware, TargetRef, TypeCaster,
    DEFAULT_ARGUMENT_PATTERN, DEFAULT_SEGMENT_PATTERN,
};

use crate::error::{CacheError, CompileError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A compiled, name-keyed record stored in a [`Registry`](crate::registry::Registry)
pub trait Definition: Debug + Send + Sync + Sized + 'static {
    /// Uncompiled form produced by the scanner collaborator
    type Raw;
    /// Versioned cache encoding of one definition
    type Snapshot: Serialize + DeserializeOwned;
    /// Discriminator written into cache snapshots (`route` / `command`)
    const KIND: &'static str;

    /// Compile a raw definition; a pure function of its template and parameters.
    fn compile(raw: Self::Raw) -> Result<Self, CompileError>;

    fn name(&self) -> &str;

    fn template(&self) -> &str;

    fn parameters(&self) -> &[Parameter];

    fn target(&self) -> &TargetRef;

    fn middleware(&self) -> &StageMiddleware;

    /// Middleware references attached to one stage (empty when none)
    fn stage_middleware(&self, stage: Stage) -> &[MiddlewareRef] {
        self.middleware()
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Key for the O(1) exact lookup table, `None` for definitions that must be
    /// tested against their matcher.
    fn static_key(&self) -> Option<&str>;

    /// Textual form of the compiled matcher, used to compare registries
    fn matcher_source(&self) -> String;

    fn encode(&self) -> Self::Snapshot;

    fn decode(snapshot: Self::Snapshot) -> Result<Self, CacheError>;
}
