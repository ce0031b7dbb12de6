//! # Router Module
//!
//! Matches inputs against a [`Registry`](crate::registry::Registry) of
//! compiled definitions.
//!
//! ## Overview
//!
//! Two input shapes share one matching contract ([`Routable`]):
//!
//! - **HTTP** ([`HttpInput`]): exact lookup of zero-parameter routes first,
//!   then every dynamic route in registration order. The first route whose
//!   matcher accepts the path and whose method set admits the request wins;
//!   there is no best-match or longest-match ranking.
//! - **CLI** ([`CommandInput`]): the leading token selects the command, the
//!   remaining tokens are parsed positionally into arguments and by
//!   `--name`/`-s` into options.
//!
//! Every raw capture is coerced by its parameter's
//! [`TypeCaster`](crate::definition::TypeCaster); a value that does not cast
//! is an error, never a silently passed-through string.
//!
//! ## Example
//!
//! ```rust
//! use brrtrouter_core::definition::{CommandDefinition, Definition, Parameter, RawCommand};
//! use brrtrouter_core::registry::Registry;
//! use brrtrouter_core::router::{CommandInput, Router};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let deploy = CommandDefinition::compile(
//!     RawCommand::new("deploy", "deploy {env} {--dry-run}", "DeployCommand")
//!         .param(Parameter::argument("env"))
//!         .param(Parameter::argument("dry-run")),
//! )
//! .unwrap();
//! let router = Router::new(Arc::new(Registry::from_definitions([deploy])));
//!
//! let hit = router
//!     .route(&CommandInput::parse("deploy staging --dry-run"))
//!     .unwrap()
//!     .matched()
//!     .unwrap();
//! assert_eq!(hit.get("env"), Some(&json!("staging")));
//! assert_eq!(hit.get("dry-run"), Some(&json!(true)));
//! ```

mod argv;
mod cast;
mod core;
mod path;
#[cfg(test)]
mod tests;

pub use argv::{parse_arguments, CommandInput};
pub use core::{
    MatchOutcome, MatchResult, NoMatch, ParamVec, Routable, Router, MAX_INLINE_PARAMS,
    SLOW_MATCH_THRESHOLD,
};
pub use path::HttpInput;
