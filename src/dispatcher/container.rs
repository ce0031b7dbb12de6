use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::Output;
use crate::definition::TargetRef;
use crate::error::BoxError;

/// Argument map handed to a dispatch target: name → cast value
pub type Arguments = BTreeMap<String, Value>;

/// Resolves a [`TargetRef`] into something invocable and runs it
///
/// The dispatcher never looks behind a target reference; whatever the
/// container returns becomes the provisional output of the `matched` stage.
/// A returned error (or a panic) is routed into `throwable-caught`.
pub trait Container: Send + Sync {
    fn invoke(&self, target: &TargetRef, arguments: &Arguments) -> Result<Output, BoxError>;
}

/// Handler function stored in a [`HandlerContainer`]
pub type HandlerFn = Arc<dyn Fn(&Arguments) -> Result<Output, BoxError> + Send + Sync>;

/// Container backed by a map of target name → closure
///
/// # Example
///
/// ```rust
/// use brrtrouter_core::definition::TargetRef;
/// use brrtrouter_core::dispatcher::{Container, HandlerContainer, Output};
/// use serde_json::json;
///
/// let mut container = HandlerContainer::new();
/// container.register("HealthController", |_args| Ok(Output::ok(json!({"ok": true}))));
///
/// let out = container
///     .invoke(&TargetRef::new("HealthController"), &Default::default())
///     .unwrap();
/// assert_eq!(out.status, 200);
/// ```
#[derive(Clone, Default)]
pub struct HandlerContainer {
    handlers: HashMap<String, HandlerFn>,
}

impl fmt::Debug for HandlerContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut targets: Vec<_> = self.handlers.keys().collect();
        targets.sort();
        f.debug_struct("HandlerContainer")
            .field("targets", &targets)
            .finish()
    }
}

impl HandlerContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `target`.
    pub fn register<F>(&mut self, target: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Arguments) -> Result<Output, BoxError> + Send + Sync + 'static,
    {
        self.handlers.insert(target.into(), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn contains(&self, target: &str) -> bool {
        self.handlers.contains_key(target)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Container for HandlerContainer {
    fn invoke(&self, target: &TargetRef, arguments: &Arguments) -> Result<Output, BoxError> {
        let handler = self
            .handlers
            .get(target.as_str())
            .ok_or_else(|| format!("no handler registered for `{target}`"))?;
        handler(arguments)
    }
}
