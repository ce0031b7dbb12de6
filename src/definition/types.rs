use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default pattern for a route segment placeholder: anything up to the next `/`
pub const DEFAULT_SEGMENT_PATTERN: &str = "[^/]+";

/// Default pattern for a command argument or option value: any non-empty token
pub const DEFAULT_ARGUMENT_PATTERN: &str = ".+";

/// Coercion applied to every raw string capture before it reaches a handler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCaster {
    /// Keep the capture as a JSON string
    #[default]
    String,
    /// Parse as a signed 64-bit integer
    Integer,
    /// Parse as a finite float
    Float,
    /// Accept `1/0`, `true/false`, `yes/no`, `on/off` (case-insensitive)
    Boolean,
    /// Parse the capture as a JSON document
    Json,
}

impl TypeCaster {
    /// Coerce a raw capture, returning `None` when it does not fit.
    #[must_use]
    pub fn cast(&self, raw: &str) -> Option<Value> {
        match self {
            TypeCaster::String => Some(Value::String(raw.to_owned())),
            TypeCaster::Integer => raw.parse::<i64>().ok().map(Value::from),
            TypeCaster::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            TypeCaster::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(Value::Bool(true)),
                "0" | "false" | "no" | "off" => Some(Value::Bool(false)),
                _ => None,
            },
            TypeCaster::Json => serde_json::from_str(raw).ok(),
        }
    }
}

impl fmt::Display for TypeCaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeCaster::String => "string",
            TypeCaster::Integer => "integer",
            TypeCaster::Float => "float",
            TypeCaster::Boolean => "boolean",
            TypeCaster::Json => "json",
        };
        f.write_str(s)
    }
}

/// Declarative constraint on one named placeholder of a template
///
/// # Example
///
/// ```rust
/// use brrtrouter_core::definition::{Parameter, TypeCaster};
///
/// let id = Parameter::new("id").pattern(r"\d+").cast(TypeCaster::Integer);
/// assert_eq!(id.match_pattern, r"\d+");
/// assert!(id.should_capture);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    /// Placeholder name as written between the braces
    pub name: String,
    /// Regex fragment a single value must fully match
    #[serde(rename = "pattern")]
    pub match_pattern: String,
    /// Placeholder (and the literal run owning it) may be absent
    #[serde(rename = "optional", default)]
    pub is_optional: bool,
    /// Whether the value is extracted into the match result
    #[serde(rename = "capture", default = "default_true")]
    pub should_capture: bool,
    /// One-or-more values joined by the literal preceding the placeholder
    #[serde(rename = "repeatable", default)]
    pub is_repeatable: bool,
    /// Value used when the placeholder is absent
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Coercion applied to captured values
    #[serde(rename = "cast", default)]
    pub caster: TypeCaster,
}

fn default_true() -> bool {
    true
}

impl Parameter {
    /// A required, capturing route segment parameter matching [`DEFAULT_SEGMENT_PATTERN`]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            match_pattern: DEFAULT_SEGMENT_PATTERN.to_string(),
            is_optional: false,
            should_capture: true,
            is_repeatable: false,
            default_value: None,
            caster: TypeCaster::String,
        }
    }

    /// A command argument or option parameter matching [`DEFAULT_ARGUMENT_PATTERN`]
    pub fn argument(name: impl Into<String>) -> Self {
        Self::new(name).pattern(DEFAULT_ARGUMENT_PATTERN)
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.is_repeatable = true;
        self
    }

    /// Match the placeholder without extracting it
    #[must_use]
    pub fn uncaptured(mut self) -> Self {
        self.should_capture = false;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn cast(mut self, caster: TypeCaster) -> Self {
        self.caster = caster;
        self
    }
}

/// Named pipeline stages
///
/// `received → {matched | not-matched} → dispatched → {sending | exited}`,
/// with `throwable-caught` reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Received,
    Matched,
    NotMatched,
    Dispatched,
    ThrowableCaught,
    Sending,
    Exited,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Received,
        Stage::Matched,
        Stage::NotMatched,
        Stage::Dispatched,
        Stage::ThrowableCaught,
        Stage::Sending,
        Stage::Exited,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Matched => "matched",
            Stage::NotMatched => "not-matched",
            Stage::Dispatched => "dispatched",
            Stage::ThrowableCaught => "throwable-caught",
            Stage::Sending => "sending",
            Stage::Exited => "exited",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage `{s}`"))
    }
}

/// Name of a middleware unit, resolved through a [`MiddlewareSet`](crate::middleware::MiddlewareSet)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MiddlewareRef(pub String);

impl MiddlewareRef {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MiddlewareRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the handler a definition dispatches to.
///
/// Only the [`Container`](crate::dispatcher::Container) knows how to turn it
/// into something invocable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetRef(pub String);

impl TargetRef {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-stage middleware references attached to a single definition
pub type StageMiddleware = BTreeMap<Stage, Vec<MiddlewareRef>>;
