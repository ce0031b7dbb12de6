//! Error types for every failure family of the router core.
//!
//! Build-time failures ([`CompileError`], [`CacheError`], [`SetupError`]) abort
//! startup. Request-time failures are collected under [`DispatchError`], the
//! only error type that travels through the pipeline; it never escapes
//! [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch).

use std::path::PathBuf;

use thiserror::Error;

use crate::definition::{Stage, TypeCaster};

/// Boxed error returned by collaborators (scanner, container)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A template and its declared parameters could not be turned into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("template `{template}`: malformed placeholder at byte {offset}")]
    MalformedPlaceholder { template: String, offset: usize },

    #[error("template `{template}`: placeholder `{name}` has no declared parameter")]
    UndeclaredPlaceholder { template: String, name: String },

    #[error("template `{template}`: parameter `{name}` is declared but never referenced")]
    UnreferencedParameter { template: String, name: String },

    #[error("template `{template}`: placeholder `{name}` appears more than once")]
    DuplicatePlaceholder { template: String, name: String },

    #[error("parameter `{name}` is declared more than once")]
    DuplicateParameter { name: String },

    #[error("template `{template}`: repeatable parameter `{name}` must be the last placeholder")]
    RepeatableNotTrailing { template: String, name: String },

    #[error("template `{template}`: repeatable parameter `{name}` has no literal deliminator before it")]
    EmptyDelimiter { template: String, name: String },

    #[error("parameter `{name}` has an empty match pattern")]
    EmptyPattern { name: String },

    #[error("parameter `{name}`: invalid match pattern `{pattern}`: {reason}")]
    InvalidPattern {
        name: String,
        pattern: String,
        reason: String,
    },

    #[error("template `{template}`: matcher could not be built: {reason}")]
    Matcher { template: String, reason: String },

    #[error("command template `{template}` must start with a command name")]
    MissingCommandName { template: String },

    #[error("command template `{template}`: unexpected literal `{literal}`")]
    UnexpectedLiteral { template: String, literal: String },

    #[error("command template `{template}`: required argument `{name}` follows an optional one")]
    RequiredAfterOptional { template: String, name: String },

    #[error("command template `{template}`: flag `--{name}` cannot be repeatable")]
    RepeatableFlag { template: String, name: String },
}

/// A cache snapshot is corrupt or was written by an incompatible schema.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache file configured")]
    NotConfigured,

    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cache snapshot: {0}")]
    Malformed(String),

    #[error("unsupported cache schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("cache snapshot holds `{found}` definitions, expected `{expected}`")]
    KindMismatch { found: String, expected: String },

    #[error("cache checksum mismatch (recorded {recorded}, computed {computed})")]
    Checksum { recorded: String, computed: String },

    #[error("duplicate cache entry `{name}`")]
    DuplicateEntry { name: String },

    #[error("cache entry `{name}`: {reason}")]
    Entry { name: String, reason: String },
}

/// A datum handed to `generate` cannot be rendered into the template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("parameter `{parameter}`: value `{value}` does not match `{expected}`")]
    Mismatch {
        parameter: String,
        value: String,
        expected: String,
    },

    #[error("parameter `{parameter}` is required")]
    Missing { parameter: String },

    #[error("parameter `{parameter}` is not repeatable and cannot take an array")]
    UnexpectedArray { parameter: String },

    #[error("parameter `{parameter}`: unsupported value `{value}`")]
    Unsupported { parameter: String, value: String },

    #[error("invalid template: {0}")]
    Template(#[from] CompileError),
}

/// A raw capture could not be coerced by the parameter's caster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter `{parameter}`: cannot cast `{value}` as {caster}")]
pub struct ParameterCastError {
    pub parameter: String,
    pub value: String,
    pub caster: TypeCaster,
}

/// Command-line tokens do not fit the matched command's signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("missing required argument `{name}`")]
    MissingArgument { name: String },

    #[error("too many arguments, unexpected `{token}`")]
    TooManyArguments { token: String },

    #[error("unknown option `{option}`")]
    UnknownOption { option: String },

    #[error("option `--{name}` requires a value")]
    MissingOptionValue { name: String },

    #[error("option `--{name}` does not accept a value")]
    UnexpectedOptionValue { name: String },

    #[error("`{name}`: value `{value}` does not match `{expected}`")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
}

/// Raised by the scanner collaborator.
#[derive(Debug, Error)]
#[error("scanner failed: {source}")]
pub struct ScanError {
    #[source]
    pub source: BoxError,
}

impl ScanError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Failure of [`Registry::setup`](crate::registry::Registry::setup).
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A manifest file could not be read or describes invalid definitions.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest {path}: invalid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest {path}: invalid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("route `{route}`: invalid HTTP method `{method}`")]
    Method { route: String, method: String },

    #[error("`{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: CompileError,
    },
}

/// Request-time failure routed into the `throwable-caught` lane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    ParameterCast(#[from] ParameterCastError),

    #[error(transparent)]
    InvalidInput(#[from] ArgumentError),

    #[error("dispatch target `{target}` failed: {message}")]
    Target { target: String, message: String },

    #[error("unknown middleware `{name}` on stage `{stage}`")]
    UnknownMiddleware { name: String, stage: Stage },

    #[error("middleware `{name}` failed: {message}")]
    Middleware { name: String, message: String },
}

impl DispatchError {
    /// Build a middleware failure from any displayable error.
    pub fn middleware(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DispatchError::Middleware {
            name: name.into(),
            message: err.to_string(),
        }
    }
}
