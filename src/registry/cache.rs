//! Versioned cache snapshot codec and cache file IO.
//!
//! A snapshot is a JSON document:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "kind": "route",
//!   "checksum": "<sha256 of entries>",
//!   "entries": [ { "version": 1, "name": "users.show", ... } ]
//! }
//! ```
//!
//! Entries are kept as an ordered list because registration order is the
//! match priority. Every struct rejects unknown fields. Decoding an entry
//! rebuilds its matcher from the stored source, then compiles the template
//! again and rejects the entry unless both agree.

use http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::Registry;
use crate::compiler::{
    compile, compile_command, index_parameters, ArgumentSpec, CaptureSlot, CompiledCommand,
    CompiledPath, OptionMode, OptionSpec,
};
use crate::definition::{
    CommandDefinition, Definition, Parameter, RouteDefinition, StageMiddleware, TargetRef,
};
use crate::error::CacheError;

/// Layout version of the snapshot envelope
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Layout version of a single serialized definition
pub const ENTRY_SCHEMA_VERSION: u32 = 1;

/// Versioned encoding of a registry's contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSnapshot<S> {
    pub schema_version: u32,
    /// `route` or `command`
    pub kind: String,
    /// Hex SHA-256 of the JSON-encoded entries
    pub checksum: String,
    pub entries: Vec<S>,
}

impl<S: Serialize> CacheSnapshot<S> {
    /// Wrap encoded entries in an envelope with a fresh checksum.
    pub fn seal(kind: &str, entries: Vec<S>) -> Result<Self, CacheError> {
        let checksum = entries_checksum(&entries)?;
        Ok(Self {
            schema_version: CACHE_SCHEMA_VERSION,
            kind: kind.to_string(),
            checksum,
            entries,
        })
    }

    /// Check the envelope against the expected kind and the recorded checksum.
    pub fn verify(&self, expected_kind: &str) -> Result<(), CacheError> {
        if self.schema_version != CACHE_SCHEMA_VERSION {
            return Err(CacheError::SchemaVersion {
                found: self.schema_version,
                expected: CACHE_SCHEMA_VERSION,
            });
        }
        if self.kind != expected_kind {
            return Err(CacheError::KindMismatch {
                found: self.kind.clone(),
                expected: expected_kind.to_string(),
            });
        }
        let computed = entries_checksum(&self.entries)?;
        if computed != self.checksum {
            return Err(CacheError::Checksum {
                recorded: self.checksum.clone(),
                computed,
            });
        }
        Ok(())
    }
}

fn entries_checksum<S: Serialize>(entries: &[S]) -> Result<String, CacheError> {
    let bytes = serde_json::to_vec(entries).map_err(|e| CacheError::Malformed(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialized route matcher: regex source plus capture slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedMatcher {
    pub source: String,
    pub captures: Vec<SerializedCapture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedCapture {
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

/// Cache encoding of one [`RouteDefinition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedRoute {
    pub version: u32,
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub middleware: StageMiddleware,
    pub target: TargetRef,
    pub matcher: SerializedMatcher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedArgument {
    pub name: String,
    pub optional: bool,
    pub repeatable: bool,
    pub validator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    pub mode: String,
    pub validator: String,
}

/// Serialized command signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedSignature {
    pub command: String,
    pub arguments: Vec<SerializedArgument>,
    pub options: Vec<SerializedOption>,
}

/// Cache encoding of one [`CommandDefinition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedCommand {
    pub version: u32,
    pub name: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub middleware: StageMiddleware,
    pub target: TargetRef,
    pub signature: SerializedSignature,
}

pub(crate) fn encode_route(route: &RouteDefinition) -> SerializedRoute {
    SerializedRoute {
        version: ENTRY_SCHEMA_VERSION,
        name: route.name.clone(),
        template: route.template.clone(),
        methods: route.methods.iter().map(|m| m.as_str().to_string()).collect(),
        parameters: route.parameters.clone(),
        middleware: route.middleware.clone(),
        target: route.target.clone(),
        matcher: SerializedMatcher {
            source: route.compiled.source().to_string(),
            captures: route
                .compiled
                .captures
                .iter()
                .map(|slot| SerializedCapture {
                    name: slot.name.to_string(),
                    group: slot.group.clone(),
                    delimiter: slot.delimiter.clone(),
                })
                .collect(),
        },
    }
}

pub(crate) fn decode_route(entry: SerializedRoute) -> Result<RouteDefinition, CacheError> {
    let name = entry.name;
    let invalid = |reason: String| CacheError::Entry {
        name: name.clone(),
        reason,
    };

    check_entry_version(entry.version).map_err(invalid)?;
    index_parameters(&entry.parameters).map_err(|e| invalid(e.to_string()))?;

    let methods = entry
        .methods
        .iter()
        .map(|m| Method::from_bytes(m.as_bytes()).map_err(|_| invalid(format!("invalid method `{m}`"))))
        .collect::<Result<Vec<_>, _>>()?;

    let matcher = anchored_regex(&entry.matcher.source).map_err(invalid)?;
    let groups: HashSet<&str> = matcher.capture_names().flatten().collect();

    let mut captures = Vec::with_capacity(entry.matcher.captures.len());
    for capture in entry.matcher.captures {
        let param = entry
            .parameters
            .iter()
            .find(|p| p.name == capture.name && p.should_capture)
            .ok_or_else(|| invalid(format!("capture `{}` has no capturing parameter", capture.name)))?;
        if !groups.contains(capture.group.as_str()) {
            return Err(invalid(format!(
                "capture group `{}` is missing from the matcher",
                capture.group
            )));
        }
        if param.is_repeatable != capture.delimiter.is_some() {
            return Err(invalid(format!(
                "capture `{}` deliminator does not fit its parameter",
                capture.name
            )));
        }
        captures.push(CaptureSlot {
            name: Arc::from(capture.name.as_str()),
            group: capture.group,
            delimiter: capture.delimiter,
        });
    }

    let capturing = entry.parameters.iter().filter(|p| p.should_capture).count();
    if capturing != captures.len() {
        return Err(invalid(format!(
            "{capturing} capturing parameters but {} capture slots",
            captures.len()
        )));
    }

    let compiled = CompiledPath { matcher, captures };
    let expected = compile(&entry.template, &entry.parameters).map_err(|e| invalid(e.to_string()))?;
    if compiled != expected {
        return Err(invalid(format!(
            "matcher `{}` does not fit template `{}` (compiles to `{}`)",
            compiled.source(),
            entry.template,
            expected.source()
        )));
    }

    Ok(RouteDefinition {
        name,
        template: entry.template,
        methods,
        parameters: entry.parameters,
        middleware: entry.middleware,
        target: entry.target,
        compiled,
    })
}

pub(crate) fn encode_command(command: &CommandDefinition) -> SerializedCommand {
    let signature = &command.compiled;
    SerializedCommand {
        version: ENTRY_SCHEMA_VERSION,
        name: command.name.clone(),
        template: command.template.clone(),
        description: command.description.clone(),
        parameters: command.parameters.clone(),
        middleware: command.middleware.clone(),
        target: command.target.clone(),
        signature: SerializedSignature {
            command: signature.command.clone(),
            arguments: signature
                .arguments
                .iter()
                .map(|arg| SerializedArgument {
                    name: arg.name.to_string(),
                    optional: arg.optional,
                    repeatable: arg.repeatable,
                    validator: arg.validator.as_str().to_string(),
                })
                .collect(),
            options: signature
                .options
                .iter()
                .map(|opt| SerializedOption {
                    name: opt.name.to_string(),
                    short: opt.short,
                    mode: opt.mode.as_str().to_string(),
                    validator: opt.validator.as_str().to_string(),
                })
                .collect(),
        },
    }
}

pub(crate) fn decode_command(entry: SerializedCommand) -> Result<CommandDefinition, CacheError> {
    let name = entry.name;
    let invalid = |reason: String| CacheError::Entry {
        name: name.clone(),
        reason,
    };

    check_entry_version(entry.version).map_err(invalid)?;
    index_parameters(&entry.parameters).map_err(|e| invalid(e.to_string()))?;

    let declared = |param: &str| entry.parameters.iter().any(|p| p.name == param);
    let signature = entry.signature;
    if signature.command.is_empty() || signature.command.contains(char::is_whitespace) {
        return Err(invalid(format!("invalid command name `{}`", signature.command)));
    }

    let mut arguments = Vec::with_capacity(signature.arguments.len());
    for arg in signature.arguments {
        if !declared(&arg.name) {
            return Err(invalid(format!("argument `{}` has no parameter", arg.name)));
        }
        arguments.push(ArgumentSpec {
            validator: anchored_regex(&arg.validator).map_err(invalid)?,
            name: Arc::from(arg.name.as_str()),
            optional: arg.optional,
            repeatable: arg.repeatable,
        });
    }

    let mut options = Vec::with_capacity(signature.options.len());
    for opt in signature.options {
        if !declared(&opt.name) {
            return Err(invalid(format!("option `{}` has no parameter", opt.name)));
        }
        let mode = OptionMode::parse(&opt.mode)
            .ok_or_else(|| invalid(format!("unknown option mode `{}`", opt.mode)))?;
        options.push(OptionSpec {
            validator: anchored_regex(&opt.validator).map_err(invalid)?,
            name: Arc::from(opt.name.as_str()),
            short: opt.short,
            mode,
        });
    }

    if arguments.len() + options.len() != entry.parameters.len() {
        return Err(invalid("signature does not cover every parameter".to_string()));
    }

    let compiled = CompiledCommand {
        command: signature.command,
        arguments,
        options,
    };
    let expected =
        compile_command(&entry.template, &entry.parameters).map_err(|e| invalid(e.to_string()))?;
    if compiled != expected {
        return Err(invalid(format!(
            "signature `{}` does not fit template `{}` (compiles to `{}`)",
            compiled.signature(),
            entry.template,
            expected.signature()
        )));
    }

    Ok(CommandDefinition {
        name,
        template: entry.template,
        description: entry.description,
        parameters: entry.parameters,
        middleware: entry.middleware,
        target: entry.target,
        compiled,
    })
}

fn check_entry_version(version: u32) -> Result<(), String> {
    if version == ENTRY_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(format!(
            "entry schema version {version}, expected {ENTRY_SCHEMA_VERSION}"
        ))
    }
}

fn anchored_regex(source: &str) -> Result<Regex, String> {
    if !(source.starts_with('^') && source.ends_with('$')) {
        return Err(format!("matcher `{source}` is not anchored"));
    }
    Regex::new(source).map_err(|e| format!("matcher `{source}` does not compile: {e}"))
}

/// Cache artifact on disk for one registry kind
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write a registry snapshot, replacing any previous file atomically.
    pub fn write<D: Definition>(&self, registry: &Registry<D>) -> Result<(), CacheError> {
        let snapshot = registry.to_cache_snapshot()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CacheError::Malformed(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::Io {
                path: self.path.clone(),
                source,
            });
        }

        info!(
            path = %self.path.display(),
            kind = D::KIND,
            definitions_count = snapshot.entries.len(),
            bytes = bytes.len(),
            "Cache snapshot written"
        );
        Ok(())
    }

    /// Read and fully decode a registry snapshot; any bad entry fails the whole load.
    pub fn read<D: Definition>(&self) -> Result<Registry<D>, CacheError> {
        let bytes = fs::read(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: CacheSnapshot<D::Snapshot> =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Malformed(e.to_string()))?;
        debug!(
            path = %self.path.display(),
            kind = D::KIND,
            entries = snapshot.entries.len(),
            "Cache snapshot parsed"
        );
        Registry::from_cache_snapshot(snapshot)
    }
}
