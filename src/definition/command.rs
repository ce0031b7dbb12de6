use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{MiddlewareRef, Parameter, Stage, StageMiddleware, TargetRef};
use super::Definition;
use crate::compiler::{self, CompiledCommand};
use crate::error::{CacheError, CompileError, ValidationError};
use crate::registry::cache::{decode_command, encode_command, SerializedCommand};

/// Uncompiled console command as supplied by the scanner collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    pub name: String,
    /// Signature template, e.g. `deploy {env} {--dry-run}`
    pub template: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub middleware: StageMiddleware,
    pub target: TargetRef,
}

impl RawCommand {
    pub fn new(name: impl Into<String>, template: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            description: None,
            parameters: Vec::new(),
            middleware: StageMiddleware::new(),
            target: TargetRef::new(target),
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, stage: Stage, name: &str) -> Self {
        self.middleware
            .entry(stage)
            .or_default()
            .push(MiddlewareRef::from(name));
        self
    }
}

/// Compiled console command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    pub name: String,
    pub template: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub middleware: StageMiddleware,
    pub target: TargetRef,
    pub compiled: CompiledCommand,
}

impl CommandDefinition {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render a command line for this command
    pub fn generate(&self, data: &BTreeMap<String, Value>) -> Result<String, ValidationError> {
        compiler::generate_command(&self.template, &self.parameters, data)
    }
}

impl Definition for CommandDefinition {
    type Raw = RawCommand;
    type Snapshot = SerializedCommand;
    const KIND: &'static str = "command";

    fn compile(raw: RawCommand) -> Result<Self, CompileError> {
        let compiled = compiler::compile_command(&raw.template, &raw.parameters)?;
        Ok(Self {
            name: raw.name,
            template: raw.template,
            description: raw.description,
            parameters: raw.parameters,
            middleware: raw.middleware,
            target: raw.target,
            compiled,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn template(&self) -> &str {
        &self.template
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn target(&self) -> &TargetRef {
        &self.target
    }

    fn middleware(&self) -> &StageMiddleware {
        &self.middleware
    }

    fn static_key(&self) -> Option<&str> {
        Some(&self.compiled.command)
    }

    fn matcher_source(&self) -> String {
        self.compiled.signature()
    }

    fn encode(&self) -> SerializedCommand {
        encode_command(self)
    }

    fn decode(snapshot: SerializedCommand) -> Result<Self, CacheError> {
        decode_command(snapshot)
    }
}
