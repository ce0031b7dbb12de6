use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{MiddlewareRef, Parameter, Stage, StageMiddleware, TargetRef};
use super::Definition;
use crate::compiler::{self, CompiledPath};
use crate::error::{CacheError, CompileError, ValidationError};
use crate::registry::cache::{decode_route, encode_route, SerializedRoute};

/// Uncompiled HTTP route as supplied by the scanner collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct RawRoute {
    pub name: String,
    pub template: String,
    /// Accepted methods; empty accepts any method
    pub methods: Vec<Method>,
    pub parameters: Vec<Parameter>,
    pub middleware: StageMiddleware,
    pub target: TargetRef,
}

impl RawRoute {
    pub fn new(name: impl Into<String>, template: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            methods: Vec::new(),
            parameters: Vec::new(),
            middleware: StageMiddleware::new(),
            target: TargetRef::new(target),
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Attach a named middleware unit to one stage of this route
    #[must_use]
    pub fn with_middleware(mut self, stage: Stage, name: &str) -> Self {
        self.middleware
            .entry(stage)
            .or_default()
            .push(MiddlewareRef::from(name));
        self
    }
}

/// Compiled HTTP route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub name: String,
    pub template: String,
    pub methods: Vec<Method>,
    pub parameters: Vec<Parameter>,
    pub middleware: StageMiddleware,
    pub target: TargetRef,
    pub compiled: CompiledPath,
}

impl RouteDefinition {
    /// Whether this route serves `method`.
    ///
    /// A route without methods serves everything; `HEAD` is served by any
    /// route that serves `GET`.
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty()
            || self.methods.contains(method)
            || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render a concrete path for this route
    pub fn generate(&self, data: &BTreeMap<String, Value>) -> Result<String, ValidationError> {
        compiler::generate(&self.template, &self.parameters, data)
    }
}

impl Definition for RouteDefinition {
    type Raw = RawRoute;
    type Snapshot = SerializedRoute;
    const KIND: &'static str = "route";

    fn compile(raw: RawRoute) -> Result<Self, CompileError> {
        let compiled = compiler::compile(&raw.template, &raw.parameters)?;
        Ok(Self {
            name: raw.name,
            template: raw.template,
            methods: raw.methods,
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
        // No parameters means no placeholders: the template is the full path
        self.parameters.is_empty().then_some(self.template.as_str())
    }

    fn matcher_source(&self) -> String {
        self.compiled.source().to_string()
    }

    fn encode(&self) -> SerializedRoute {
        encode_route(self)
    }

    fn decode(snapshot: SerializedRoute) -> Result<Self, CacheError> {
        decode_route(snapshot)
    }
}
