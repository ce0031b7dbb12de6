//! HTTP-style matching of method + path against route definitions.

use http::Method;
use regex::Captures;
use std::sync::Arc;

use super::cast::{cast_value, cast_values};
use super::core::{MatchOutcome, MatchResult, NoMatch, ParamVec, Routable};
use crate::definition::{RouteDefinition, Stage};
use crate::error::{DispatchError, ParameterCastError};
use crate::registry::Registry;

/// An HTTP request as seen by the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpInput {
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Decoded query pairs in request order
    pub query: Vec<(String, String)>,
}

impl HttpInput {
    /// Split `uri` into path and query; query pairs are percent-decoded.
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, Vec::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
        }
    }

    /// Last value of a query parameter
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

impl Routable for RouteDefinition {
    type Input = HttpInput;

    const FINAL_STAGE: Stage = Stage::Sending;

    fn describe(input: &HttpInput) -> String {
        format!("{} {}", input.method, input.path)
    }

    fn match_input(
        registry: &Registry<Self>,
        input: &HttpInput,
    ) -> Result<MatchOutcome<Self>, DispatchError> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in registry.static_candidates(&input.path) {
            if route.accepts(&input.method) {
                return Ok(MatchOutcome::Matched(MatchResult::new(
                    Arc::clone(route),
                    ParamVec::new(),
                )));
            }
            allowed.extend(route.methods.iter().cloned());
        }

        for route in registry.dynamic() {
            let Some(captures) = route.compiled.matcher.captures(&input.path) else {
                continue;
            };
            if !route.accepts(&input.method) {
                allowed.extend(route.methods.iter().cloned());
                continue;
            }
            let params = extract(route, &captures)?;
            return Ok(MatchOutcome::Matched(MatchResult::new(
                Arc::clone(route),
                params,
            )));
        }

        let mut seen = Vec::with_capacity(allowed.len());
        for method in allowed {
            if !seen.contains(&method) {
                seen.push(method);
            }
        }
        Ok(MatchOutcome::NotMatched(NoMatch { allowed: seen }))
    }
}

/// Cast every capture slot of a matched route, filling defaults for absent
/// optional captures.
fn extract(route: &RouteDefinition, captures: &Captures<'_>) -> Result<ParamVec, ParameterCastError> {
    let mut params = ParamVec::new();
    for slot in &route.compiled.captures {
        let Some(param) = route.parameter(&slot.name) else {
            continue;
        };
        match (captures.name(&slot.group), &slot.delimiter) {
            (Some(raw), Some(delimiter)) => {
                let value = cast_values(param, raw.as_str().split(delimiter.as_str()))?;
                params.push((Arc::clone(&slot.name), value));
            }
            (Some(raw), None) => {
                params.push((Arc::clone(&slot.name), cast_value(param, raw.as_str())?));
            }
            (None, _) => {
                if let Some(default) = &param.default_value {
                    params.push((Arc::clone(&slot.name), default.clone()));
                }
            }
        }
    }
    Ok(params)
}
