//! Template → matcher compilation.
//!
//! # JSF Compliance (Rule 206)
//!
//! Compilation runs once per definition at setup; the produced [`CompiledPath`]
//! is what the hot path touches, so parameter names are interned as `Arc<str>`
//! to make per-request extraction a refcount bump instead of a copy.

#![deny(clippy::format_push_string)]

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::template::{split_prefix, tokenize, Placeholder, Syntax, Token};
use crate::definition::Parameter;
use crate::error::CompileError;

/// One named capture group of a compiled route matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSlot {
    /// Parameter name the capture belongs to
    pub name: Arc<str>,
    /// Regex group name (`p0`, `p1`, ...)
    pub group: String,
    /// Join deliminator for a repeatable capture
    pub delimiter: Option<String>,
}

/// Matcher derived from a route template and its parameters
///
/// Two compilations of the same `(template, parameters)` pair produce the same
/// [`source`](CompiledPath::source) and capture slots, which is what equality
/// compares.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    /// Anchored regex accepting the full path
    pub matcher: Regex,
    /// Capture slots in template order
    pub captures: Vec<CaptureSlot>,
}

impl CompiledPath {
    /// Regex source of the matcher
    #[must_use]
    pub fn source(&self) -> &str {
        self.matcher.as_str()
    }

    /// Names of the captured parameters in template order
    #[must_use]
    pub fn capture_order(&self) -> Vec<&str> {
        self.captures.iter().map(|c| c.name.as_ref()).collect()
    }
}

impl PartialEq for CompiledPath {
    fn eq(&self, other: &Self) -> bool {
        self.source() == other.source() && self.captures == other.captures
    }
}

impl Eq for CompiledPath {}

/// Compile a route template into an anchored matcher.
///
/// * literal runs are escaped and matched verbatim;
/// * a placeholder becomes `(?P<pN>pattern)` when capturing, `(?:pattern)` otherwise;
/// * an optional placeholder is wrapped together with the literal run it owns
///   (from the last `/` before it) in `(?:...)?`;
/// * a repeatable placeholder accepts `pattern(?:delim pattern)*` where `delim`
///   is that same owned literal run.
///
/// # Errors
///
/// [`CompileError`] when a placeholder is undeclared, a parameter is unreferenced,
/// a repeatable parameter is not trailing or has no deliminator, or a pattern is
/// empty or invalid.
///
/// # Example
///
/// ```rust
/// use brrtrouter_core::compiler::compile;
/// use brrtrouter_core::definition::Parameter;
///
/// let compiled = compile("/users/{id}", &[Parameter::new("id").pattern(r"\d+")]).unwrap();
/// assert!(compiled.matcher.is_match("/users/42"));
/// assert!(!compiled.matcher.is_match("/users/abc"));
/// ```
pub fn compile(template: &str, parameters: &[Parameter]) -> Result<CompiledPath, CompileError> {
    let tokens = tokenize(template, Syntax::Route)?;
    let index = index_parameters(parameters)?;
    let bound = bind_placeholders(template, &tokens, &index)?;
    check_repeatable_trailing(template, &bound)?;

    let mut source = String::with_capacity(template.len() * 2 + 16);
    source.push('^');
    let mut captures: Vec<CaptureSlot> = Vec::with_capacity(bound.len());
    let mut pending = "";

    for token in &tokens {
        match token {
            Token::Literal(text) => pending = text,
            Token::Placeholder(placeholder) => {
                let param = index[placeholder.name];
                let (kept, prefix) = split_prefix(pending, Syntax::Route.separator());
                pending = "";
                source.push_str(&regex::escape(kept));

                let mut inner = String::with_capacity(param.match_pattern.len() * 2 + 16);
                inner.push_str("(?:");
                inner.push_str(&param.match_pattern);
                inner.push(')');
                if param.is_repeatable {
                    if prefix.is_empty() {
                        return Err(CompileError::EmptyDelimiter {
                            template: template.to_string(),
                            name: param.name.clone(),
                        });
                    }
                    inner.push_str("(?:");
                    inner.push_str(&regex::escape(prefix));
                    inner.push_str("(?:");
                    inner.push_str(&param.match_pattern);
                    inner.push_str("))*");
                }

                let optional = placeholder.optional || param.is_optional;
                if optional {
                    source.push_str("(?:");
                }
                source.push_str(&regex::escape(prefix));
                if param.should_capture {
                    let group = format!("p{}", captures.len());
                    source.push_str("(?P<");
                    source.push_str(&group);
                    source.push('>');
                    source.push_str(&inner);
                    source.push(')');
                    captures.push(CaptureSlot {
                        name: Arc::from(param.name.as_str()),
                        group,
                        delimiter: param.is_repeatable.then(|| prefix.to_string()),
                    });
                } else {
                    source.push_str("(?:");
                    source.push_str(&inner);
                    source.push(')');
                }
                if optional {
                    source.push_str(")?");
                }
            }
        }
    }

    source.push_str(&regex::escape(pending));
    source.push('$');

    let matcher = Regex::new(&source).map_err(|e| CompileError::Matcher {
        template: template.to_string(),
        reason: e.to_string(),
    })?;

    debug!(
        template = %template,
        matcher = %source,
        captures = captures.len(),
        "Compiled route template"
    );

    Ok(CompiledPath { matcher, captures })
}

/// Name → parameter index with duplicate and pattern checks applied
pub(crate) type ParameterIndex<'p> = HashMap<&'p str, &'p Parameter>;

pub(crate) fn index_parameters(parameters: &[Parameter]) -> Result<ParameterIndex<'_>, CompileError> {
    let mut index = HashMap::with_capacity(parameters.len());
    for param in parameters {
        value_validator(param)?;
        if index.insert(param.name.as_str(), param).is_some() {
            return Err(CompileError::DuplicateParameter {
                name: param.name.clone(),
            });
        }
    }
    Ok(index)
}

/// Anchored regex a single value of `param` must fully match
pub(crate) fn value_validator(param: &Parameter) -> Result<Regex, CompileError> {
    if param.match_pattern.is_empty() {
        return Err(CompileError::EmptyPattern {
            name: param.name.clone(),
        });
    }
    Regex::new(&format!("^(?:{})$", param.match_pattern)).map_err(|e| {
        CompileError::InvalidPattern {
            name: param.name.clone(),
            pattern: param.match_pattern.clone(),
            reason: e.to_string(),
        }
    })
}

/// Pair every placeholder with its parameter, enforcing the one-to-one rule.
pub(crate) fn bind_placeholders<'t, 'p>(
    template: &str,
    tokens: &'t [Token<'t>],
    index: &ParameterIndex<'p>,
) -> Result<Vec<(&'t Placeholder<'t>, &'p Parameter)>, CompileError> {
    let mut seen = HashSet::with_capacity(index.len());
    let mut bound = Vec::with_capacity(index.len());

    for token in tokens {
        let Token::Placeholder(placeholder) = token else {
            continue;
        };
        let param = index.get(placeholder.name).ok_or_else(|| {
            CompileError::UndeclaredPlaceholder {
                template: template.to_string(),
                name: placeholder.name.to_string(),
            }
        })?;
        if !seen.insert(placeholder.name) {
            return Err(CompileError::DuplicatePlaceholder {
                template: template.to_string(),
                name: placeholder.name.to_string(),
            });
        }
        bound.push((placeholder, *param));
    }

    // Lowest name first so the reported parameter is stable across runs
    if let Some(unused) = index
        .values()
        .filter(|p| !seen.contains(p.name.as_str()))
        .min_by_key(|p| p.name.as_str())
    {
        return Err(CompileError::UnreferencedParameter {
            template: template.to_string(),
            name: unused.name.clone(),
        });
    }

    Ok(bound)
}

/// Only the last positional placeholder may be repeatable.
pub(crate) fn check_repeatable_trailing(
    template: &str,
    bound: &[(&Placeholder<'_>, &Parameter)],
) -> Result<(), CompileError> {
    let positional: Vec<_> = bound.iter().filter(|(ph, _)| ph.option.is_none()).collect();
    let last = positional.len().saturating_sub(1);
    for (i, (_, param)) in positional.iter().enumerate() {
        if param.is_repeatable && i != last {
            return Err(CompileError::RepeatableNotTrailing {
                template: template.to_string(),
                name: param.name.clone(),
            });
        }
    }
    Ok(())
}
