//! Inverse of compilation: render concrete paths and command lines.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use super::core::{bind_placeholders, index_parameters, value_validator};
use super::template::{split_prefix, tokenize, OptionSyntax, Syntax, Token};
use crate::definition::Parameter;
use crate::error::{CompileError, ValidationError};

/// Render a concrete path from a route template.
///
/// Every datum is validated against its parameter's pattern (element by
/// element for arrays) before substitution. An optional placeholder without
/// data disappears together with the literal run it owns; a missing required
/// placeholder falls back to the parameter default or fails. Data keys that
/// name no parameter are appended as a query string.
///
/// # Example
///
/// ```rust
/// use brrtrouter_core::compiler::generate;
/// use brrtrouter_core::definition::Parameter;
/// use serde_json::json;
/// use std::collections::BTreeMap;
///
/// let params = [Parameter::new("a"), Parameter::new("b").optional()];
/// let data = BTreeMap::from([("a".to_string(), json!("x"))]);
/// assert_eq!(generate("/{a}/{b?}", &params, &data).unwrap(), "/x");
/// ```
pub fn generate(
    template: &str,
    parameters: &[Parameter],
    data: &BTreeMap<String, Value>,
) -> Result<String, ValidationError> {
    render(template, parameters, data, Syntax::Route)
}

/// Render a command line from a command template.
///
/// Flags render as `--name` when `true`; value options as `--name=value`;
/// array options repeat `--name=value` per element. An optional argument may
/// only be left out when no later argument is rendered, since positions are
/// how the line is parsed back.
pub fn generate_command(
    template: &str,
    parameters: &[Parameter],
    data: &BTreeMap<String, Value>,
) -> Result<String, ValidationError> {
    render(template, parameters, data, Syntax::Command)
}

fn render(
    template: &str,
    parameters: &[Parameter],
    data: &BTreeMap<String, Value>,
    syntax: Syntax,
) -> Result<String, ValidationError> {
    let tokens = tokenize(template, syntax)?;
    let index = index_parameters(parameters)?;
    bind_placeholders(template, &tokens, &index)?;

    let mut out = String::with_capacity(template.len() + 32);
    let mut pending = "";
    // first optional positional left out of a command line
    let mut skipped: Option<&str> = None;

    for token in &tokens {
        let placeholder = match token {
            Token::Literal(text) => {
                pending = text;
                continue;
            }
            Token::Placeholder(placeholder) => placeholder,
        };
        let param = index[placeholder.name];
        let (kept, prefix) = split_prefix(pending, syntax.separator());
        pending = "";
        out.push_str(kept);

        let optional = placeholder.optional || param.is_optional || placeholder.option.is_some();
        let supplied = data.get(&param.name).filter(|v| !is_absent(v));
        let positional = syntax == Syntax::Command && placeholder.option.is_none();
        let datum = match supplied {
            Some(datum) => datum,
            None if optional => {
                if positional && skipped.is_none() {
                    skipped = Some(param.name.as_str());
                }
                continue;
            }
            None => param
                .default_value
                .as_ref()
                .filter(|v| !is_absent(v))
                .ok_or_else(|| ValidationError::Missing {
                    parameter: param.name.clone(),
                })?,
        };

        if let (true, Some(name)) = (positional, skipped) {
            return Err(ValidationError::Missing {
                parameter: name.to_string(),
            });
        }

        if param.is_repeatable && placeholder.option.is_none() && prefix.is_empty() {
            return Err(CompileError::EmptyDelimiter {
                template: template.to_string(),
                name: param.name.clone(),
            }
            .into());
        }

        let validator = value_validator(param)?;
        match placeholder.option {
            Some(option) => render_option(&mut out, prefix, option, param, &validator, datum)?,
            None => render_value(&mut out, prefix, param, &validator, datum)?,
        }
    }
    out.push_str(pending);

    if syntax == Syntax::Route {
        append_query(&mut out, parameters, data)?;
    }
    Ok(out)
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn render_value(
    out: &mut String,
    prefix: &str,
    param: &Parameter,
    validator: &Regex,
    datum: &Value,
) -> Result<(), ValidationError> {
    match datum {
        Value::Array(items) => {
            if !param.is_repeatable {
                return Err(ValidationError::UnexpectedArray {
                    parameter: param.name.clone(),
                });
            }
            for item in items {
                let rendered = validated_scalar(param, validator, item)?;
                out.push_str(prefix);
                out.push_str(&rendered);
            }
        }
        other => {
            let rendered = validated_scalar(param, validator, other)?;
            out.push_str(prefix);
            out.push_str(&rendered);
        }
    }
    Ok(())
}

fn render_option(
    out: &mut String,
    prefix: &str,
    option: OptionSyntax,
    param: &Parameter,
    validator: &Regex,
    datum: &Value,
) -> Result<(), ValidationError> {
    if !option.takes_value {
        return match datum {
            Value::Bool(true) => {
                out.push_str(prefix);
                out.push_str("--");
                out.push_str(&param.name);
                Ok(())
            }
            Value::Bool(false) => Ok(()),
            other => Err(ValidationError::Unsupported {
                parameter: param.name.clone(),
                value: other.to_string(),
            }),
        };
    }

    let values: Vec<&Value> = match datum {
        Value::Array(items) if param.is_repeatable => items.iter().collect(),
        Value::Array(_) => {
            return Err(ValidationError::UnexpectedArray {
                parameter: param.name.clone(),
            })
        }
        other => vec![other],
    };
    for value in values {
        let rendered = validated_scalar(param, validator, value)?;
        out.push_str(prefix);
        out.push_str("--");
        out.push_str(&param.name);
        out.push('=');
        out.push_str(&rendered);
    }
    Ok(())
}

fn validated_scalar(
    param: &Parameter,
    validator: &Regex,
    value: &Value,
) -> Result<String, ValidationError> {
    let rendered = scalar_to_string(value).ok_or_else(|| ValidationError::Unsupported {
        parameter: param.name.clone(),
        value: value.to_string(),
    })?;
    if !validator.is_match(&rendered) {
        return Err(ValidationError::Mismatch {
            parameter: param.name.clone(),
            value: rendered,
            expected: param.match_pattern.clone(),
        });
    }
    Ok(rendered)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn append_query(
    out: &mut String,
    parameters: &[Parameter],
    data: &BTreeMap<String, Value>,
) -> Result<(), ValidationError> {
    let mut first = true;
    for (key, value) in data {
        if parameters.iter().any(|p| &p.name == key) || value.is_null() {
            continue;
        }
        let values: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for v in values {
            let rendered = scalar_to_string(v).ok_or_else(|| ValidationError::Unsupported {
                parameter: key.clone(),
                value: v.to_string(),
            })?;
            out.push(if first { '?' } else { '&' });
            first = false;
            out.push_str(&urlencoding::encode(key));
            out.push('=');
            out.push_str(&urlencoding::encode(&rendered));
        }
    }
    Ok(())
}
