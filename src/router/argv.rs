//! CLI-style matching: the leading token selects a command, the rest is
//! parsed against its compiled signature.

use serde_json::Value;
use std::sync::Arc;

use super::cast::{cast_value, cast_values};
use super::core::{MatchOutcome, MatchResult, NoMatch, ParamVec, Routable};
use crate::compiler::{CompiledCommand, OptionMode, OptionSpec};
use crate::definition::{CommandDefinition, Parameter, Stage};
use crate::error::{ArgumentError, DispatchError};
use crate::registry::Registry;

/// A command line as seen by the matcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInput {
    /// Tokens after the program name; the first one is the command
    pub argv: Vec<String>,
}

impl CommandInput {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace. No quoting support.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl Routable for CommandDefinition {
    type Input = CommandInput;

    const FINAL_STAGE: Stage = Stage::Exited;

    fn describe(input: &CommandInput) -> String {
        input.argv.join(" ")
    }

    fn match_input(
        registry: &Registry<Self>,
        input: &CommandInput,
    ) -> Result<MatchOutcome<Self>, DispatchError> {
        let Some(command) = input
            .command()
            .and_then(|name| registry.static_candidates(name).next())
        else {
            return Ok(MatchOutcome::NotMatched(NoMatch::default()));
        };

        let (params, options) = parse_arguments(command, &input.argv[1..])?;
        Ok(MatchOutcome::Matched(MatchResult {
            definition: Arc::clone(command),
            params,
            options,
        }))
    }
}

/// Raw option occurrences collected while scanning tokens
struct Collected<'a> {
    spec: &'a OptionSpec,
    values: Vec<&'a str>,
    present: bool,
}

/// Whether `token` is a declared option (or `--`) rather than a value
fn names_option(signature: &CompiledCommand, token: &str) -> bool {
    if token == "--" {
        return true;
    }
    if let Some(body) = token.strip_prefix("--") {
        let name = body.split_once('=').map_or(body, |(name, _)| name);
        return signature.option(name).is_some();
    }
    token
        .strip_prefix('-')
        .and_then(|body| body.chars().next())
        .is_some_and(|short| signature.short_option(short).is_some())
}

/// Parse tokens following the command name into cast positional arguments
/// and options.
///
/// Accepted forms: `--flag`, `--name=value`, `--name value`, `-s`, `-s value`,
/// `-svalue`, and `--` to end option parsing. Every declared argument and
/// option is present in the result: absent ones take the parameter default,
/// `false` for flags, `[]` for repeatable ones, otherwise `null`.
///
/// # Errors
///
/// [`ArgumentError`] when tokens do not fit the signature, a
/// [`ParameterCastError`](crate::error::ParameterCastError) when a value does
/// not cast.
pub fn parse_arguments(
    command: &CommandDefinition,
    tokens: &[String],
) -> Result<(ParamVec, ParamVec), DispatchError> {
    let signature = &command.compiled;
    let mut collected: Vec<Collected<'_>> = signature
        .options
        .iter()
        .map(|spec| Collected {
            spec,
            values: Vec::new(),
            present: false,
        })
        .collect();
    let mut positional: Vec<&str> = Vec::new();
    let mut options_done = false;

    let mut iter = tokens.iter().map(String::as_str).peekable();
    while let Some(token) = iter.next() {
        if options_done {
            positional.push(token);
            continue;
        }
        if token == "--" {
            options_done = true;
            continue;
        }

        let (index, inline) = if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let index = collected
                .iter()
                .position(|c| c.spec.name.as_ref() == name)
                .ok_or_else(|| ArgumentError::UnknownOption {
                    option: format!("--{name}"),
                })?;
            (index, inline)
        } else if let Some(body) = token.strip_prefix('-').filter(|b| !b.is_empty()) {
            let mut chars = body.chars();
            let short = chars.next().unwrap_or_default();
            match collected.iter().position(|c| c.spec.short == Some(short)) {
                Some(index) => {
                    let rest = chars.as_str();
                    let rest = rest.strip_prefix('=').unwrap_or(rest);
                    (index, (!rest.is_empty()).then_some(rest))
                }
                // `-5` and friends are values, not options
                None if body.parse::<f64>().is_ok() => {
                    positional.push(token);
                    continue;
                }
                None => {
                    return Err(ArgumentError::UnknownOption {
                        option: format!("-{short}"),
                    }
                    .into())
                }
            }
        } else {
            positional.push(token);
            continue;
        };

        let slot = &mut collected[index];
        slot.present = true;
        match slot.spec.mode {
            OptionMode::Flag => {
                if inline.is_some() {
                    return Err(ArgumentError::UnexpectedOptionValue {
                        name: slot.spec.name.to_string(),
                    }
                    .into());
                }
            }
            OptionMode::Value | OptionMode::Array => {
                let value = match inline {
                    Some(value) => value,
                    None => iter
                        .next_if(|next| !names_option(signature, next))
                        .ok_or_else(|| ArgumentError::MissingOptionValue {
                            name: slot.spec.name.to_string(),
                        })?,
                };
                if slot.spec.mode == OptionMode::Value {
                    slot.values.clear();
                }
                slot.values.push(value);
            }
        }
    }

    let params = bind_positional(command, &positional)?;
    let mut options = ParamVec::new();
    for slot in collected {
        let Some(param) = command.parameter(&slot.spec.name) else {
            continue;
        };
        for value in &slot.values {
            validate(&slot.spec.name, param, &slot.spec.validator, value)?;
        }
        let value = match slot.spec.mode {
            OptionMode::Flag => Value::Bool(slot.present),
            OptionMode::Array if slot.present => cast_values(param, slot.values.iter().copied())?,
            OptionMode::Value if slot.present => match slot.values.last() {
                Some(raw) => cast_value(param, raw)?,
                None => absent(param),
            },
            _ => absent(param),
        };
        options.push((Arc::clone(&slot.spec.name), value));
    }
    Ok((params, options))
}

fn bind_positional(command: &CommandDefinition, positional: &[&str]) -> Result<ParamVec, DispatchError> {
    let mut params = ParamVec::new();
    let mut rest = positional;

    for spec in &command.compiled.arguments {
        let Some(param) = command.parameter(&spec.name) else {
            continue;
        };
        let taken: &[&str] = if spec.repeatable {
            std::mem::take(&mut rest)
        } else {
            match rest.split_first() {
                Some((first, tail)) => {
                    rest = tail;
                    std::slice::from_ref(first)
                }
                None => &[],
            }
        };

        if taken.is_empty() {
            if !spec.optional {
                return Err(ArgumentError::MissingArgument {
                    name: spec.name.to_string(),
                }
                .into());
            }
            params.push((Arc::clone(&spec.name), absent(param)));
            continue;
        }

        for value in taken {
            validate(&spec.name, param, &spec.validator, value)?;
        }
        let value = if spec.repeatable {
            cast_values(param, taken.iter().copied())?
        } else {
            cast_value(param, taken[0])?
        };
        params.push((Arc::clone(&spec.name), value));
    }

    if let Some(extra) = rest.first() {
        return Err(ArgumentError::TooManyArguments {
            token: (*extra).to_string(),
        }
        .into());
    }
    Ok(params)
}

fn validate(
    name: &str,
    param: &Parameter,
    validator: &regex::Regex,
    value: &str,
) -> Result<(), ArgumentError> {
    if validator.is_match(value) {
        Ok(())
    } else {
        Err(ArgumentError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: param.match_pattern.clone(),
        })
    }
}

fn absent(param: &Parameter) -> Value {
    match &param.default_value {
        Some(default) => default.clone(),
        None if param.is_repeatable => Value::Array(Vec::new()),
        None => Value::Null,
    }
}
