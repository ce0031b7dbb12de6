//! Command signature compilation.
//!
//! A command template names the command with its leading word and declares
//! positional arguments and `--` options as placeholders:
//!
//! ```text
//! deploy {env} {region?} {--d|dry-run} {--tag=}
//! ```

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::core::{bind_placeholders, check_repeatable_trailing, index_parameters, value_validator};
use super::template::{split_prefix, tokenize, Syntax, Token};
use crate::definition::Parameter;
use crate::error::CompileError;

/// How an option consumes values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMode {
    /// `--dry-run`, no value, `true` when present
    Flag,
    /// `--tag=v1`, a single value
    Value,
    /// `--tag=v1 --tag=v2`, collected into an array
    Array,
}

impl OptionMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionMode::Flag => "flag",
            OptionMode::Value => "value",
            OptionMode::Array => "array",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flag" => Some(OptionMode::Flag),
            "value" => Some(OptionMode::Value),
            "array" => Some(OptionMode::Array),
            _ => None,
        }
    }
}

/// Positional argument of a command signature
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: Arc<str>,
    pub optional: bool,
    /// Collects every remaining positional token
    pub repeatable: bool,
    pub validator: Regex,
}

/// `--name` option of a command signature
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: Arc<str>,
    pub short: Option<char>,
    pub mode: OptionMode,
    pub validator: Regex,
}

impl PartialEq for ArgumentSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.optional == other.optional
            && self.repeatable == other.repeatable
            && self.validator.as_str() == other.validator.as_str()
    }
}

impl PartialEq for OptionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.short == other.short
            && self.mode == other.mode
            && self.validator.as_str() == other.validator.as_str()
    }
}

/// Compiled form of a command template
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCommand {
    /// Leading token the input must start with
    pub command: String,
    pub arguments: Vec<ArgumentSpec>,
    pub options: Vec<OptionSpec>,
}

impl CompiledCommand {
    /// Canonical signature text, e.g. `deploy <env> [--d|dry-run]`
    #[must_use]
    pub fn signature(&self) -> String {
        let mut out = self.command.clone();
        for arg in &self.arguments {
            out.push(' ');
            out.push(if arg.optional { '[' } else { '<' });
            out.push_str(&arg.name);
            if arg.repeatable {
                out.push_str("...");
            }
            out.push(':');
            out.push_str(arg.validator.as_str());
            out.push(if arg.optional { ']' } else { '>' });
        }
        for opt in &self.options {
            out.push_str(" [--");
            if let Some(short) = opt.short {
                out.push(short);
                out.push('|');
            }
            out.push_str(&opt.name);
            match opt.mode {
                OptionMode::Flag => {}
                OptionMode::Value => out.push('='),
                OptionMode::Array => out.push_str("=*"),
            }
            out.push(']');
        }
        out
    }

    /// Find an option by long name
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name.as_ref() == name)
    }

    /// Find an option by short name
    #[must_use]
    pub fn short_option(&self, short: char) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.short == Some(short))
    }
}

/// Compile a command template into its signature.
///
/// # Errors
///
/// Besides the checks shared with [`compile`](super::compile), fails when the
/// template does not open with a command name, carries literal text other than
/// whitespace between placeholders, declares a required argument after an
/// optional one, or marks a flag repeatable.
///
/// # Example
///
/// ```rust
/// use brrtrouter_core::compiler::compile_command;
/// use brrtrouter_core::definition::Parameter;
///
/// let compiled = compile_command(
///     "deploy {env} {--dry-run}",
///     &[Parameter::argument("env"), Parameter::argument("dry-run")],
/// )
/// .unwrap();
/// assert_eq!(compiled.command, "deploy");
/// assert_eq!(compiled.arguments.len(), 1);
/// assert_eq!(compiled.options.len(), 1);
/// ```
pub fn compile_command(
    template: &str,
    parameters: &[Parameter],
) -> Result<CompiledCommand, CompileError> {
    let tokens = tokenize(template, Syntax::Command)?;

    let command = match tokens.first() {
        Some(Token::Literal(head)) => {
            let mut words = head.split_whitespace();
            let command = words.next().ok_or_else(|| CompileError::MissingCommandName {
                template: template.to_string(),
            })?;
            if let Some(extra) = words.next() {
                return Err(CompileError::UnexpectedLiteral {
                    template: template.to_string(),
                    literal: extra.to_string(),
                });
            }
            command.to_string()
        }
        _ => {
            return Err(CompileError::MissingCommandName {
                template: template.to_string(),
            })
        }
    };

    if let Some(literal) = tokens.iter().skip(1).find_map(|t| match t {
        Token::Literal(text) if !text.trim().is_empty() => Some(text.trim()),
        _ => None,
    }) {
        return Err(CompileError::UnexpectedLiteral {
            template: template.to_string(),
            literal: literal.to_string(),
        });
    }

    let index = index_parameters(parameters)?;
    let bound = bind_placeholders(template, &tokens, &index)?;
    check_repeatable_trailing(template, &bound)?;

    let mut arguments: Vec<ArgumentSpec> = Vec::new();
    let mut options = Vec::new();
    let mut pending = "";

    for token in &tokens {
        let placeholder = match token {
            Token::Literal(text) => {
                pending = text;
                continue;
            }
            Token::Placeholder(placeholder) => placeholder,
        };
        let param = index[placeholder.name];
        let (_, prefix) = split_prefix(pending, Syntax::Command.separator());
        pending = "";
        let validator = value_validator(param)?;

        match placeholder.option {
            Some(option) => {
                let mode = match (option.takes_value, param.is_repeatable) {
                    (false, true) => {
                        return Err(CompileError::RepeatableFlag {
                            template: template.to_string(),
                            name: param.name.clone(),
                        })
                    }
                    (false, false) => OptionMode::Flag,
                    (true, false) => OptionMode::Value,
                    (true, true) => OptionMode::Array,
                };
                options.push(OptionSpec {
                    name: Arc::from(param.name.as_str()),
                    short: option.short,
                    mode,
                    validator,
                });
            }
            None => {
                let optional = placeholder.optional || param.is_optional;
                if !optional && arguments.iter().any(|a| a.optional) {
                    return Err(CompileError::RequiredAfterOptional {
                        template: template.to_string(),
                        name: param.name.clone(),
                    });
                }
                if param.is_repeatable && prefix.is_empty() {
                    return Err(CompileError::EmptyDelimiter {
                        template: template.to_string(),
                        name: param.name.clone(),
                    });
                }
                arguments.push(ArgumentSpec {
                    name: Arc::from(param.name.as_str()),
                    optional,
                    repeatable: param.is_repeatable,
                    validator,
                });
            }
        }
    }

    let compiled = CompiledCommand {
        command,
        arguments,
        options,
    };
    debug!(
        template = %template,
        signature = %compiled.signature(),
        "Compiled command template"
    );
    Ok(compiled)
}
