//! Template tokenizer shared by route and command syntax.

use crate::error::CompileError;

/// Which placeholder dialect a template is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Syntax {
    /// `/users/{id}/{page?}`
    Route,
    /// `deploy {env} {--d|dry-run} {--tag=}`
    Command,
}

impl Syntax {
    /// Character that starts a new segment; an optional or repeatable
    /// placeholder owns the literal run from the last separator onwards.
    pub(crate) fn separator(self) -> char {
        match self {
            Syntax::Route => '/',
            Syntax::Command => ' ',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Literal(&'a str),
    Placeholder(Placeholder<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder<'a> {
    pub name: &'a str,
    /// Template-level `?` marker
    pub optional: bool,
    /// Set for command `{--...}` placeholders
    pub option: Option<OptionSyntax>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OptionSyntax {
    pub short: Option<char>,
    pub takes_value: bool,
}

/// Split a template into literal runs and placeholders.
///
/// Literal runs never contain `{` or `}`; an unbalanced brace or an invalid
/// placeholder body is a [`CompileError::MalformedPlaceholder`].
pub(crate) fn tokenize(template: &str, syntax: Syntax) -> Result<Vec<Token<'_>>, CompileError> {
    let malformed = |offset: usize| CompileError::MalformedPlaceholder {
        template: template.to_string(),
        offset,
    };

    let mut tokens = Vec::with_capacity(template.matches('{').count() * 2 + 1);
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(malformed(offset + open));
        }
        if open > 0 {
            tokens.push(Token::Literal(&rest[..open]));
        }

        let after = &rest[open + 1..];
        let close = match after.find(['{', '}']) {
            Some(i) if after.as_bytes()[i] == b'}' => i,
            _ => return Err(malformed(offset + open)),
        };

        let placeholder =
            parse_placeholder(&after[..close], syntax).ok_or_else(|| malformed(offset + open))?;
        tokens.push(Token::Placeholder(placeholder));

        let consumed = open + 1 + close + 1;
        rest = &rest[consumed..];
        offset += consumed;
    }

    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }
    Ok(tokens)
}

fn parse_placeholder(body: &str, syntax: Syntax) -> Option<Placeholder<'_>> {
    let body = body.trim();

    if syntax == Syntax::Command {
        if let Some(spec) = body.strip_prefix("--") {
            let (spec, takes_value) = match spec.strip_suffix('=') {
                Some(spec) => (spec, true),
                None => (spec, false),
            };
            let (short, name) = match spec.split_once('|') {
                Some((short, name)) => {
                    let mut chars = short.chars();
                    let c = chars.next()?;
                    if chars.next().is_some() || !c.is_ascii_alphanumeric() {
                        return None;
                    }
                    (Some(c), name)
                }
                None => (None, spec),
            };
            if !is_valid_name(name) {
                return None;
            }
            return Some(Placeholder {
                name,
                optional: true,
                option: Some(OptionSyntax { short, takes_value }),
            });
        }
    }

    let (name, optional) = match body.strip_suffix('?') {
        Some(name) => (name, true),
        None => (body, false),
    };
    if !is_valid_name(name) {
        return None;
    }
    Some(Placeholder {
        name,
        optional,
        option: None,
    })
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Split the literal run in front of a placeholder into the part that stays
/// unconditionally and the prefix owned by the placeholder.
///
/// `"/users/"` → `("/users", "/")`, `"."` → `("", ".")`.
pub(crate) fn split_prefix(literal: &str, separator: char) -> (&str, &str) {
    match literal.rfind(separator) {
        Some(i) => literal.split_at(i),
        None => ("", literal),
    }
}

/// Placeholder names of a template in order of appearance, with whether
/// each is a command option.
pub(crate) fn placeholder_names(
    template: &str,
    syntax: Syntax,
) -> Result<Vec<(&str, bool)>, CompileError> {
    Ok(tokenize(template, syntax)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Placeholder(p) => Some((p.name, p.option.is_some())),
            Token::Literal(_) => None,
        })
        .collect())
}
