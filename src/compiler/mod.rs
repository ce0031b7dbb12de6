//! # Compiler Module
//!
//! Turns declarative templates into matchers and back into concrete paths.
//!
//! ## Template syntax
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `literal` | matched verbatim (escaped for the regex engine) |
//! | `{name}` | required placeholder |
//! | `{name?}` | optional placeholder |
//! | `{--flag}` | command flag option |
//! | `{--s\|name=}` | command value option with short name `-s` |
//!
//! Repetition is not template syntax: a placeholder whose [`Parameter`] is
//! `is_repeatable` accepts one or more values joined by the literal run in
//! front of it (`/files/{path}` joins with `/`).
//!
//! ## Compilation
//!
//! Compilation happens once, at registry setup. A route template becomes an
//! anchored regex with one named group per capturing parameter:
//!
//! ```text
//! /users/{id}/{tab?}   id = \d+
//! ^/users/(?P<p0>(?:\d+))(?:/(?P<p1>(?:[^/]+)))?$
//! ```
//!
//! A command template becomes a [`CompiledCommand`] signature that the argv
//! parser in [`router`](crate::router) walks.
//!
//! [`Parameter`]: crate::definition::Parameter

mod command;
mod core;
mod generate;
mod template;

pub use command::{compile_command, ArgumentSpec, CompiledCommand, OptionMode, OptionSpec};
pub use core::{compile, CaptureSlot, CompiledPath};
pub(crate) use core::index_parameters;
pub(crate) use template::{placeholder_names, Syntax};
pub use generate::{generate, generate_command};
