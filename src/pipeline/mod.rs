//! # Pipeline Module
//!
//! Named, ordered stages of middleware, executed as nested chains of
//! responsibility.
//!
//! ## Stages
//!
//! ```text
//! received ──▶ (match) ──┬──▶ matched ──▶ (invoke target) ──▶ dispatched
//!                        └──▶ not-matched
//!
//! throwable-caught   reachable from any stage on error
//! sending / exited   run by the outermost caller over the final output
//! ```
//!
//! Each stage's core action is the next transition: the `received` core
//! attempts the match and runs `matched` or `not-matched`; the `matched`
//! core invokes the dispatch target and runs `dispatched` over the
//! provisional output. Because stages nest, a unit that returns without
//! calling `next` ends its own stage and every stage after it, and its
//! output travels back up unchanged.
//!
//! ## Ordering
//!
//! Within a stage, global units registered on the [`Pipeline`] run first,
//! followed by the units the matched definition references for that stage.

mod core;

#[cfg(test)]
mod tests;

pub use core::{run_stage, Pipeline, StageChain};
