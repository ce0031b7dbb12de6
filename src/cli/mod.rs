//! # CLI Module
//!
//! Command-line front end over the registry, router and dispatcher.
//!
//! ## Commands
//!
//! | Command | Does |
//! |---|---|
//! | `routes` | list compiled routes |
//! | `commands` | list compiled commands |
//! | `build-cache` | compile the manifest and write both cache files |
//! | `match <METHOD> <URI>` | match without dispatching |
//! | `generate <NAME> [key=value]...` | render a path (or `--command` line) |
//! | `request <METHOD> <URI>` | dispatch an HTTP request with echo handlers |
//! | `run -- <ARGV>...` | dispatch a command line with echo handlers |
//!
//! Registries come from the cache files when present, otherwise from the
//! manifest. A cache file that fails verification is logged and rebuilt
//! from the manifest instead of aborting.
//!
//! `run` and `request` exit with [`Output::exit_code`](crate::dispatcher::Output::exit_code):
//! `0` on success, `2` for input the router rejected, `1` otherwise.
//!
//! ## Examples
//!
//! ```bash
//! brrtrouter-core --manifest config/routes.yaml routes
//! brrtrouter-core --manifest config/routes.yaml match GET /users/42
//! brrtrouter-core --manifest config/routes.yaml generate users.show id=42
//! brrtrouter-core --manifest config/routes.yaml run -- deploy staging --dry-run
//! ```

mod commands;


pub use commands::{load_registry, run_cli, Cli, Commands, LogFormatArg};
