//! # Configuration Module
//!
//! Router settings loaded from a YAML file and overridden by environment
//! variables.
//!
//! ## File
//!
//! ```yaml
//! manifest: config/routes.yaml
//! route_cache: var/cache/routes.json
//! command_cache: var/cache/commands.json
//! use_cache: true
//! force_rebuild: false
//! slow_match_threshold_us: 1000
//! ```
//!
//! Every key is optional.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `BRRTR_MANIFEST` | `manifest` |
//! | `BRRTR_ROUTE_CACHE` | `route_cache` |
//! | `BRRTR_COMMAND_CACHE` | `command_cache` |
//! | `BRRTR_USE_CACHE` | `use_cache` (`true`/`false`/`1`/`0`) |
//! | `BRRTR_FORCE_REBUILD` | `force_rebuild` |
//! | `BRRTR_SLOW_MATCH_US` | `slow_match_threshold_us` |
//!
//! Unparseable values are ignored with a warning and the previous value kept.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::definition::Definition;
use crate::registry::SetupOptions;

/// Default for [`RouterConfig::slow_match_threshold_us`]
pub const DEFAULT_SLOW_MATCH_US: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Manifest read by the scanner on a cold setup
    pub manifest: Option<PathBuf>,
    /// Cache file for the route registry
    pub route_cache: Option<PathBuf>,
    /// Cache file for the command registry
    pub command_cache: Option<PathBuf>,
    pub use_cache: bool,
    pub force_rebuild: bool,
    /// Matches slower than this are logged at `warn`
    pub slow_match_threshold_us: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            route_cache: None,
            command_cache: None,
            use_cache: true,
            force_rebuild: false,
            slow_match_threshold_us: DEFAULT_SLOW_MATCH_US,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl RouterConfig {
    /// Load from a YAML file.
    ///
    /// # Errors
    ///
    /// The file cannot be read or is not a valid configuration document.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "Router config loaded");
        Ok(config)
    }

    /// Defaults overridden by the environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `BRRTR_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_lookup(|key| env::var(key).ok());
    }

    /// Override fields from any key lookup.
    pub fn apply_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BRRTR_MANIFEST") {
            self.manifest = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("BRRTR_ROUTE_CACHE") {
            self.route_cache = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("BRRTR_COMMAND_CACHE") {
            self.command_cache = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("BRRTR_USE_CACHE") {
            match parse_bool(&raw) {
                Some(value) => self.use_cache = value,
                None => warn!(variable = "BRRTR_USE_CACHE", value = %raw, "Ignoring invalid boolean"),
            }
        }
        if let Some(raw) = lookup("BRRTR_FORCE_REBUILD") {
            match parse_bool(&raw) {
                Some(value) => self.force_rebuild = value,
                None => warn!(variable = "BRRTR_FORCE_REBUILD", value = %raw, "Ignoring invalid boolean"),
            }
        }
        if let Some(raw) = lookup("BRRTR_SLOW_MATCH_US") {
            match raw.trim().parse() {
                Ok(value) => self.slow_match_threshold_us = value,
                Err(_) => warn!(variable = "BRRTR_SLOW_MATCH_US", value = %raw, "Ignoring invalid number"),
            }
        }
    }

    #[must_use]
    pub fn slow_match_threshold(&self) -> Duration {
        Duration::from_micros(self.slow_match_threshold_us)
    }

    /// Cache file configured for definitions of kind `D`
    #[must_use]
    pub fn cache_path<D: Definition>(&self) -> Option<&Path> {
        match D::KIND {
            "command" => self.command_cache.as_deref(),
            _ => self.route_cache.as_deref(),
        }
    }

    /// [`SetupOptions`] for a registry of kind `D`
    #[must_use]
    pub fn setup_options<D: Definition>(&self) -> SetupOptions {
        SetupOptions {
            force_rebuild: self.force_rebuild,
            use_cache: self.use_cache,
            cache_path: self.cache_path::<D>().map(Path::to_path_buf),
        }
    }
}
