//! # Registry Module
//!
//! Name-indexed, insertion-ordered storage for compiled definitions, with a
//! versioned cache snapshot for warm starts.
//!
//! ## Lifecycle
//!
//! A registry is created empty and populated exactly once through
//! [`Registry::setup`], either by decoding a cache file or by running a
//! [`Scanner`] and compiling what it returns. After setup it is shared
//! read-only (usually behind an `Arc`) with every dispatcher.
//!
//! ```rust
//! use brrtrouter_core::definition::{RawRoute, RouteDefinition};
//! use brrtrouter_core::error::ScanError;
//! use brrtrouter_core::registry::{Registry, SetupOptions, SetupSource};
//!
//! let scanner = || -> Result<Vec<RawRoute>, ScanError> {
//!     Ok(vec![RawRoute::new("home", "/", "HomeController")])
//! };
//! let mut registry: Registry<RouteDefinition> = Registry::new();
//! let source = registry.setup(&scanner, &SetupOptions::default()).unwrap();
//! assert_eq!(source, SetupSource::Scanner);
//! assert!(registry.has("home"));
//! ```

pub mod cache;
mod core;

pub use cache::{CacheFile, CacheSnapshot, CACHE_SCHEMA_VERSION, ENTRY_SCHEMA_VERSION};
pub use core::{Registry, Scanner, SetupOptions, SetupSource};
