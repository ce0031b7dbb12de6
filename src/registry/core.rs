use smallvec::SmallVec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::cache::{CacheFile, CacheSnapshot};
use crate::definition::Definition;
use crate::error::{CacheError, ScanError, SetupError};

/// Source of raw definitions for a cold [`Registry::setup`]
///
/// Any `Fn() -> Result<Vec<Raw>, ScanError>` closure is a scanner.
pub trait Scanner<D: Definition> {
    fn scan(&self) -> Result<Vec<D::Raw>, ScanError>;
}

impl<D, F> Scanner<D> for F
where
    D: Definition,
    F: Fn() -> Result<Vec<D::Raw>, ScanError>,
{
    fn scan(&self) -> Result<Vec<D::Raw>, ScanError> {
        self()
    }
}

/// Options for [`Registry::setup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    /// Discard current contents and rescan even when already set up
    pub force_rebuild: bool,
    /// Prefer the cache file when one exists
    pub use_cache: bool,
    pub cache_path: Option<PathBuf>,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            use_cache: true,
            cache_path: None,
        }
    }
}

/// Where the contents of a registry came from after [`Registry::setup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSource {
    /// Decoded from the cache file
    Cache,
    /// Compiled from scanner output
    Scanner,
    /// Setup already ran; nothing changed
    Unchanged,
}

impl SetupSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupSource::Cache => "cache",
            SetupSource::Scanner => "scanner",
            SetupSource::Unchanged => "unchanged",
        }
    }
}

/// Candidate positions for one static key; one per method variant in practice
type Slots = SmallVec<[usize; 2]>;

/// Name-indexed, insertion-ordered store of compiled definitions
///
/// Definitions are held behind `Arc` so a match result can reference one
/// without copying it. Besides the name index the registry keeps two
/// matching indexes: an exact table keyed by [`Definition::static_key`] and
/// the ordered list of every other definition.
#[derive(Debug)]
pub struct Registry<D: Definition> {
    definitions: Vec<Arc<D>>,
    by_name: HashMap<String, usize>,
    static_index: HashMap<String, Slots>,
    dynamic: Vec<usize>,
    initialized: bool,
}

impl<D: Definition> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Definition> Clone for Registry<D> {
    fn clone(&self) -> Self {
        Self {
            definitions: self.definitions.iter().map(Arc::clone).collect(),
            by_name: self.by_name.clone(),
            static_index: self.static_index.clone(),
            dynamic: self.dynamic.clone(),
            initialized: self.initialized,
        }
    }
}

impl<D: Definition> Registry<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            by_name: HashMap::new(),
            static_index: HashMap::new(),
            dynamic: Vec::new(),
            initialized: false,
        }
    }

    /// Build a registry from already compiled definitions, in order.
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = D>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.add(definition);
        }
        registry
    }

    /// Insert or replace a definition by name.
    ///
    /// A replacement takes over the position of the definition it replaces,
    /// so match priority follows the first registration of a name.
    pub fn add(&mut self, definition: D) {
        let definition = Arc::new(definition);
        match self.by_name.get(definition.name()) {
            Some(&position) => {
                debug!(
                    kind = D::KIND,
                    name = %definition.name(),
                    position,
                    "Replacing definition"
                );
                self.definitions[position] = definition;
                self.reindex();
            }
            None => {
                let position = self.definitions.len();
                self.by_name.insert(definition.name().to_string(), position);
                self.index(position, &definition);
                self.definitions.push(definition);
            }
        }
    }

    fn index(&mut self, position: usize, definition: &D) {
        match definition.static_key() {
            Some(key) => self
                .static_index
                .entry(key.to_string())
                .or_default()
                .push(position),
            None => self.dynamic.push(position),
        }
    }

    fn reindex(&mut self) {
        self.static_index.clear();
        self.dynamic.clear();
        let definitions = std::mem::take(&mut self.definitions);
        for (position, definition) in definitions.iter().enumerate() {
            self.index(position, definition);
        }
        self.definitions = definitions;
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<D>> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All definitions in registration order
    #[must_use]
    pub fn all(&self) -> &[Arc<D>] {
        &self.definitions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether [`setup`](Self::setup) has populated this registry
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Definitions whose static key equals `key`, in registration order
    pub fn static_candidates<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a Arc<D>> + 'a {
        self.static_index
            .get(key)
            .into_iter()
            .flat_map(|slots| slots.iter())
            .map(|&i| &self.definitions[i])
    }

    /// Definitions without a static key, in registration order
    pub fn dynamic(&self) -> impl Iterator<Item = &Arc<D>> + '_ {
        self.dynamic.iter().map(|&i| &self.definitions[i])
    }

    /// Encode every definition into a versioned snapshot.
    pub fn to_cache_snapshot(&self) -> Result<CacheSnapshot<D::Snapshot>, CacheError> {
        let entries = self.definitions.iter().map(|d| d.encode()).collect();
        CacheSnapshot::seal(D::KIND, entries)
    }

    /// Decode a snapshot into a new, initialized registry.
    ///
    /// The first bad entry fails the whole load; a registry is never
    /// returned half populated.
    pub fn from_cache_snapshot(snapshot: CacheSnapshot<D::Snapshot>) -> Result<Self, CacheError> {
        snapshot.verify(D::KIND)?;
        let mut registry = Self::new();
        for entry in snapshot.entries {
            let definition = D::decode(entry)?;
            if registry.has(definition.name()) {
                return Err(CacheError::DuplicateEntry {
                    name: definition.name().to_string(),
                });
            }
            registry.add(definition);
        }
        registry.initialized = true;
        Ok(registry)
    }

    /// Populate the registry once, from the cache file or the scanner.
    ///
    /// * already initialized and not `force_rebuild`: no-op;
    /// * `use_cache`, not `force_rebuild`, and the cache file exists: decode it;
    /// * otherwise: scan, compile every raw definition, and add it.
    ///
    /// Contents are swapped in only after every definition loaded, so a
    /// failed setup leaves the previous contents untouched.
    ///
    /// # Errors
    ///
    /// A corrupt cache file is a [`SetupError::Cache`]; the caller decides
    /// whether to retry with `force_rebuild`.
    pub fn setup<S>(&mut self, scanner: &S, options: &SetupOptions) -> Result<SetupSource, SetupError>
    where
        S: Scanner<D> + ?Sized,
    {
        if self.initialized && !options.force_rebuild {
            debug!(kind = D::KIND, "Registry already initialized, skipping setup");
            return Ok(SetupSource::Unchanged);
        }

        let start = Instant::now();
        let cache = options
            .cache_path
            .as_ref()
            .filter(|_| options.use_cache && !options.force_rebuild)
            .map(CacheFile::new);

        let (fresh, source) = match cache {
            Some(file) if file.exists() => (file.read::<D>()?, SetupSource::Cache),
            other => {
                if let Some(file) = other {
                    warn!(
                        kind = D::KIND,
                        path = %file.path().display(),
                        "Cache file not found, falling back to scanner"
                    );
                }
                let raws = scanner.scan()?;
                let mut fresh = Self::new();
                for raw in raws {
                    fresh.add(D::compile(raw)?);
                }
                fresh.initialized = true;
                (fresh, SetupSource::Scanner)
            }
        };

        *self = fresh;
        info!(
            kind = D::KIND,
            source = source.as_str(),
            definitions_count = self.len(),
            static_count = self.len() - self.dynamic.len(),
            dynamic_count = self.dynamic.len(),
            duration_us = start.elapsed().as_micros(),
            "Registry setup complete"
        );
        Ok(source)
    }
}
