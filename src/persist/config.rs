use crate::core::{PersistError, Result};
use crate::storage::StorageHandle;
use serde::{Deserialize, Serialize};

// ============================================================================
// Flush policy
// ============================================================================

/// When a write job actually reaches the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Written synchronously, before the write call returns.
    #[default]
    #[serde(alias = "sync")]
    Immediate,
    /// Queued and written once at the next microtask drain.
    #[serde(alias = "async")]
    DeferredMicrotask,
    /// Queued and written once when the host signals it is about to terminate.
    #[serde(alias = "lazy")]
    DeferredUntilUnload,
}

// ============================================================================
// Paths
// ============================================================================

/// Top-level state fields to persist. Accepts one name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PathsRepr", into = "Vec<String>")]
pub struct Paths(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum PathsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<PathsRepr> for Paths {
    fn from(repr: PathsRepr) -> Self {
        match repr {
            PathsRepr::One(field) => Self(vec![field]),
            PathsRepr::Many(fields) => Self(fields),
        }
    }
}

impl From<Paths> for Vec<String> {
    fn from(paths: Paths) -> Self {
        paths.0
    }
}

impl Paths {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Paths {
    fn from(field: &str) -> Self {
        Self(vec![field.to_string()])
    }
}

impl From<String> for Paths {
    fn from(field: String) -> Self {
        Self(vec![field])
    }
}

impl From<Vec<String>> for Paths {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl From<Vec<&str>> for Paths {
    fn from(fields: Vec<&str>) -> Self {
        Self(fields.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Paths {
    fn from(fields: [&str; N]) -> Self {
        Self(fields.iter().map(|f| f.to_string()).collect())
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// One persistence rule for a store.
///
/// Every field is optional; defaults are resolved when the strategy is used
/// (see [`Strategy::resolve`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Strategy {
    /// Storage key. Defaults to the store id.
    pub key: Option<String>,

    /// Backend to write to. Defaults to the session storage.
    #[serde(skip)]
    pub storage: Option<StorageHandle>,

    /// Fields to persist. Defaults to the whole state.
    pub paths: Option<Paths>,

    /// Defaults to [`FlushPolicy::Immediate`].
    pub flush: Option<FlushPolicy>,
}

impl Strategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn storage(mut self, storage: StorageHandle) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn paths(mut self, paths: impl Into<Paths>) -> Self {
        self.paths = Some(paths.into());
        self
    }

    pub fn flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = Some(flush);
        self
    }

    /// Apply defaults for the owning store
    pub fn resolve(&self, store_id: &str, default_storage: &StorageHandle) -> ResolvedStrategy<'_> {
        ResolvedStrategy {
            key: self.key.clone().unwrap_or_else(|| store_id.to_string()),
            storage: self
                .storage
                .clone()
                .unwrap_or_else(|| default_storage.clone()),
            paths: self.paths.as_ref(),
            flush: self.flush.unwrap_or_default(),
        }
    }
}

/// A strategy with every default applied.
#[derive(Debug, Clone)]
pub struct ResolvedStrategy<'a> {
    pub key: String,
    pub storage: StorageHandle,
    pub paths: Option<&'a Paths>,
    pub flush: FlushPolicy,
}

// ============================================================================
// Store-level configuration
// ============================================================================

/// Persistence settings attached to a store definition.
///
/// A config that is not enabled attaches nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistConfig {
    pub enabled: bool,
    pub strategies: Vec<Strategy>,
}

impl PersistConfig {
    /// Enabled, with no explicit strategies (the default strategy applies)
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            strategies: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Parse a JSON config such as
    /// `{"enabled": true, "strategies": [{"key": "prefs", "paths": "theme", "flush": "async"}]}`
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PersistError::Config(e.to_string()))
    }

    /// Strategies to run for a store: the configured ones, or a single
    /// synthesized strategy (store id as key, default storage, immediate
    /// flush, whole state) when none are configured.
    pub fn effective_strategies(&self, store_id: &str, default_storage: &StorageHandle) -> Vec<Strategy> {
        if !self.strategies.is_empty() {
            return self.strategies.clone();
        }
        vec![
            Strategy::new()
                .key(store_id)
                .storage(default_storage.clone())
                .flush(FlushPolicy::Immediate),
        ]
    }
}
