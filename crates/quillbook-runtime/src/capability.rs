//! Capability registry for sandboxed plugins.
//!
//! Script plugins never touch the host environment directly. The only
//! objects they can reach are the entries of this registry, resolved
//! through the sandbox `require` function. The registry is built once,
//! lazily, and never mutated afterwards.

use crate::error::{RuntimeError, RuntimeResult};
use rhai::{Dynamic, Map};
use std::collections::HashMap;

/// Immutable mapping from capability-module name to a host-supplied value.
///
/// Entries are stored shared, so every import of the same name observes
/// the same underlying object.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Dynamic>,
}

impl CapabilityRegistry {
    /// Start building a registry rooted at the given capability name.
    pub fn builder(root: impl Into<String>) -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::new(root)
    }

    /// Resolve a capability name to its registered value.
    pub fn resolve(&self, name: &str) -> RuntimeResult<Dynamic> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))
    }

    /// Check whether a capability name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered capability names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered capability names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder merging the host's static module table with a generated API
/// surface under a single well-known root name.
///
/// Generated entries win over static ones on key collision.
pub struct CapabilityRegistryBuilder {
    root: String,
    modules: Map,
    api: Option<Box<dyn FnOnce() -> Map + Send>>,
    extra: HashMap<String, Dynamic>,
}

impl CapabilityRegistryBuilder {
    /// Create a builder rooted at the given capability name.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            modules: Map::new(),
            api: None,
            extra: HashMap::new(),
        }
    }

    /// Add an entry to the static module table inside the root namespace.
    pub fn module(mut self, name: impl Into<String>, value: impl Into<Dynamic>) -> Self {
        self.modules.insert(name.into().into(), value.into());
        self
    }

    /// Set the generated-API factory, invoked once at build time and
    /// merged over the static table.
    pub fn api(mut self, factory: impl FnOnce() -> Map + Send + 'static) -> Self {
        self.api = Some(Box::new(factory));
        self
    }

    /// Register an additional top-level capability outside the root
    /// namespace.
    pub fn entry(mut self, name: impl Into<String>, value: Dynamic) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Build the registry. Construction is total.
    pub fn build(self) -> CapabilityRegistry {
        let mut namespace = self.modules;
        if let Some(api) = self.api {
            namespace.extend(api());
        }

        let mut entries: HashMap<String, Dynamic> = self
            .extra
            .into_iter()
            .map(|(name, value)| (name, shared(value)))
            .collect();
        entries.insert(self.root, shared(Dynamic::from_map(namespace)));

        CapabilityRegistry { entries }
    }
}

fn shared(value: Dynamic) -> Dynamic {
    if value.is_shared() {
        value
    } else {
        value.into_shared()
    }
}
