//! Sources of plugin descriptors.
//!
//! The loader is fed by a [`PluginSource`]; the ordering a source returns
//! is the loading order the batch operations honor.

use crate::plugin::PluginDescriptor;
use quillbook_runtime::{discover_in_directory, user_plugins_dir, RuntimeResult};
use std::path::PathBuf;
use tracing::debug;

/// Enumerates the plugins the loader may load, in order.
pub trait PluginSource: Send + Sync {
    /// All known plugin descriptors, in loading order.
    fn all_plugins(&self) -> RuntimeResult<Vec<PluginDescriptor>>;
}

/// A fixed, in-memory descriptor list.
#[derive(Default)]
pub struct StaticPluginSource {
    descriptors: Vec<PluginDescriptor>,
}

impl StaticPluginSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor, keeping insertion order.
    pub fn with(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

impl PluginSource for StaticPluginSource {
    fn all_plugins(&self) -> RuntimeResult<Vec<PluginDescriptor>> {
        Ok(self.descriptors.clone())
    }
}

/// Descriptors discovered from a plugins directory on disk.
pub struct FsPluginSource {
    dir: PathBuf,
}

impl FsPluginSource {
    /// Source plugins from a specific directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Source plugins from the per-OS user plugins directory, if one
    /// can be determined.
    pub fn user() -> Option<Self> {
        user_plugins_dir().map(Self::new)
    }

    /// The directory this source scans.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl PluginSource for FsPluginSource {
    fn all_plugins(&self) -> RuntimeResult<Vec<PluginDescriptor>> {
        let discovered = discover_in_directory(&self.dir)?;
        debug!("found {} plugin(s) in {:?}", discovered.len(), self.dir);
        Ok(discovered.into_iter().map(PluginDescriptor::scripted).collect())
    }
}
