//! Plugin loading and lifecycle management.
//!
//! The loader owns the set of loaded plugins, keyed by plugin key. It
//! drives the lifecycle contract (`on_load` on entry, `on_unload` on
//! exit) and lazily builds the capability registry and script sandbox
//! the first time a script plugin is loaded.

use crate::host;
use crate::plugin::{
    InternalPluginEntry, Plugin, PluginConstructor, PluginDescriptor, PluginKind, ScriptPlugin,
};
use crate::source::PluginSource;
use quillbook_runtime::{CapabilityRegistryBuilder, RuntimeResult, ScriptExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads plugins from a source and manages their lifecycle.
pub struct PluginLoader {
    source: Box<dyn PluginSource>,
    internal: Vec<InternalPluginEntry>,
    loaded: HashMap<String, Box<dyn Plugin>>,

    /// Deferred registry construction; taken once when the executor is
    /// first needed.
    capabilities: Option<CapabilityRegistryBuilder>,
    executor: Option<ScriptExecutor>,
}

impl PluginLoader {
    /// Create a loader over the given descriptor source.
    pub fn new(source: impl PluginSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            internal: Vec::new(),
            loaded: HashMap::new(),
            capabilities: None,
            executor: None,
        }
    }

    /// Replace the default capability registry builder.
    ///
    /// Has no effect once a script plugin has been loaded; the registry
    /// is built exactly once.
    pub fn with_capabilities(mut self, builder: CapabilityRegistryBuilder) -> Self {
        self.capabilities = Some(builder);
        self
    }

    /// Register an internal plugin under the given key.
    pub fn register_internal(
        &mut self,
        key: impl Into<String>,
        constructor: PluginConstructor,
    ) {
        self.internal.push(InternalPluginEntry::new(key, constructor));
    }

    /// Load the enabled prefix of an ordered descriptor sequence.
    ///
    /// Descriptors load sequentially until the first disabled one, which
    /// stops the batch; everything after it is not considered. The first
    /// load failure aborts the batch, leaving earlier plugins loaded.
    pub async fn load_enabled_plugins(
        &mut self,
        descriptors: &[PluginDescriptor],
    ) -> RuntimeResult<usize> {
        let mut count = 0;

        for descriptor in descriptors {
            if !descriptor.is_loadable() {
                debug!("stopping at disabled plugin: {}", descriptor.key());
                break;
            }
            if self.load_plugin(descriptor).await? {
                count += 1;
            }
        }

        info!("loaded {count} plugin(s)");
        Ok(count)
    }

    /// Load every descriptor the source knows about.
    ///
    /// Unlike [`load_enabled_plugins`](Self::load_enabled_plugins) a
    /// disabled descriptor is skipped, not a stop. An empty source is a
    /// silent no-op. The first load failure aborts the batch.
    pub async fn load_all_local_plugins(&mut self) -> RuntimeResult<usize> {
        let descriptors = self.source.all_plugins()?;
        let mut count = 0;

        for descriptor in descriptors {
            if self.load_plugin(&descriptor).await? {
                count += 1;
            }
        }

        info!("loaded {count} local plugin(s)");
        Ok(count)
    }

    /// Load every registered internal plugin, unconditionally.
    ///
    /// The first failure aborts the batch, leaving earlier plugins
    /// loaded.
    pub async fn load_all_internal_plugins(&mut self) -> RuntimeResult<usize> {
        let entries = self.internal.clone();

        for entry in &entries {
            let plugin = (entry.constructor)();
            self.activate(&entry.key, plugin).await?;
        }

        info!("loaded {} internal plugin(s)", entries.len());
        Ok(entries.len())
    }

    /// Load a single plugin from its descriptor.
    ///
    /// Returns `false` without side effects when the descriptor is not
    /// loadable. Any failure before `on_load` completes leaves the
    /// loaded set unchanged.
    pub async fn load_plugin(&mut self, descriptor: &PluginDescriptor) -> RuntimeResult<bool> {
        if !descriptor.is_loadable() {
            debug!("skipping disabled plugin: {}", descriptor.key());
            return Ok(false);
        }

        let plugin: Box<dyn Plugin> = match descriptor.kind() {
            PluginKind::Internal(constructor) => constructor(),
            PluginKind::Scripted(discovered) => {
                let path = discovered.entry_point_path();
                let source = tokio::fs::read_to_string(&path).await?;

                let executor = self.script_executor();
                let instance = executor.instantiate(&source, descriptor.key())?;
                Box::new(ScriptPlugin::new(instance)?)
            }
        };

        self.activate(descriptor.key(), plugin).await?;
        Ok(true)
    }

    /// Unload a plugin by key.
    ///
    /// Unknown keys are a no-op. If `on_unload` fails the plugin stays
    /// loaded and the error propagates.
    pub async fn unload_plugin(&mut self, key: &str) -> RuntimeResult<()> {
        let Some(mut plugin) = self.loaded.remove(key) else {
            debug!("plugin not loaded: {key}");
            return Ok(());
        };

        if let Err(err) = plugin.on_unload().await {
            self.loaded.insert(key.to_string(), plugin);
            return Err(err);
        }

        info!("unloaded plugin: {key}");
        Ok(())
    }

    /// Check whether a plugin is currently loaded.
    pub fn is_loaded(&self, key: &str) -> bool {
        self.loaded.contains_key(key)
    }

    /// Get a loaded plugin by key.
    pub fn get_plugin(&self, key: &str) -> Option<&dyn Plugin> {
        self.loaded.get(key).map(Box::as_ref)
    }

    /// Keys of all loaded plugins.
    pub fn loaded_keys(&self) -> Vec<String> {
        self.loaded.keys().cloned().collect()
    }

    /// Number of loaded plugins.
    pub fn plugin_count(&self) -> usize {
        self.loaded.len()
    }

    /// Run `on_load` and insert the plugin into the loaded set.
    async fn activate(&mut self, key: &str, mut plugin: Box<dyn Plugin>) -> RuntimeResult<()> {
        plugin.on_load().await?;

        // A duplicate key replaces the previous entry without running its
        // on_unload hook.
        if self.loaded.insert(key.to_string(), plugin).is_some() {
            warn!("plugin key reused, replacing loaded plugin: {key}");
        } else {
            info!("loaded plugin: {key}");
        }
        Ok(())
    }

    /// The sandbox executor, built on first use from the configured
    /// capability builder.
    fn script_executor(&mut self) -> &ScriptExecutor {
        let capabilities = &mut self.capabilities;
        self.executor.get_or_insert_with(|| {
            let builder = capabilities.take().unwrap_or_else(host::capability_builder);
            ScriptExecutor::new(Arc::new(builder.build()))
        })
    }
}
