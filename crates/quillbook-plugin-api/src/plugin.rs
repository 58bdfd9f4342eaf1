//! Plugin contract and descriptor types.
//!
//! This module defines the lifecycle contract every plugin honors and the
//! descriptors the loader consumes, covering both internal plugins
//! compiled into the host and script plugins discovered on disk.

use async_trait::async_trait;
use quillbook_runtime::{RuntimeError, RuntimeResult, ScriptInstance};
use std::fmt;
use std::sync::Arc;

/// Lifecycle contract for a loaded plugin.
///
/// `on_load` runs exactly once when the plugin enters the loaded set and
/// `on_unload` exactly once when it leaves. Hook errors propagate to the
/// caller; a failed unload leaves the plugin loaded.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable key identifying this plugin.
    fn name(&self) -> &str;

    /// Called when the plugin is loaded.
    async fn on_load(&mut self) -> RuntimeResult<()>;

    /// Called when the plugin is unloaded.
    async fn on_unload(&mut self) -> RuntimeResult<()>;
}

/// Factory producing a fresh instance of an internal plugin.
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// An internal plugin registered with the host at compile time.
#[derive(Clone)]
pub struct InternalPluginEntry {
    /// Key the plugin is loaded under.
    pub key: String,

    /// Constructor invoked on every load.
    pub constructor: PluginConstructor,
}

impl InternalPluginEntry {
    /// Register an internal plugin under the given key.
    pub fn new(key: impl Into<String>, constructor: PluginConstructor) -> Self {
        Self {
            key: key.into(),
            constructor,
        }
    }
}

impl fmt::Debug for InternalPluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalPluginEntry")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What the loader should instantiate for a descriptor.
#[derive(Clone)]
pub enum PluginKind {
    /// Construct via a registered factory.
    Internal(PluginConstructor),

    /// Run a discovered script through the sandbox.
    Scripted(quillbook_runtime::DiscoveredPlugin),
}

/// A loadable plugin known to a source, together with its enabled flag.
#[derive(Clone)]
pub struct PluginDescriptor {
    key: String,
    enabled: bool,
    kind: PluginKind,
}

impl PluginDescriptor {
    /// Describe an internal plugin. Internal plugins start enabled.
    pub fn internal(key: impl Into<String>, constructor: PluginConstructor) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            kind: PluginKind::Internal(constructor),
        }
    }

    /// Describe a discovered script plugin. The enabled flag comes from
    /// its manifest.
    pub fn scripted(discovered: quillbook_runtime::DiscoveredPlugin) -> Self {
        Self {
            key: discovered.id().to_string(),
            enabled: discovered.manifest.enabled,
            kind: PluginKind::Scripted(discovered),
        }
    }

    /// Mark this descriptor disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Key the plugin loads under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the loader may load this plugin.
    pub fn is_loadable(&self) -> bool {
        self.enabled
    }

    /// What the loader should instantiate.
    pub fn kind(&self) -> &PluginKind {
        &self.kind
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PluginKind::Internal(_) => "internal",
            PluginKind::Scripted(_) => "scripted",
        };
        f.debug_struct("PluginDescriptor")
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .field("kind", &kind)
            .finish()
    }
}

/// A sandboxed script plugin adapted to the lifecycle contract.
#[derive(Debug)]
pub struct ScriptPlugin {
    instance: ScriptInstance,
}

impl ScriptPlugin {
    /// Wrap a constructed script instance, checking the contract.
    ///
    /// The instance must expose callable `onload` and `onunload` entries;
    /// anything else is rejected before it can enter the loaded set.
    pub fn new(instance: ScriptInstance) -> RuntimeResult<Self> {
        for hook in ["onload", "onunload"] {
            if !instance.has_hook(hook) {
                return Err(RuntimeError::InvalidPlugin(format!(
                    "{}: missing {hook} hook",
                    instance.label()
                )));
            }
        }
        Ok(Self { instance })
    }

    /// The underlying sandbox instance.
    pub fn instance(&self) -> &ScriptInstance {
        &self.instance
    }
}

#[async_trait]
impl Plugin for ScriptPlugin {
    fn name(&self) -> &str {
        self.instance.label()
    }

    async fn on_load(&mut self) -> RuntimeResult<()> {
        self.instance.call_hook("onload")
    }

    async fn on_unload(&mut self) -> RuntimeResult<()> {
        self.instance.call_hook("onunload")
    }
}
