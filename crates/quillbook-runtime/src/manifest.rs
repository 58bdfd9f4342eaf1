//! Plugin manifest parsing.
//!
//! Each on-disk plugin directory carries a `manifest.toml` describing the
//! plugin and naming its entry-point script.

use crate::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default entry-point file name.
pub const DEFAULT_ENTRY_POINT: &str = "main.rhai";

/// Plugin manifest structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin metadata.
    pub plugin: PluginMetadata,

    /// Whether the plugin should be loaded.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Plugin metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique identifier; keys the loaded-plugin set.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Version string (semver).
    pub version: String,

    /// Plugin description.
    #[serde(default)]
    pub description: Option<String>,

    /// Plugin author(s).
    #[serde(default)]
    pub authors: Vec<String>,

    /// Entry-point script, relative to the plugin directory.
    #[serde(default)]
    pub entry_point: Option<String>,
}

impl PluginManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: &Path) -> RuntimeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a manifest from a TOML string.
    pub fn from_str(content: &str) -> RuntimeResult<Self> {
        let manifest: PluginManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest.
    fn validate(&self) -> RuntimeResult<()> {
        if self.plugin.id.is_empty() {
            return Err(RuntimeError::InvalidManifest(
                "plugin id cannot be empty".to_string(),
            ));
        }

        if self.plugin.name.is_empty() {
            return Err(RuntimeError::InvalidManifest(
                "plugin name cannot be empty".to_string(),
            ));
        }

        if self.plugin.version.is_empty() {
            return Err(RuntimeError::InvalidManifest(
                "plugin version cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the entry-point file name.
    pub fn entry_point(&self) -> &str {
        self.plugin
            .entry_point
            .as_deref()
            .unwrap_or(DEFAULT_ENTRY_POINT)
    }
}
