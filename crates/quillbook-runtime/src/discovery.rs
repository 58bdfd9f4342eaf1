//! Plugin discovery from the user data directory.
//!
//! Each plugin is a subdirectory of the `plugins/` folder containing a
//! `manifest.toml` and an entry-point script.

use crate::error::RuntimeResult;
use crate::manifest::PluginManifest;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the plugins folder inside the application data directory.
pub const PLUGIN_FOLDER: &str = "plugins";

/// A plugin directory with a parsed manifest.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Path to the plugin directory.
    pub path: PathBuf,

    /// Parsed manifest.
    pub manifest: PluginManifest,
}

impl DiscoveredPlugin {
    /// Get the plugin ID.
    pub fn id(&self) -> &str {
        &self.manifest.plugin.id
    }

    /// Get the plugin name.
    pub fn name(&self) -> &str {
        &self.manifest.plugin.name
    }

    /// Get the path to the entry-point script.
    pub fn entry_point_path(&self) -> PathBuf {
        self.path.join(self.manifest.entry_point())
    }

    /// Check if the entry-point script exists.
    pub fn has_entry_point(&self) -> bool {
        self.entry_point_path().exists()
    }
}

/// Get the per-OS user plugins directory.
pub fn user_plugins_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "quillbook", "quillbook")
        .map(|dirs| dirs.data_dir().join(PLUGIN_FOLDER))
}

/// Discover all plugins under the user plugins directory.
pub fn discover_plugins() -> RuntimeResult<Vec<DiscoveredPlugin>> {
    match user_plugins_dir() {
        Some(dir) => discover_in_directory(&dir),
        None => Ok(Vec::new()),
    }
}

/// Discover plugins in a specific directory.
///
/// Directories without a manifest are skipped, malformed manifests are
/// skipped with a warning, and the first occurrence of a duplicate id
/// wins.
pub fn discover_in_directory(dir: &Path) -> RuntimeResult<Vec<DiscoveredPlugin>> {
    let mut plugins: Vec<DiscoveredPlugin> = Vec::new();

    if !dir.exists() {
        return Ok(plugins);
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("failed to read plugins directory {:?}: {err}", dir);
            return Ok(plugins);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if !path.is_dir() {
            continue;
        }

        let manifest_path = path.join("manifest.toml");
        if !manifest_path.exists() {
            debug!("skipping {:?}: no manifest.toml", path);
            continue;
        }

        match PluginManifest::from_file(&manifest_path) {
            Ok(manifest) => {
                if plugins.iter().any(|p| p.id() == manifest.plugin.id) {
                    debug!("skipping duplicate plugin: {}", manifest.plugin.id);
                    continue;
                }

                info!(
                    "discovered plugin: {} v{} at {:?}",
                    manifest.plugin.name, manifest.plugin.version, path
                );
                plugins.push(DiscoveredPlugin { path, manifest });
            }
            Err(err) => {
                warn!("failed to load manifest from {:?}: {err}", manifest_path);
            }
        }
    }

    Ok(plugins)
}

/// Load a single plugin directory.
pub fn discover_plugin(path: &Path) -> RuntimeResult<DiscoveredPlugin> {
    let manifest = PluginManifest::from_file(&path.join("manifest.toml"))?;

    Ok(DiscoveredPlugin {
        path: path.to_path_buf(),
        manifest,
    })
}
