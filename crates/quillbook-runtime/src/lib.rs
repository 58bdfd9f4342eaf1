//! # quillbook-runtime
//!
//! Sandboxed script runtime for Quillbook plugins.
//!
//! This crate provides:
//! - A capability registry: the complete set of host objects a sandboxed
//!   plugin may import
//! - A script sandbox that turns plugin source into constructed instances
//! - Plugin manifest parsing
//! - Plugin discovery from the per-OS data directory
//!
//! ## Plugin Structure
//!
//! On-disk plugins are directories containing:
//! - `manifest.toml` - Plugin metadata and the enabled flag
//! - `main.rhai` - Entry-point script (name overridable in the manifest)
//!
//! ## Security Model
//!
//! Script plugins run inside a locked-down engine with no filesystem,
//! environment, or module access. The only host objects reachable are the
//! entries of the capability registry, resolved through the injected
//! `require` function.

pub mod capability;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod sandbox;

pub use capability::{CapabilityRegistry, CapabilityRegistryBuilder};
pub use discovery::{
    discover_in_directory, discover_plugin, discover_plugins, user_plugins_dir, DiscoveredPlugin,
};
pub use error::{RuntimeError, RuntimeResult};
pub use manifest::{PluginManifest, PluginMetadata};
pub use sandbox::{ScriptExecutor, ScriptInstance};
