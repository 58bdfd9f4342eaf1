//! # quillbook-plugin-api
//!
//! Plugin loading and lifecycle management for Quillbook.
//!
//! This crate sits on top of `quillbook-runtime` and provides:
//!
//! - The [`Plugin`] lifecycle contract every plugin honors
//! - Descriptor [`source`]s enumerating loadable plugins
//! - The [`PluginLoader`], which owns the loaded set and drives
//!   `on_load`/`on_unload`
//! - The host capability surface scripts import under the `quillbook`
//!   namespace
//!
//! ## Plugin Kinds
//!
//! Internal plugins are Rust types compiled into the host and registered
//! through a constructor. Script plugins are discovered on disk and run
//! inside the runtime's sandbox; their exported instance is adapted to
//! the same contract.

pub mod host;
pub mod loader;
pub mod plugin;
pub mod source;

pub use loader::PluginLoader;
pub use plugin::{
    InternalPluginEntry, Plugin, PluginConstructor, PluginDescriptor, PluginKind, ScriptPlugin,
};
pub use source::{FsPluginSource, PluginSource, StaticPluginSource};

pub use quillbook_runtime as runtime;
