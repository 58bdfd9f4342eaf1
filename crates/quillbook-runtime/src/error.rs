//! Error types for the plugin runtime.

use thiserror::Error;

/// Errors that can occur while loading or running plugins.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Constructed object does not satisfy the plugin contract.
    #[error("invalid plugin: {0}")]
    InvalidPlugin(String),

    /// Script produced no usable constructor.
    #[error("failed to load plugin {0}: no exports detected")]
    NoExports(String),

    /// Script imported a capability name that is not registered.
    #[error("module {0} not found")]
    ModuleNotFound(String),

    /// Failed to parse or validate a plugin manifest.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Plugin script failed to compile or run.
    #[error("script error in {label}: {message}")]
    Script { label: String, message: String },

    /// Failure raised by a plugin's own lifecycle hooks.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for plugin runtime operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
