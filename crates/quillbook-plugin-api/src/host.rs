//! Host capability surface exposed to script plugins.
//!
//! Everything a script can import lives under the `quillbook` root
//! namespace: a static module table plus an API surface generated at
//! registry build time.

use quillbook_runtime::{CapabilityRegistry, CapabilityRegistryBuilder};
use rhai::{Dynamic, Map};

/// Root capability name every script imports the host under.
pub const HOST_NAMESPACE: &str = "quillbook";

/// Host application version reported through the API surface.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the standard host capability registry.
///
/// The loader calls this lazily, just before the first script plugin is
/// instantiated.
pub fn capability_builder() -> CapabilityRegistryBuilder {
    let mut builder = CapabilityRegistry::builder(HOST_NAMESPACE);
    for (name, value) in static_modules() {
        builder = builder.module(name, value);
    }
    builder.api(api_surface)
}

/// Static module table merged under the root namespace.
fn static_modules() -> Vec<(&'static str, Dynamic)> {
    let mut workspace = Map::new();
    workspace.insert("name".into(), "default".into());
    if let Some(dir) = quillbook_runtime::user_plugins_dir() {
        workspace.insert("plugins_dir".into(), dir.display().to_string().into());
    }

    let mut system = Map::new();
    system.insert("os".into(), std::env::consts::OS.into());
    system.insert("arch".into(), std::env::consts::ARCH.into());

    vec![
        ("workspace", Dynamic::from_map(workspace)),
        ("system", Dynamic::from_map(system)),
    ]
}

/// Generated API surface, merged over the static table at build time.
pub fn api_surface() -> Map {
    let mut api = Map::new();
    api.insert("host".into(), HOST_NAMESPACE.into());
    api.insert("version".into(), VERSION.into());
    api
}
