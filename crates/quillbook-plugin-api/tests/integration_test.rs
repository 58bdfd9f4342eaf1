//! Integration tests for plugin loading and lifecycle management.
//!
//! These tests cover:
//! - Batch loading order and the disabled-descriptor stop
//! - Internal plugin loading
//! - Script plugins discovered from disk, end to end
//! - Lifecycle hook failures and the loaded-set guarantees around them

use async_trait::async_trait;
use quillbook_plugin_api::runtime::{CapabilityRegistry, RuntimeError, RuntimeResult};
use quillbook_plugin_api::{
    FsPluginSource, Plugin, PluginConstructor, PluginDescriptor, PluginLoader, StaticPluginSource,
};
use rhai::Map;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ==============================================================================
// Test Fixture Helpers
// ==============================================================================

#[derive(Default)]
struct Counters {
    loads: AtomicUsize,
    unloads: AtomicUsize,
}

struct TestPlugin {
    key: String,
    counters: Arc<Counters>,
    fail_on_load: bool,
    fail_on_unload: bool,
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        &self.key
    }

    async fn on_load(&mut self) -> RuntimeResult<()> {
        if self.fail_on_load {
            return Err(RuntimeError::Plugin(format!("{}: load refused", self.key)));
        }
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_unload(&mut self) -> RuntimeResult<()> {
        if self.fail_on_unload {
            return Err(RuntimeError::Plugin(format!("{}: unload refused", self.key)));
        }
        self.counters.unloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn constructor(key: &str, counters: Arc<Counters>) -> PluginConstructor {
    constructor_with(key, counters, false, false)
}

fn constructor_with(
    key: &str,
    counters: Arc<Counters>,
    fail_on_load: bool,
    fail_on_unload: bool,
) -> PluginConstructor {
    let key = key.to_string();
    Arc::new(move || -> Box<dyn Plugin> {
        Box::new(TestPlugin {
            key: key.clone(),
            counters: Arc::clone(&counters),
            fail_on_load,
            fail_on_unload,
        })
    })
}

fn empty_loader() -> PluginLoader {
    PluginLoader::new(StaticPluginSource::new())
}

/// Create an on-disk script plugin directory.
fn create_script_plugin(dir: &Path, id: &str, enabled: bool, script: &str) {
    let plugin_dir = dir.join(id);
    std::fs::create_dir_all(&plugin_dir).unwrap();

    let manifest = format!(
        r#"enabled = {enabled}

[plugin]
id = "{id}"
name = "Test Plugin {id}"
version = "0.1.0"
"#
    );

    std::fs::write(plugin_dir.join("manifest.toml"), manifest).unwrap();
    std::fs::write(plugin_dir.join("main.rhai"), script).unwrap();
}

const COUNTER_SCRIPT: &str = r#"
let api = require("quillbook");

pkg.exports.main = || #{
    count: 0,
    onload: || { this.count += 1; },
    onunload: || { this.count -= 1; }
};
"#;

// ==============================================================================
// Batch Loading Tests
// ==============================================================================

#[tokio::test]
async fn test_loading_stops_at_first_disabled_descriptor() {
    let counters = Arc::new(Counters::default());

    let descriptors = vec![
        PluginDescriptor::internal("a", constructor("a", Arc::clone(&counters))),
        PluginDescriptor::internal("b", constructor("b", Arc::clone(&counters))),
        PluginDescriptor::internal("c", constructor("c", Arc::clone(&counters))).disabled(),
        PluginDescriptor::internal("d", constructor("d", Arc::clone(&counters))),
    ];

    let mut loader = empty_loader();
    let loaded = loader.load_enabled_plugins(&descriptors).await.unwrap();

    // The disabled descriptor ends the batch; "d" is never considered.
    assert_eq!(loaded, 2);
    assert!(loader.is_loaded("a"));
    assert!(loader.is_loaded("b"));
    assert!(!loader.is_loaded("c"));
    assert!(!loader.is_loaded("d"));
    assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_local_loading_skips_disabled_descriptors() {
    let counters = Arc::new(Counters::default());

    let source = StaticPluginSource::new()
        .with(PluginDescriptor::internal(
            "a",
            constructor("a", Arc::clone(&counters)),
        ))
        .with(
            PluginDescriptor::internal("b", constructor("b", Arc::clone(&counters))).disabled(),
        )
        .with(PluginDescriptor::internal(
            "c",
            constructor("c", Arc::clone(&counters)),
        ));

    let mut loader = PluginLoader::new(source);
    let loaded = loader.load_all_local_plugins().await.unwrap();

    // Skip, not stop: "c" still loads.
    assert_eq!(loaded, 2);
    assert!(loader.is_loaded("a"));
    assert!(!loader.is_loaded("b"));
    assert!(loader.is_loaded("c"));
}

#[tokio::test]
async fn test_internal_plugins_load_unconditionally() {
    let counters = Arc::new(Counters::default());

    let mut loader = empty_loader();
    loader.register_internal("core-a", constructor("core-a", Arc::clone(&counters)));
    loader.register_internal("core-b", constructor("core-b", Arc::clone(&counters)));

    let loaded = loader.load_all_internal_plugins().await.unwrap();
    assert_eq!(loaded, 2);
    assert_eq!(loader.plugin_count(), 2);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_load_failure_aborts_the_batch() {
    let counters = Arc::new(Counters::default());

    let descriptors = vec![
        PluginDescriptor::internal("ok", constructor("ok", Arc::clone(&counters))),
        PluginDescriptor::internal(
            "bad",
            constructor_with("bad", Arc::clone(&counters), true, false),
        ),
        PluginDescriptor::internal("late", constructor("late", Arc::clone(&counters))),
    ];

    let mut loader = empty_loader();
    let err = loader.load_enabled_plugins(&descriptors).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Plugin(_)));

    // Earlier plugins stay loaded, later ones are never reached.
    assert!(loader.is_loaded("ok"));
    assert!(!loader.is_loaded("bad"));
    assert!(!loader.is_loaded("late"));
}

#[tokio::test]
async fn test_duplicate_key_replaces_without_unload() {
    let counters = Arc::new(Counters::default());
    let ctor = constructor("twin", Arc::clone(&counters));

    let descriptors = vec![
        PluginDescriptor::internal("twin", Arc::clone(&ctor)),
        PluginDescriptor::internal("twin", ctor),
    ];

    let mut loader = empty_loader();
    loader.load_enabled_plugins(&descriptors).await.unwrap();

    // Both loads ran, the second replaced the first silently.
    assert_eq!(loader.plugin_count(), 1);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    assert_eq!(counters.unloads.load(Ordering::SeqCst), 0);
}

// ==============================================================================
// Unload Tests
// ==============================================================================

#[tokio::test]
async fn test_unload_round_trip() {
    let counters = Arc::new(Counters::default());
    let descriptors = vec![PluginDescriptor::internal(
        "solo",
        constructor("solo", Arc::clone(&counters)),
    )];

    let mut loader = empty_loader();
    loader.load_enabled_plugins(&descriptors).await.unwrap();
    loader.unload_plugin("solo").await.unwrap();

    assert!(!loader.is_loaded("solo"));
    assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);

    // Unloading again is a no-op.
    loader.unload_plugin("solo").await.unwrap();
    assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unload_failure_leaves_the_plugin_loaded() {
    let counters = Arc::new(Counters::default());
    let descriptors = vec![PluginDescriptor::internal(
        "stuck",
        constructor_with("stuck", Arc::clone(&counters), false, true),
    )];

    let mut loader = empty_loader();
    loader.load_enabled_plugins(&descriptors).await.unwrap();

    let err = loader.unload_plugin("stuck").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Plugin(_)));
    assert!(loader.is_loaded("stuck"));
}

// ==============================================================================
// Script Plugin Tests
// ==============================================================================

#[tokio::test]
async fn test_script_plugin_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(temp_dir.path(), "counter", true, COUNTER_SCRIPT);

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    let loaded = loader.load_all_local_plugins().await.unwrap();

    assert_eq!(loaded, 1);
    assert!(loader.is_loaded("counter"));
    assert_eq!(loader.get_plugin("counter").unwrap().name(), "counter");

    loader.unload_plugin("counter").await.unwrap();
    assert!(!loader.is_loaded("counter"));
}

#[tokio::test]
async fn test_script_without_exports_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(temp_dir.path(), "mute", true, "let x = 1;");

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    let err = loader.load_all_local_plugins().await.unwrap_err();

    assert!(matches!(err, RuntimeError::NoExports(label) if label == "mute"));
    assert_eq!(loader.plugin_count(), 0);
}

#[tokio::test]
async fn test_unknown_capability_rejects_the_script() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(
        temp_dir.path(),
        "greedy",
        true,
        r#"
            let fs = require("filesystem");
            pkg.exports = #{ onload: || {}, onunload: || {} };
        "#,
    );

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    let err = loader.load_all_local_plugins().await.unwrap_err();

    assert!(matches!(err, RuntimeError::ModuleNotFound(name) if name == "filesystem"));
    assert_eq!(loader.plugin_count(), 0);
}

#[tokio::test]
async fn test_script_missing_lifecycle_hook_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(
        temp_dir.path(),
        "half",
        true,
        r#"pkg.exports = #{ onload: || {} };"#,
    );

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    let err = loader.load_all_local_plugins().await.unwrap_err();

    assert!(matches!(err, RuntimeError::InvalidPlugin(_)));
    assert_eq!(loader.plugin_count(), 0);
}

#[tokio::test]
async fn test_custom_capability_registry() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(
        temp_dir.path(),
        "reader",
        true,
        r#"
            let api = require("quillbook");
            if api.flavor != "custom" { throw "wrong registry"; }
            pkg.exports = #{ onload: || {}, onunload: || {} };
        "#,
    );

    let builder = CapabilityRegistry::builder("quillbook").module("flavor", "custom");
    let mut loader =
        PluginLoader::new(FsPluginSource::new(temp_dir.path())).with_capabilities(builder);

    assert_eq!(loader.load_all_local_plugins().await.unwrap(), 1);
    assert!(loader.is_loaded("reader"));
}

#[tokio::test]
async fn test_disabled_script_plugin_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(temp_dir.path(), "off", false, COUNTER_SCRIPT);

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    let loaded = loader.load_all_local_plugins().await.unwrap();

    assert_eq!(loaded, 0);
    assert!(!loader.is_loaded("off"));
}

// ==============================================================================
// Host Surface Tests
// ==============================================================================

#[tokio::test]
async fn test_default_host_surface_is_importable() {
    let temp_dir = TempDir::new().unwrap();
    create_script_plugin(
        temp_dir.path(),
        "probe",
        true,
        r#"
            let api = require("quillbook");
            if api.version == () { throw "no version"; }
            if api.system == () { throw "no system table"; }
            pkg.exports = #{ onload: || {}, onunload: || {} };
        "#,
    );

    let mut loader = PluginLoader::new(FsPluginSource::new(temp_dir.path()));
    assert_eq!(loader.load_all_local_plugins().await.unwrap(), 1);
}

#[test]
fn test_host_api_surface_contents() {
    let api: Map = quillbook_plugin_api::host::api_surface();
    assert_eq!(
        api.get("host").unwrap().clone().into_string().unwrap(),
        quillbook_plugin_api::host::HOST_NAMESPACE
    );
    assert!(api.contains_key("version"));
}
