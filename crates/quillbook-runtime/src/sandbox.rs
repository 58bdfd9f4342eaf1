//! Script sandbox for Quillbook plugins.
//!
//! Plugin source is compiled and run inside a locked-down engine. The
//! script sees exactly three things beyond the language itself: a
//! `require` function resolving against the capability registry, a
//! `pkg` record (`#{ exports: #{} }`), and a bare `exports` map. A
//! constructor is exported under the `main` key (`module` and `default`
//! are reserved words in the engine, so the record is named `pkg` and
//! the entry key is `main`). The `require` boundary is load-bearing:
//! every isolation guarantee rests on it never being widened to ambient
//! host access.

use crate::capability::CapabilityRegistry;
use crate::error::{RuntimeError, RuntimeResult};
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Map, Position, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Marker payload thrown by `require` for unknown capability names.
#[derive(Debug, Clone)]
struct MissingModule(String);

/// Compiles plugin source and produces constructed instances.
pub struct ScriptExecutor {
    engine: Arc<Engine>,
    registry: Arc<CapabilityRegistry>,
}

impl ScriptExecutor {
    /// Create an executor whose `require` resolves against `registry`.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        let mut engine = Engine::new();

        // No `import` statements, no nested eval. Capabilities come in
        // through `require` only.
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");

        let resolver = Arc::clone(&registry);
        engine.register_fn(
            "require",
            move |name: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                resolver.resolve(name).map_err(|_| {
                    Box::new(EvalAltResult::ErrorRuntime(
                        Dynamic::from(MissingModule(name.to_string())),
                        Position::NONE,
                    ))
                })
            },
        );

        // Curated host surface, always available to plugin code.
        engine.register_fn("log", |message: &str| {
            info!(target: "plugin", "{message}");
        });
        engine.register_fn("log_error", |message: &str| {
            error!(target: "plugin", "{message}");
        });
        engine.register_fn("now_millis", || {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64
        });

        Self {
            engine: Arc::new(engine),
            registry,
        }
    }

    /// The registry this executor resolves imports against.
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Run plugin source and construct its exported instance.
    ///
    /// `label` is used for diagnostics only. The constructor is taken as
    /// `pkg.exports.main`, else `exports.main`, else `pkg.exports`
    /// itself; if it is a function pointer it is called to obtain the
    /// instance, otherwise it is the instance.
    pub fn instantiate(&self, source: &str, label: &str) -> RuntimeResult<ScriptInstance> {
        let mut ast = self
            .engine
            .compile(source)
            .map_err(|err| RuntimeError::Script {
                label: label.to_string(),
                message: err.to_string(),
            })?;
        ast.set_source(label);

        let mut record = Map::new();
        record.insert("exports".into(), Dynamic::from_map(Map::new()));
        let pkg = Dynamic::from_map(record).into_shared();
        let exports = Dynamic::from_map(Map::new()).into_shared();

        let mut scope = Scope::new();
        scope.push_dynamic("pkg", pkg.clone());
        scope.push_dynamic("exports", exports.clone());
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| classify_script_error(err, label))?;

        let constructor = resolve_constructor(&pkg, &exports)
            .ok_or_else(|| RuntimeError::NoExports(label.to_string()))?;

        let state = match constructor.clone().try_cast::<FnPtr>() {
            Some(ctor) => ctor
                .call::<Dynamic>(&self.engine, &ast, ())
                .map_err(|err| classify_script_error(err, label))?,
            None => constructor,
        };
        let state = if state.is_shared() {
            state
        } else {
            state.into_shared()
        };

        Ok(ScriptInstance {
            engine: Arc::clone(&self.engine),
            lib: ast.clone_functions_only(),
            state,
            label: label.to_string(),
        })
    }
}

/// Export resolution order: `pkg.exports.main`, then `exports.main`,
/// then `pkg.exports` itself.
fn resolve_constructor(pkg: &Dynamic, exports: &Dynamic) -> Option<Dynamic> {
    let pkg_exports = pkg
        .read_lock::<Map>()
        .and_then(|map| map.get("exports").cloned());

    if let Some(found) = pkg_exports.as_ref().and_then(main_export) {
        return Some(found);
    }
    if let Some(found) = main_export(exports) {
        return Some(found);
    }
    pkg_exports.filter(usable_export)
}

fn main_export(value: &Dynamic) -> Option<Dynamic> {
    let map = value.read_lock::<Map>()?;
    map.get("main").filter(|entry| !entry.is_unit()).cloned()
}

/// A bare `pkg.exports` counts only when the script actually put
/// something there: a function pointer or a non-empty map.
fn usable_export(value: &Dynamic) -> bool {
    if value.is::<FnPtr>() {
        return true;
    }
    value.read_lock::<Map>().map_or(false, |map| !map.is_empty())
}

fn classify_script_error(err: Box<EvalAltResult>, label: &str) -> RuntimeError {
    match missing_module(&err) {
        Some(name) => RuntimeError::ModuleNotFound(name),
        None => RuntimeError::Script {
            label: label.to_string(),
            message: err.to_string(),
        },
    }
}

/// `require` throws a `MissingModule` payload; dig it out of however many
/// function-call frames the engine wrapped around it.
fn missing_module(err: &EvalAltResult) -> Option<String> {
    match err {
        EvalAltResult::ErrorRuntime(payload, _) => {
            payload.clone().try_cast::<MissingModule>().map(|m| m.0)
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => missing_module(inner),
        _ => None,
    }
}

/// A constructed script plugin: shared instance state plus everything
/// needed to invoke its hooks later.
pub struct ScriptInstance {
    engine: Arc<Engine>,
    lib: AST,
    state: Dynamic,
    label: String,
}

impl fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("label", &self.label)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ScriptInstance {
    /// Structural contract check: does the instance expose a callable
    /// entry under `name`?
    pub fn has_hook(&self, name: &str) -> bool {
        self.state.read_lock::<Map>().map_or(false, |map| {
            map.get(name).map_or(false, |entry| entry.is::<FnPtr>())
        })
    }

    /// Invoke a hook method-style, so `this` is the instance map and
    /// mutations persist across hooks.
    pub fn call_hook(&self, name: &str) -> RuntimeResult<()> {
        let call = self
            .engine
            .compile(format!("plugin.{name}();"))
            .map_err(|err| RuntimeError::Script {
                label: self.label.clone(),
                message: err.to_string(),
            })?;
        let call = self.lib.merge(&call);

        let mut scope = Scope::new();
        scope.push_dynamic("plugin", self.state.clone());
        self.engine
            .run_ast_with_scope(&mut scope, &call)
            .map_err(|err| classify_script_error(err, &self.label))?;
        Ok(())
    }

    /// Diagnostic label the instance was created under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Snapshot of a field on the instance map.
    pub fn state_value(&self, name: &str) -> Option<Dynamic> {
        self.state
            .read_lock::<Map>()
            .and_then(|map| map.get(name).cloned())
    }
}
