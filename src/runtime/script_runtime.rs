//! Rhai-backed scripting runtime shared by every pool slot.
//!
//! All script execution goes through one reentrant execution lock. Pool slots
//! bound how many callers may hold it in turn; they never run scripts in
//! parallel with each other.

use crate::core::{PoolError, Result};
use log::{debug, info};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope, AST};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Name of the binding a script assigns to report its value
pub const RESULT_BINDING: &str = "result";

const MODULE_EXTENSION: &str = "rhai";

static GLOBAL_RUNTIME: OnceLock<Arc<ScriptRuntime>> = OnceLock::new();

/// Holding this guard means holding the global execution lock.
///
/// The lock is reentrant: a thread that already holds it may lock it again.
pub type ExecutionGuard<'a> = ReentrantMutexGuard<'a, ()>;

type Environment = Arc<RwLock<HashMap<String, String>>>;

/// Embedded scripting runtime
///
/// A runtime must be started before a pool will initialize on top of it.
/// The process-wide instance is reached through [`ScriptRuntime::global`];
/// standalone instances can be built for embedding and tests.
pub struct ScriptRuntime {
    engine: RwLock<Engine>,
    execution_lock: ReentrantMutex<()>,
    started: AtomicBool,
    modules: RwLock<HashMap<String, Arc<AST>>>,
    search_paths: RwLock<Vec<PathBuf>>,
    environment: Environment,
    globals: RwLock<Map>,
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("started", &self.is_started())
            .field("modules", &self.modules.read().keys().collect::<Vec<_>>())
            .field("search_paths", &*self.search_paths.read())
            .finish()
    }
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRuntime {
    /// Create a runtime that has not been started yet
    pub fn new() -> Self {
        let environment: Environment = Arc::new(RwLock::new(HashMap::new()));
        Self {
            engine: RwLock::new(build_engine(&environment)),
            execution_lock: ReentrantMutex::new(()),
            started: AtomicBool::new(false),
            modules: RwLock::new(HashMap::new()),
            search_paths: RwLock::new(Vec::new()),
            environment,
            globals: RwLock::new(Map::new()),
        }
    }

    /// Create a runtime that is already started
    pub fn started() -> Self {
        let runtime = Self::new();
        runtime.start();
        runtime
    }

    /// Abort any script that runs more than `max_operations` operations
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_operation_limit(mut self, max_operations: u64) -> Self {
        self.engine.get_mut().on_progress(move |count| {
            if count > max_operations {
                Some(format!("Safety limit exceeded: maximum {} operations", max_operations).into())
            } else {
                None
            }
        });
        self
    }

    /// The process-wide runtime (created on first use, not started)
    pub fn global() -> Arc<ScriptRuntime> {
        Arc::clone(GLOBAL_RUNTIME.get_or_init(|| Arc::new(ScriptRuntime::new())))
    }

    /// Mark the runtime as started. Idempotent.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::AcqRel) {
            info!("Scripting runtime started");
        }
    }

    /// Whether [`start`](Self::start) has been called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Take the global execution lock, blocking until it is free
    pub fn lock_execution(&self) -> ExecutionGuard<'_> {
        self.execution_lock.lock()
    }

    /// Take the global execution lock, giving up after `timeout`
    pub fn try_lock_execution(&self, timeout: Duration) -> Option<ExecutionGuard<'_>> {
        self.execution_lock.try_lock_for(timeout)
    }

    /// Whether any thread currently holds the execution lock
    pub fn is_execution_locked(&self) -> bool {
        self.execution_lock.is_locked()
    }

    /// Whether the calling thread holds the execution lock
    pub fn is_execution_held_by_current_thread(&self) -> bool {
        self.execution_lock.is_owned_by_current_thread()
    }

    /// Evaluate `source` and return the final value of its `result` binding.
    ///
    /// The scope is built from `globals` (or the shared global namespace when
    /// `None`) followed by `locals`, so locals shadow globals. `result` is
    /// pre-declared as unit, which lets scripts write `result = expr`.
    pub fn eval_script(
        &self,
        source: &str,
        globals: Option<&Map>,
        locals: Option<&Map>,
    ) -> Result<Dynamic> {
        let _exec = self.lock_execution();

        let mut scope = Scope::new();
        match globals {
            Some(globals) => push_namespace(&mut scope, globals),
            None => push_namespace(&mut scope, &self.globals.read()),
        }
        if let Some(locals) = locals {
            push_namespace(&mut scope, locals);
        }
        if !scope.contains(RESULT_BINDING) {
            scope.push_dynamic(RESULT_BINDING, Dynamic::UNIT);
        }

        self.engine.read().run_with_scope(&mut scope, source)?;

        Ok(scope
            .get_value::<Dynamic>(RESULT_BINDING)
            .unwrap_or(Dynamic::UNIT))
    }

    /// Evaluate a single expression
    pub fn eval_expression(&self, expression: &str) -> Result<Dynamic> {
        let _exec = self.lock_execution();
        Ok(self.engine.read().eval::<Dynamic>(expression)?)
    }

    /// Compile and register an in-memory module under `name`, replacing any
    /// module already cached under that name.
    pub fn register_module(&self, name: &str, source: &str) -> Result<()> {
        validate_module_name(name)?;
        let ast = {
            let _exec = self.lock_execution();
            self.engine.read().compile(source)?
        };
        self.modules.write().insert(name.to_string(), Arc::new(ast));
        debug!("Registered module: {}", name);
        Ok(())
    }

    /// Return a cached module or load `<search path>/<name>.rhai`.
    ///
    /// Dots in `name` map to directory separators (`a.b` loads `a/b.rhai`).
    pub fn import_module(&self, name: &str) -> Result<Arc<AST>> {
        if let Some(ast) = self.modules.read().get(name) {
            return Ok(Arc::clone(ast));
        }
        validate_module_name(name)?;

        let path = self
            .resolve_module_path(name)
            .ok_or_else(|| PoolError::execution(format!("No module named '{}'", name)))?;

        let ast = {
            let _exec = self.lock_execution();
            self.engine.read().compile_file(path.clone())?
        };
        debug!("Loaded module {} from {}", name, path.display());

        let mut modules = self.modules.write();
        let cached = modules
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ast));
        Ok(Arc::clone(cached))
    }

    /// Whether a module is already cached
    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Import `module` and call its script function `function`.
    ///
    /// Rhai has no keyword arguments; a non-empty `kwargs` map is passed as
    /// one trailing object-map argument.
    pub fn call_function(
        &self,
        module: &str,
        function: &str,
        args: Array,
        kwargs: Map,
    ) -> Result<Dynamic> {
        let ast = self.import_module(module)?;

        let mut args = args;
        if !kwargs.is_empty() {
            args.push(Dynamic::from_map(kwargs));
        }

        let _exec = self.lock_execution();
        let mut scope = Scope::new();
        self.engine
            .read()
            .call_fn::<Dynamic>(&mut scope, &ast, function, args)
            .map_err(|e| PoolError::execution(format!("{}.{}: {}", module, function, e)))
    }

    /// Add a directory to the module search path (ignored if present)
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut paths = self.search_paths.write();
        if !paths.contains(&path) {
            debug!("Added module search path: {}", path.display());
            paths.push(path);
        }
    }

    /// Current module search path, in lookup order
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.read().clone()
    }

    /// Set a variable visible to scripts through `env(name)`.
    ///
    /// Runtime variables shadow the process environment, which is never
    /// modified.
    pub fn set_env(&self, name: impl Into<String>, value: impl Into<String>) {
        self.environment.write().insert(name.into(), value.into());
    }

    /// Look up a variable the way scripts see it
    pub fn env(&self, name: &str) -> Option<String> {
        lookup_env(&self.environment, name)
    }

    /// Set a binding in the shared global namespace
    pub fn set_global(&self, name: &str, value: Dynamic) {
        self.globals.write().insert(name.into(), value);
    }

    /// Read a binding from the shared global namespace
    pub fn global_value(&self, name: &str) -> Option<Dynamic> {
        self.globals.read().get(name).cloned()
    }

    /// Mutable access to the engine, for registering native functions
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.engine.write())
    }

    fn resolve_module_path(&self, name: &str) -> Option<PathBuf> {
        let relative = name
            .split('.')
            .collect::<PathBuf>()
            .with_extension(MODULE_EXTENSION);
        self.search_paths
            .read()
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

fn build_engine(environment: &Environment) -> Engine {
    let mut engine = Engine::new();

    let env = Arc::clone(environment);
    engine.register_fn("env", move |name: ImmutableString| -> Dynamic {
        lookup_env(&env, name.as_str())
            .map(Dynamic::from)
            .unwrap_or(Dynamic::UNIT)
    });

    engine.on_print(|text| info!("[script] {}", text));
    engine.on_debug(|text, source, pos| {
        debug!("[script:{}:{}] {}", source.unwrap_or("<eval>"), pos, text)
    });

    engine
}

fn lookup_env(environment: &Environment, name: &str) -> Option<String> {
    if let Some(value) = environment.read().get(name) {
        return Some(value.clone());
    }
    std::env::var(name).ok()
}

fn push_namespace(scope: &mut Scope<'_>, namespace: &Map) {
    for (name, value) in namespace {
        scope.push_dynamic(name.clone(), value.clone());
    }
}

fn validate_module_name(name: &str) -> Result<()> {
    if name.is_empty() || name.split('.').any(|part| part.is_empty()) {
        return Err(PoolError::execution(format!(
            "Invalid module name '{}'",
            name
        )));
    }
    Ok(())
}
