//! The process-lifetime context: global names, the garbage collector, the
//! optional hook object, the module loader seams, the PRNG and the
//! recursion sentry.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::gc::GarbageCollector;
use crate::reference::Reference;
use crate::runtime::context::Scope;
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::hooks::Hooks;
use crate::runtime::loader::{ModuleLoader, ScriptCompiler};
use crate::source::SourceLocation;
use crate::variable::VarPtr;

#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Insertion thresholds for the three collector generations.
    pub gc_thresholds: [usize; 3],
    /// Bound on script call depth enforced by the recursion sentry.
    pub recursion_limit: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            gc_thresholds: [500, 2000, 8000],
            recursion_limit: 1000,
        }
    }
}

impl EngineOptions {
    pub fn with_gc_thresholds(mut self, thresholds: [usize; 3]) -> Self {
        self.gc_thresholds = thresholds;
        self
    }

    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }
}

pub struct GlobalContext {
    named: RefCell<HashMap<String, Reference>>,
    gc: RefCell<GarbageCollector>,
    hooks: RefCell<Option<Rc<dyn Hooks>>>,
    loader: RefCell<Option<Rc<dyn ModuleLoader>>>,
    compiler: RefCell<Option<Rc<dyn ScriptCompiler>>>,
    loading: RefCell<HashSet<PathBuf>>,
    prng: RefCell<SmallRng>,
    depth: Cell<u32>,
    recursion_limit: u32,
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalContext {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            named: RefCell::new(HashMap::new()),
            gc: RefCell::new(GarbageCollector::new(options.gc_thresholds)),
            hooks: RefCell::new(None),
            loader: RefCell::new(None),
            compiler: RefCell::new(None),
            loading: RefCell::new(HashSet::new()),
            prng: RefCell::new(SmallRng::from_entropy()),
            depth: Cell::new(0),
            recursion_limit: options.recursion_limit,
        }
    }

    /// Allocate a fresh variable through the collector's factory.
    pub fn create_variable(&self) -> VarPtr {
        self.gc.borrow_mut().create_variable()
    }

    /// Collect the given generation now, cascading into tied generations.
    pub fn collect_garbage(&self, generation: usize) {
        self.gc.borrow_mut().collect_cascade(generation);
    }

    pub fn collect_all_garbage(&self) {
        self.gc.borrow_mut().collect_all();
    }

    pub fn gc_tracked_count(&self, generation: usize) -> usize {
        self.gc.borrow().tracked_count(generation)
    }

    pub fn gc_total_tracked(&self) -> usize {
        self.gc.borrow().total_tracked()
    }

    pub fn set_hooks(&self, hooks: Option<Rc<dyn Hooks>>) {
        *self.hooks.borrow_mut() = hooks;
    }

    pub(crate) fn with_hooks(&self, f: impl FnOnce(&dyn Hooks)) {
        let hooks = self.hooks.borrow().clone();
        if let Some(hooks) = hooks {
            f(&*hooks);
        }
    }

    pub fn set_module_loader(&self, loader: Option<Rc<dyn ModuleLoader>>) {
        *self.loader.borrow_mut() = loader;
    }

    pub fn module_loader(&self) -> Option<Rc<dyn ModuleLoader>> {
        self.loader.borrow().clone()
    }

    pub fn set_script_compiler(&self, compiler: Option<Rc<dyn ScriptCompiler>>) {
        *self.compiler.borrow_mut() = compiler;
    }

    pub fn script_compiler(&self) -> Option<Rc<dyn ScriptCompiler>> {
        self.compiler.borrow().clone()
    }

    pub fn random_u32(&self) -> u32 {
        self.prng.borrow_mut().gen()
    }

    pub fn insert_named_reference(&self, name: impl Into<String>, reference: Reference) {
        self.named.borrow_mut().insert(name.into(), reference);
    }

    pub fn get_named_reference_opt(&self, name: &str) -> Option<Reference> {
        self.named.borrow().get(name).cloned()
    }

    /// Record one level of script call depth; the guard releases it on any
    /// exit path.
    pub(crate) fn recursion_guard(
        &self,
        sloc: &SourceLocation,
    ) -> Result<RecursionGuard<'_>, RuntimeError> {
        let depth = self.depth.get();
        if depth >= self.recursion_limit {
            return Err(RuntimeError::native_at(
                ErrorKind::RecursionLimit,
                format!("recursion limit exceeded (depth was `{depth}`)"),
                sloc,
            ));
        }
        self.depth.set(depth + 1);
        Ok(RecursionGuard { global: self })
    }

    /// Guard against reentrant loads of the same canonical path. Detects
    /// self-imports and import cycles.
    pub(crate) fn begin_load(&self, path: &Path) -> Result<LoadGuard<'_>, RuntimeError> {
        if !self.loading.borrow_mut().insert(path.to_path_buf()) {
            return Err(RuntimeError::native(
                ErrorKind::Io,
                format!("recursive import of '{}'", path.display()),
            ));
        }
        Ok(LoadGuard {
            global: self,
            path: path.to_path_buf(),
        })
    }
}

impl Scope for GlobalContext {
    fn is_analytic(&self) -> bool {
        false
    }

    fn parent_scope(&self) -> Option<&dyn Scope> {
        None
    }

    fn lookup_for_rebind(&self, name: &str) -> Option<Reference> {
        self.get_named_reference_opt(name)
    }
}

pub(crate) struct RecursionGuard<'a> {
    global: &'a GlobalContext,
}

impl std::fmt::Debug for RecursionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursionGuard").finish()
    }
}

impl Drop for RecursionGuard<'_> {
    fn drop(&mut self) {
        let depth = self.global.depth.get();
        self.global.depth.set(depth.saturating_sub(1));
    }
}

pub(crate) struct LoadGuard<'a> {
    global: &'a GlobalContext,
    path: PathBuf,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.global.loading.borrow_mut().remove(&self.path);
    }
}

impl std::fmt::Debug for LoadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGuard").field("path", &self.path).finish()
    }
}
