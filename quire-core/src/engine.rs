//! The lifecycle engine.
//!
//! The engine owns the settings, the document store, engine-level
//! attributes and the hook table. It walks the fixed phase sequence on
//! request, dispatching each phase to every registered hook in priority
//! order, and resolves missing attributes by running forward to the phase
//! whose plugins claim to produce them.

use crate::cache::{CacheStore, DiskStore, MemoryStore};
use crate::capability::CapabilityRegistry;
use crate::config::Settings;
use crate::document::{Document, DocumentStore};
use crate::error::{BuildError, QueryError};
use crate::plugin::{is_hook_name, CommandSurface, HookTable, Hooks, Plugin, PluginCatalog};
use crate::pool::WorkerPool;
use crate::query::{filter_indices, Query, QueryCache};
use quire_expr::ExprCache;
use quire_types::{Phase, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Engine {
    settings: Settings,
    store: DocumentStore,
    attrs: BTreeMap<String, Value>,
    hooks: HookTable,
    capabilities: CapabilityRegistry,
    completed: BTreeSet<Phase>,
    target: Option<Phase>,
    running: Option<Phase>,
    torn_down: bool,
    queries: QueryCache,
    exprs: ExprCache,
    cache: Arc<dyn CacheStore>,
    pool: WorkerPool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("plugins", &self.hooks.plugins())
            .field("documents", &self.store.len())
            .field("completed", &self.completed)
            .field("running", &self.running)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

fn default_store(settings: &Settings) -> Arc<dyn CacheStore> {
    let ttl = Duration::from_secs(settings.cache.ttl_seconds);
    match settings.cache_dir() {
        Some(dir) => Arc::new(DiskStore::new(dir, Some(ttl))),
        None => Arc::new(MemoryStore::with_default_ttl(ttl)),
    }
}

impl Engine {
    /// Build an engine from already constructed plugins, in registration order
    pub fn new(settings: Settings, plugins: Vec<Arc<dyn Plugin>>) -> Result<Self, BuildError> {
        let cache = default_store(&settings);
        Self::with_cache_store(settings, plugins, cache)
    }

    /// Resolve the configured plugin list through `catalog`
    pub fn from_catalog(settings: Settings, catalog: &PluginCatalog) -> Result<Self, BuildError> {
        let plugins = catalog.instantiate(&settings)?;
        Self::new(settings, plugins)
    }

    pub fn with_cache_store(
        settings: Settings,
        plugins: Vec<Arc<dyn Plugin>>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, BuildError> {
        let pool = WorkerPool::new(settings.workers)?;
        let mut hooks = HookTable::new();
        let mut capabilities = CapabilityRegistry::new();

        for plugin in plugins {
            let name = plugin.name().to_string();
            debug!("Registering plugin {}", name);
            plugin.build(&mut Hooks::new(&name, &mut hooks, &mut capabilities));
        }

        Ok(Self {
            settings,
            store: DocumentStore::new(),
            attrs: BTreeMap::new(),
            hooks,
            capabilities,
            completed: BTreeSet::new(),
            target: None,
            running: None,
            torn_down: false,
            queries: QueryCache::new(),
            exprs: ExprCache::new(),
            cache,
            pool,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn document(&self, index: usize) -> Option<&Document> {
        self.store.get(index)
    }

    pub fn document_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.store.get_mut(index)
    }

    pub fn add_document(&mut self, document: Document) -> Result<usize, BuildError> {
        self.store.append(document)
    }

    /// Assign a document's slug; slugs never change once set
    pub fn set_slug(&mut self, index: usize, slug: impl Into<String>) -> Result<(), BuildError> {
        self.store
            .get_mut(index)
            .ok_or(BuildError::NoSuchDocument(index))?
            .set_slug(slug)
    }

    /// Engine attribute, if already computed
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Persistent key/value cache shared by plugins
    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn exprs(&self) -> &ExprCache {
        &self.exprs
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.queries
    }

    /// Forget every resolved query; needed after mutating documents that
    /// were already queried
    pub fn clear_query_cache(&self) {
        self.queries.clear();
    }

    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Documents matching `expr`, in load order
    pub fn filter(&self, expr: &str) -> Result<Vec<usize>, QueryError> {
        filter_indices(self, expr, &[], &BTreeMap::new())
    }

    pub fn has_run(&self, phase: Phase) -> bool {
        self.completed.contains(&phase)
    }

    /// Completed phases in order
    pub fn completed(&self) -> impl Iterator<Item = Phase> + '_ {
        self.completed.iter().copied()
    }

    /// Phase whose hooks are currently executing
    pub fn running(&self) -> Option<Phase> {
        self.running
    }

    /// Target of the run in progress
    pub fn target(&self) -> Option<Phase> {
        self.target
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run every phase up to and including `target` that has not run yet.
    ///
    /// From inside a hook, targets at or before the running phase are a
    /// no-op and later targets fail with [`BuildError::Reentrant`].
    pub fn run(&mut self, target: Phase) -> Result<&mut Self, BuildError> {
        if let Some(running) = self.running {
            if target > running {
                return Err(BuildError::Reentrant { target, running });
            }
            return Ok(self);
        }

        let pending: Vec<Phase> = target
            .up_to()
            .filter(|phase| !self.completed.contains(phase))
            .collect();
        if pending.is_empty() {
            debug!("Phases up to {} already ran", target);
            return Ok(self);
        }

        self.target = Some(target);
        let result = pending
            .into_iter()
            .try_for_each(|phase| self.run_phase(phase));
        self.target = None;
        result.map(|()| self)
    }

    /// Run the full lifecycle
    pub fn build(&mut self) -> Result<&mut Self, BuildError> {
        self.run(Phase::LAST)
    }

    fn run_phase(&mut self, phase: Phase) -> Result<(), BuildError> {
        info!("Running {}", phase);
        self.log_stats("before", phase);

        self.running = Some(phase);
        let result = self.dispatch(phase);
        self.running = None;
        result?;

        self.completed.insert(phase);
        self.log_stats("after", phase);
        Ok(())
    }

    fn dispatch(&mut self, phase: Phase) -> Result<(), BuildError> {
        let hooks = self.hooks.phase_hooks(phase);
        debug!("Dispatching {} to {} hook(s)", phase, hooks.len());
        for (plugin, hook) in hooks {
            debug!(plugin = %plugin, phase = %phase, "Running hook");
            hook(self).map_err(|source| BuildError::Hook {
                plugin,
                point: phase.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn log_stats(&self, when: &str, phase: Phase) {
        let queries = self.queries.stats();
        let (expr_hits, expr_misses) = self.exprs.stats();
        debug!(
            phase = %phase,
            "{}: query cache {} hits / {} misses ({} entries), expressions {} hits / {} misses, store {}",
            when,
            queries.hits,
            queries.misses,
            queries.entries,
            expr_hits,
            expr_misses,
            self.cache.stats()
        );
    }

    /// A callable that runs the build forward to the named phase, or tears
    /// the engine down for `teardown`
    pub fn hook(
        &mut self,
        name: &str,
    ) -> Result<impl FnMut() -> Result<(), BuildError> + '_, BuildError> {
        let phase = match name.parse::<Phase>() {
            Ok(phase) => Some(phase),
            Err(_) if name == "teardown" => None,
            Err(_) => return Err(BuildError::NoSuchAttribute(name.to_string())),
        };
        Ok(move || match phase {
            Some(phase) => self.run(phase).map(|_| ()),
            None => self.teardown(),
        })
    }

    fn production_phase(&self, name: &str) -> Result<Phase, BuildError> {
        if is_hook_name(name) {
            return Err(BuildError::HookName(name.to_string()));
        }
        self.capabilities
            .resolve(name)
            .map_err(|_| BuildError::NoSuchAttribute(name.to_string()))
    }

    /// Engine attribute, running forward to its producing phase if needed
    pub fn get_or_compute(&mut self, name: &str) -> Result<Value, BuildError> {
        if let Some(value) = self.attrs.get(name) {
            return Ok(value.clone());
        }
        let phase = self.production_phase(name)?;
        debug!("Computing '{}' by running to {}", name, phase);
        self.run(phase)?;
        self.attrs
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::NotProduced {
                name: name.to_string(),
                phase,
            })
    }

    /// Document field, running forward to its producing phase if needed
    pub fn document_attr(&mut self, index: usize, name: &str) -> Result<Value, BuildError> {
        let lookup = |engine: &Engine| {
            engine
                .store
                .get(index)
                .ok_or(BuildError::NoSuchDocument(index))
                .map(|doc| doc.field(name))
        };

        if let Some(value) = lookup(&*self)? {
            return Ok(value);
        }
        let phase = self.production_phase(name)?;
        self.run(phase)?;
        lookup(&*self)?.ok_or_else(|| BuildError::NotProduced {
            name: name.to_string(),
            phase,
        })
    }

    /// Collect plugin subcommands
    pub fn register_commands(&mut self) -> Result<CommandSurface, BuildError> {
        let mut surface = CommandSurface::new();
        for (plugin, hook) in self.hooks.command_hooks() {
            hook(self, &mut surface).map_err(|source| BuildError::Hook {
                plugin,
                point: "commands".into(),
                source,
            })?;
        }
        Ok(surface)
    }

    /// Run teardown hooks once, if any phase ran.
    ///
    /// Every teardown hook runs even if an earlier one fails; the first
    /// failure is returned.
    pub fn teardown(&mut self) -> Result<(), BuildError> {
        if self.torn_down || self.completed.is_empty() {
            return Ok(());
        }
        self.torn_down = true;

        let mut first_error = None;
        for (plugin, hook) in self.hooks.teardown_hooks() {
            if let Err(source) = hook(self) {
                warn!("Teardown hook of '{}' failed: {:#}", plugin, source);
                first_error.get_or_insert(BuildError::Hook {
                    plugin,
                    point: "teardown".into(),
                    source,
                });
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!("Teardown on drop failed: {}", err);
        }
    }
}
