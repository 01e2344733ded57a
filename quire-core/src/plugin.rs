//! Plugin registration and hook dispatch order.
//!
//! A plugin is any type implementing [`Plugin`]. When the engine is built,
//! each plugin's [`Plugin::build`] receives a [`Hooks`] registrar and
//! attaches closures to the lifecycle points it cares about; points it
//! ignores are simply never called for that plugin.
//!
//! # Example
//!
//! ```
//! use quire_core::{Engine, Hooks, Phase, Plugin};
//! use std::sync::Arc;
//!
//! struct Stamp;
//!
//! impl Plugin for Stamp {
//!     fn name(&self) -> &str {
//!         "stamp"
//!     }
//!
//!     fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
//!         hooks.produces(&["stamped"], Phase::Configure);
//!         hooks.on(Phase::Configure, |engine: &mut Engine| {
//!             engine.set_attr("stamped", true);
//!             Ok(())
//!         });
//!     }
//! }
//! ```

use crate::capability::CapabilityRegistry;
use crate::config::{Settings, DEFAULT_SENTINEL};
use crate::engine::Engine;
use crate::error::{ConfigError, HookError};
use clap::{ArgMatches, Command};
use quire_types::{Phase, Priority};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Hook run during a lifecycle phase or at teardown
pub type PhaseHook = Arc<dyn Fn(&mut Engine) -> Result<(), HookError> + Send + Sync>;

/// Hook that registers CLI subcommands
pub type CommandHook =
    Arc<dyn Fn(&mut Engine, &mut CommandSurface) -> Result<(), HookError> + Send + Sync>;

/// Handler for a plugin-registered subcommand
pub type CommandHandler =
    Arc<dyn Fn(&mut Engine, &ArgMatches) -> Result<(), HookError> + Send + Sync>;

/// Builds a plugin from the loaded settings
pub type PluginFactory =
    Arc<dyn Fn(&Settings) -> Result<Arc<dyn Plugin>, ConfigError> + Send + Sync>;

/// A unit of build behaviour
pub trait Plugin: Send + Sync + 'static {
    /// Identifier used in logs and error messages
    fn name(&self) -> &str;

    /// Register hooks and attribute productions. Called once per engine.
    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>);
}

/// Where in the lifecycle a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Phase(Phase),
    Commands,
    Teardown,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPoint::Phase(phase) => write!(f, "{}", phase),
            HookPoint::Commands => f.write_str("commands"),
            HookPoint::Teardown => f.write_str("teardown"),
        }
    }
}

/// Names that address hook points rather than attributes
pub fn is_hook_name(name: &str) -> bool {
    name == "teardown" || name == "commands" || name.parse::<Phase>().is_ok()
}

#[derive(Clone)]
struct Entry<F> {
    plugin: String,
    priority: Priority,
    hook: F,
}

// Keeps each list ordered by tier, registration order within a tier
fn insert_ordered<F>(list: &mut Vec<Entry<F>>, entry: Entry<F>) {
    let at = list.partition_point(|e| e.priority <= entry.priority);
    list.insert(at, entry);
}

/// Every registered hook, in dispatch order per hook point
#[derive(Default)]
pub struct HookTable {
    phases: BTreeMap<Phase, Vec<Entry<PhaseHook>>>,
    commands: Vec<Entry<CommandHook>>,
    teardown: Vec<Entry<PhaseHook>>,
    plugins: Vec<String>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin names in registration order
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Hooks for `phase` as (plugin, hook) pairs, in dispatch order
    pub fn phase_hooks(&self, phase: Phase) -> Vec<(String, PhaseHook)> {
        self.phases
            .get(&phase)
            .map(|list| {
                list.iter()
                    .map(|e| (e.plugin.clone(), Arc::clone(&e.hook)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn teardown_hooks(&self) -> Vec<(String, PhaseHook)> {
        self.teardown
            .iter()
            .map(|e| (e.plugin.clone(), Arc::clone(&e.hook)))
            .collect()
    }

    pub fn command_hooks(&self) -> Vec<(String, CommandHook)> {
        self.commands
            .iter()
            .map(|e| (e.plugin.clone(), Arc::clone(&e.hook)))
            .collect()
    }

    /// Plugin names that run at `point`, in dispatch order
    pub fn dispatch_order(&self, point: HookPoint) -> Vec<&str> {
        match point {
            HookPoint::Phase(phase) => self
                .phases
                .get(&phase)
                .map(|list| list.iter().map(|e| e.plugin.as_str()).collect())
                .unwrap_or_default(),
            HookPoint::Commands => self.commands.iter().map(|e| e.plugin.as_str()).collect(),
            HookPoint::Teardown => self.teardown.iter().map(|e| e.plugin.as_str()).collect(),
        }
    }
}

/// Registrar handed to [`Plugin::build`]
pub struct Hooks<'a> {
    plugin: String,
    table: &'a mut HookTable,
    capabilities: &'a mut CapabilityRegistry,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(
        plugin: &str,
        table: &'a mut HookTable,
        capabilities: &'a mut CapabilityRegistry,
    ) -> Self {
        table.plugins.push(plugin.to_string());
        Self {
            plugin: plugin.to_string(),
            table,
            capabilities,
        }
    }

    /// Name of the plugin being built
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Run `hook` during `phase`, in registration order
    pub fn on<F>(&mut self, phase: Phase, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_with(phase, Priority::Normal, hook)
    }

    /// Run `hook` during `phase`, ahead of normally registered hooks
    pub fn on_first<F>(&mut self, phase: Phase, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_with(phase, Priority::First, hook)
    }

    /// Run `hook` during `phase`, after normally registered hooks
    pub fn on_last<F>(&mut self, phase: Phase, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_with(phase, Priority::Last, hook)
    }

    pub fn on_with<F>(&mut self, phase: Phase, priority: Priority, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let entry = Entry {
            plugin: self.plugin.clone(),
            priority,
            hook: Arc::new(hook) as PhaseHook,
        };
        insert_ordered(self.table.phases.entry(phase).or_default(), entry);
        self
    }

    /// Run `hook` once when the engine tears down
    pub fn on_teardown<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let entry = Entry {
            plugin: self.plugin.clone(),
            priority: Priority::Normal,
            hook: Arc::new(hook) as PhaseHook,
        };
        insert_ordered(&mut self.table.teardown, entry);
        self
    }

    /// Register CLI subcommands
    pub fn on_commands<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Engine, &mut CommandSurface) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let entry = Entry {
            plugin: self.plugin.clone(),
            priority: Priority::Normal,
            hook: Arc::new(hook) as CommandHook,
        };
        insert_ordered(&mut self.table.commands, entry);
        self
    }

    /// Declare that this plugin populates `names` during `phase`
    pub fn produces(&mut self, names: &[&str], phase: Phase) -> &mut Self {
        self.capabilities.register(names, phase, &self.plugin);
        self
    }
}

/// Subcommands contributed by plugins
#[derive(Default)]
pub struct CommandSurface {
    commands: Vec<(Command, CommandHandler)>,
}

impl CommandSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subcommand; a later command with the same name replaces it
    pub fn add<F>(&mut self, command: Command, handler: F) -> &mut Self
    where
        F: Fn(&mut Engine, &ArgMatches) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let name = command.get_name().to_string();
        self.commands.retain(|(c, _)| c.get_name() != name);
        self.commands.push((command, Arc::new(handler)));
        self
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().map(|(c, _)| c)
    }

    pub fn handler(&self, name: &str) -> Option<CommandHandler> {
        self.commands
            .iter()
            .find(|(c, _)| c.get_name() == name)
            .map(|(_, h)| Arc::clone(h))
    }

    /// Attach every registered subcommand to `root`
    pub fn augment(&self, root: Command) -> Command {
        self.commands
            .iter()
            .fold(root, |root, (command, _)| root.subcommand(command.clone()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Build the ordered identifier list: splice `defaults` in at the sentinel,
/// drop disabled identifiers, keep the first occurrence of duplicates
pub fn registration_list(hooks: &[String], defaults: &[String], disabled: &[String]) -> Vec<String> {
    let disabled: HashSet<&str> = disabled.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut list = Vec::new();

    let expanded = hooks.iter().flat_map(|id| {
        if id == DEFAULT_SENTINEL {
            defaults.iter().collect::<Vec<_>>()
        } else {
            vec![id]
        }
    });

    for id in expanded {
        if disabled.contains(id.as_str()) {
            continue;
        }
        if !seen.insert(id.as_str()) {
            tracing::warn!("Plugin '{}' listed more than once, keeping the first", id);
            continue;
        }
        list.push(id.clone());
    }
    list
}

/// Identifier → factory table used to resolve configured plugins
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: Vec<(String, PluginFactory)>,
    defaults: Vec<String>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: &str, factory: F) -> &mut Self
    where
        F: Fn(&Settings) -> Result<Arc<dyn Plugin>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.retain(|(existing, _)| existing != id);
        self.factories.push((id.to_string(), Arc::new(factory)));
        self
    }

    /// Set the list the `default` sentinel expands to
    pub fn set_defaults(&mut self, ids: &[&str]) -> &mut Self {
        self.defaults = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(id, _)| id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.iter().any(|(existing, _)| existing == id)
    }

    /// Configured identifiers, expanded and filtered
    pub fn registration_list(&self, settings: &Settings) -> Vec<String> {
        registration_list(&settings.hooks, &self.defaults, &settings.disabled_hooks)
    }

    /// Construct one plugin by identifier
    pub fn resolve(&self, id: &str, settings: &Settings) -> Result<Arc<dyn Plugin>, ConfigError> {
        match self.factories.iter().find(|(existing, _)| existing == id) {
            Some((_, factory)) => factory(settings),
            None => Err(ConfigError::PluginNotFound {
                name: id.to_string(),
                searched: self.identifiers().map(str::to_string).collect(),
            }),
        }
    }

    /// Construct every configured plugin, failing on the first unknown one
    pub fn instantiate(&self, settings: &Settings) -> Result<Vec<Arc<dyn Plugin>>, ConfigError> {
        self.registration_list(settings)
            .iter()
            .map(|id| self.resolve(id, settings))
            .collect()
    }
}
