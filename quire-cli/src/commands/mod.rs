//! CLI command implementations.

pub mod attributes;
pub mod build;
pub mod cache;
pub mod plugin;
pub mod query;

pub use attributes::{get_attribute, list_capabilities};
pub use build::build_site;
pub use cache::{cache_stats, clear_cache};
pub use plugin::run_plugin_command;
pub use query::{list_documents, show_document, ListOptions};

use anyhow::{Context, Result};
use quire_core::{Engine, Settings};
use quire_plugins::builtin_catalog;
use std::path::Path;

/// Load settings and build an engine from the built-in plugin catalog
pub fn open_engine(config_path: &Path) -> Result<Engine> {
    tracing::debug!("Loading config from {:?}", config_path);
    let settings = Settings::load(config_path).context("Failed to load configuration")?;
    Engine::from_catalog(settings, &builtin_catalog()).context("Failed to set up plugins")
}
