//! # quire-core
//!
//! Core library for the quire static site generator.
//!
//! This crate provides the lifecycle engine that plugins hook into, the
//! document store and its expression-driven query engine, site settings,
//! and the shared key/value cache and worker pool plugins build on.

pub mod cache;
pub mod capability;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod frontmatter;
pub mod plugin;
pub mod pool;
pub mod query;
pub mod slug;

pub use cache::{cache_key, CacheStats, CacheStore, CacheStoreExt, DiskStore, MemoryStore};
pub use capability::{CapabilityRegistry, Production};
pub use config::{CacheSettings, Settings, DEFAULT_CONFIG_FILE, DEFAULT_SENTINEL};
pub use document::{content_hash, Document, DocumentStore};
pub use engine::Engine;
pub use error::{BuildError, CacheError, ConfigError, HookError, QueryError};
pub use frontmatter::{parse_frontmatter, FrontmatterError};
pub use plugin::{
    is_hook_name, registration_list, CommandHandler, CommandSurface, HookPoint, HookTable, Hooks,
    Plugin, PluginCatalog, PluginFactory,
};
pub use pool::WorkerPool;
pub use query::{Query, QueryCache, QueryStats, ALWAYS};
pub use slug::{slug_from_path, slugify};

pub use quire_types::{Handle, Phase, Priority, Value};
