//! Error types for the build engine.

use quire_expr::ExprError;
use quire_types::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Error returned by plugin hooks.
///
/// Hooks are free to fail with anything; the engine wraps the error with the
/// plugin name and hook point before propagating it out of `run`.
pub type HookError = anyhow::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("plugin '{name}' not found (searched: {})", searched.join(", "))]
    PluginNotFound { name: String, searched: Vec<String> },

    #[error("Invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("expected exactly one post, found {count}")]
    TooManyPosts { count: usize },

    #[error("expected exactly one post, found none")]
    NoPosts,

    #[error("query resolved to no posts")]
    Empty,

    #[error(transparent)]
    Expression(#[from] ExprError),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("plugin '{plugin}' failed in {point}")]
    Hook {
        plugin: String,
        point: String,
        #[source]
        source: HookError,
    },

    #[error("no such attribute '{0}'")]
    NoSuchAttribute(String),

    #[error("attribute '{name}' was not produced by phase '{phase}'")]
    NotProduced { name: String, phase: Phase },

    #[error("'{0}' is a lifecycle hook, not an attribute")]
    HookName(String),

    #[error("cannot run to '{target}' while '{running}' is running")]
    Reentrant { target: Phase, running: Phase },

    #[error("duplicate document path {0:?}")]
    DuplicatePath(PathBuf),

    #[error("no document at index {0}")]
    NoSuchDocument(usize),

    #[error("slug of {path:?} is already '{current}', refusing '{requested}'")]
    SlugChanged {
        path: PathBuf,
        current: String,
        requested: String,
    },

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl BuildError {
    /// The error a hook failed with, if this is a hook failure
    pub fn hook_source(&self) -> Option<&HookError> {
        match self {
            BuildError::Hook { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from a persistent cache backend; logged, never fatal
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
