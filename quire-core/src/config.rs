//! Configuration parsing and management.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as Yaml};
use std::path::{Path, PathBuf};

/// Identifier that expands to the built-in plugin list
pub const DEFAULT_SENTINEL: &str = "default";

/// Default config file name looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "quire.yml";

/// Main configuration struct matching the quire.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Ordered plugin identifiers; `default` splices in the built-in list
    #[serde(default = "default_hooks")]
    pub hooks: Vec<String>,

    #[serde(default)]
    pub disabled_hooks: Vec<String>,

    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Regexes matched against content-relative paths
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Worker pool size; defaults to the available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Plugin-specific settings
    #[serde(flatten)]
    pub extra: Mapping,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory of the persistent cache; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_hooks() -> Vec<String> {
    vec![DEFAULT_SENTINEL.to_string()]
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_ttl_seconds() -> u64 {
    7 * 24 * 60 * 60
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".quire-cache")
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hooks: default_hooks(),
            disabled_hooks: Vec::new(),
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            ignore_patterns: Vec::new(),
            workers: None,
            cache: CacheSettings::default(),
            extra: Mapping::new(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_yaml(&contents)?;
        settings.attach(path);
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise fall back to defaults anchored at
    /// the directory the file would live in
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }
        tracing::debug!("No config at {:?}, using defaults", path);
        let mut settings = Self::default();
        settings.attach(path);
        Ok(settings)
    }

    /// Parse settings from YAML text; relative paths stay unresolved
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    fn attach(&mut self, path: &Path) {
        self.config_path = Some(path.to_path_buf());
        if self.cache.dir.is_none() {
            self.cache.dir = Some(default_cache_dir());
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Get the content directory, resolved relative to config file
    pub fn content_dir(&self) -> PathBuf {
        self.resolve_path(&self.content_dir)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    /// Get the persistent cache directory, if one is configured
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.dir.as_ref().map(|p| self.resolve_path(p))
    }

    /// Resolve an arbitrary path relative to the config file location
    pub fn resolve_relative(&self, path: &Path) -> PathBuf {
        self.resolve_path(path)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Get a setting by dotted path (e.g. "cache.ttl_seconds", "markdown.smart_punctuation")
    pub fn get(&self, key: &str) -> Option<Yaml> {
        let mut current = serde_yaml::to_value(self).ok()?;
        for part in key.split('.') {
            current = match current {
                Yaml::Mapping(mut map) => map.remove(part)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Typed view of [`Settings::get`]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_yaml::from_value(v).ok())
    }

    /// Set a setting by dotted path, creating intermediate mappings
    pub fn set(&mut self, key: &str, value: impl Into<Yaml>) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidSetting {
            key: key.to_string(),
            message,
        };

        let mut root = serde_yaml::to_value(&*self)?;
        let parts: Vec<&str> = key.split('.').collect();
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| invalid("empty key".into()))?;

        let mut node = &mut root;
        for part in parents {
            let Yaml::Mapping(map) = node else {
                return Err(invalid(format!("'{}' is not a mapping", part)));
            };
            node = map
                .entry(Yaml::from(*part))
                .or_insert_with(|| Yaml::Mapping(Mapping::new()));
        }
        match node {
            Yaml::Mapping(map) => {
                map.insert(Yaml::from(*last), value.into());
            }
            _ => return Err(invalid("parent is not a mapping".into())),
        }

        let config_path = self.config_path.take();
        let mut updated: Settings =
            serde_yaml::from_value(root).map_err(|e| invalid(e.to_string()))?;
        updated.config_path = config_path;
        *self = updated;
        Ok(())
    }
}
