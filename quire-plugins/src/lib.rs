//! # quire-plugins
//!
//! The plugins the `default` entry of the `hooks` setting expands to, and
//! the catalog the CLI resolves configured plugin identifiers against.
//!
//! | identifier | phase        | does                                      |
//! |------------|--------------|-------------------------------------------|
//! | `glob`     | glob         | discovers source files (`sources`)        |
//! | `loader`   | load         | reads frontmatter and bodies              |
//! | `slug`     | pre_render   | assigns slugs                             |
//! | `markdown` | render       | renders `html`, `headings`, `word_count`  |
//! | `tags`     | post_render  | builds `tag_index`, adds `quire tags`     |
//! | `writer`   | save         | writes pages and the index (`written`)    |
//! | `report`   | teardown     | logs a build summary                      |

pub mod glob;
pub mod loader;
pub mod markdown;
pub mod report;
pub mod slug;
pub mod tags;
pub mod writer;

pub use glob::GlobPlugin;
pub use loader::LoaderPlugin;
pub use markdown::{MarkdownPlugin, MarkdownRenderer, Rendered};
pub use report::ReportPlugin;
pub use slug::SlugPlugin;
pub use tags::TagsPlugin;
pub use writer::WriterPlugin;

use quire_core::{ConfigError, Plugin, PluginCatalog, Settings};
use serde_yaml::Value as Yaml;
use std::sync::Arc;

/// Identifiers spliced in at the `default` sentinel, in registration order
pub const DEFAULT_PLUGINS: &[&str] = &[
    "glob", "loader", "slug", "markdown", "tags", "writer", "report",
];

/// Catalog of every built-in plugin, with [`DEFAULT_PLUGINS`] as defaults
pub fn builtin_catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog
        .register("glob", |s| Ok(Arc::new(GlobPlugin::new(s)) as Arc<dyn Plugin>))
        .register("loader", |s| {
            Ok(Arc::new(LoaderPlugin::from_settings(s)?) as Arc<dyn Plugin>)
        })
        .register("slug", |_| Ok(Arc::new(SlugPlugin) as Arc<dyn Plugin>))
        .register("markdown", |s| {
            Ok(Arc::new(MarkdownPlugin::from_settings(s)?) as Arc<dyn Plugin>)
        })
        .register("tags", |_| Ok(Arc::new(TagsPlugin) as Arc<dyn Plugin>))
        .register("writer", |s| Ok(Arc::new(WriterPlugin::new(s)) as Arc<dyn Plugin>))
        .register("report", |_| Ok(Arc::new(ReportPlugin::new()) as Arc<dyn Plugin>))
        .set_defaults(DEFAULT_PLUGINS);
    catalog
}

/// Boolean plugin setting at a dotted path
pub(crate) fn bool_setting(settings: &Settings, key: &str, default: bool) -> Result<bool, ConfigError> {
    match settings.get(key) {
        None | Some(Yaml::Null) => Ok(default),
        Some(Yaml::Bool(value)) => Ok(value),
        Some(other) => Err(ConfigError::InvalidSetting {
            key: key.to_string(),
            message: format!("expected a boolean, found {:?}", other),
        }),
    }
}
