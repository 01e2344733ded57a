//! Frontmatter loading.
//!
//! Reads every discovered source on the worker pool, splits off its
//! frontmatter and appends one [`Document`] per source to the store, in
//! discovery order. Drafts are loaded but marked `skip` unless the
//! `loader.drafts` setting is true.

use crate::bool_setting;
use crate::glob::SOURCES;
use anyhow::Context as _;
use quire_core::frontmatter::parse_frontmatter;
use quire_core::{ConfigError, Document, Engine, Hooks, Phase, Plugin, Settings, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine attribute holding the number of loaded documents
pub const DOCUMENT_COUNT: &str = "document_count";

pub struct LoaderPlugin {
    include_drafts: bool,
}

impl LoaderPlugin {
    pub fn new(include_drafts: bool) -> Self {
        Self { include_drafts }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(bool_setting(settings, "loader.drafts", false)?))
    }

    fn load(&self, engine: &mut Engine) -> anyhow::Result<()> {
        let sources = match engine.get_or_compute(SOURCES)? {
            Value::List(sources) => sources,
            other => anyhow::bail!("'{}' should be a list, found {}", SOURCES, other.type_name()),
        };
        let paths: Vec<PathBuf> = sources
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect();

        let root = engine.settings().content_dir();
        let loaded = engine.pool().fan_out(paths, |rel| read_source(&root, &rel));

        let mut drafts = 0;
        for document in loaded {
            let mut document = document?;
            if !self.include_drafts && document.status() == Some("draft") {
                tracing::debug!("Skipping draft {}", document.path().display());
                document.skip = true;
                drafts += 1;
            }
            engine.add_document(document)?;
        }

        let count = engine.store().len();
        tracing::info!("Loaded {} documents ({} drafts skipped)", count, drafts);
        engine.set_attr(DOCUMENT_COUNT, count);
        Ok(())
    }
}

/// Read one source into a document; the title falls back to the file stem
fn read_source(root: &Path, rel: &Path) -> anyhow::Result<Document> {
    let full = root.join(rel);
    let content =
        fs::read_to_string(&full).with_context(|| format!("failed to read {}", full.display()))?;
    let (fields, body) = parse_frontmatter(&content)
        .with_context(|| format!("invalid frontmatter in {}", rel.display()))?;

    let mut document = Document::new(rel, body).with_fields(fields);
    let untitled = document.title().map_or(true, |t| t.trim().is_empty());
    if untitled {
        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());
        document.set("title", stem);
    }
    Ok(document)
}

impl Plugin for LoaderPlugin {
    fn name(&self) -> &str {
        "loader"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&[DOCUMENT_COUNT], Phase::Load);
        hooks.on(Phase::Load, move |engine| self.load(engine));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_source() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("post.md"),
            "---\ntitle: Hello\ntags: [a, b]\n---\nBody text\n",
        )
        .unwrap();

        let doc = read_source(dir.path(), Path::new("post.md")).unwrap();
        assert_eq!(doc.title(), Some("Hello"));
        assert_eq!(doc.tags(), vec!["a", "b"]);
        assert_eq!(doc.raw(), "Body text\n");
        assert_eq!(doc.path(), Path::new("post.md"));
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain-note.md"), "# No frontmatter\n").unwrap();

        let doc = read_source(dir.path(), Path::new("plain-note.md")).unwrap();
        assert_eq!(doc.title(), Some("plain-note"));
        assert_eq!(doc.raw(), "# No frontmatter\n");
    }

    #[test]
    fn test_bad_frontmatter_names_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.md"), "---\n- a\n- b\n---\nbody\n").unwrap();

        let err = read_source(dir.path(), Path::new("bad.md")).unwrap_err();
        assert!(err.to_string().contains("bad.md"));
    }
}
