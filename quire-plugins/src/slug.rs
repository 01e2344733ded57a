//! Slug assignment.

use quire_core::{slug_from_path, slugify, Engine, Hooks, Phase, Plugin, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Gives every document a slug before rendering
///
/// A `slug` frontmatter field wins over the source path. Slugs must be
/// unique among documents that are not skipped.
pub struct SlugPlugin;

fn assign_slugs(engine: &mut Engine) -> anyhow::Result<()> {
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for index in 0..engine.store().len() {
        let Some(doc) = engine.document(index) else {
            continue;
        };
        let slug = match doc.slug() {
            Some(existing) => existing.to_string(),
            None => doc
                .get("slug")
                .and_then(Value::as_str)
                .map(slugify)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| slug_from_path(doc.path())),
        };

        if !doc.skip {
            if let Some(other) = seen.get(&slug) {
                tracing::warn!("Duplicate slug: {}", slug);
                anyhow::bail!(
                    "duplicate slug '{}' for {} and {}",
                    slug,
                    other.display(),
                    doc.path().display()
                );
            }
            seen.insert(slug.clone(), doc.path().to_path_buf());
        }

        engine.set_slug(index, slug)?;
    }
    Ok(())
}

impl Plugin for SlugPlugin {
    fn name(&self) -> &str {
        "slug"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&["slug"], Phase::PreRender);
        hooks.on_first(Phase::PreRender, assign_slugs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{Document, Settings};

    fn engine_with(docs: Vec<Document>) -> Engine {
        let mut engine = Engine::new(Settings::default(), Vec::new()).unwrap();
        for doc in docs {
            engine.add_document(doc).unwrap();
        }
        engine
    }

    #[test]
    fn test_slugs_from_path_and_frontmatter() {
        let mut engine = engine_with(vec![
            Document::new("notes/First Post.md", ""),
            Document::new("b.md", "").with("slug", "Custom Slug"),
        ]);
        assign_slugs(&mut engine).unwrap();

        assert_eq!(engine.document(0).unwrap().slug(), Some("notes-first-post"));
        assert_eq!(engine.document(1).unwrap().slug(), Some("custom-slug"));
    }

    #[test]
    fn test_assignment_is_repeatable() {
        let mut engine = engine_with(vec![Document::new("a.md", "")]);
        assign_slugs(&mut engine).unwrap();
        assign_slugs(&mut engine).unwrap();
        assert_eq!(engine.document(0).unwrap().slug(), Some("a"));
    }

    #[test]
    fn test_duplicate_slug_fails() {
        let mut engine = engine_with(vec![
            Document::new("a.md", ""),
            Document::new("b.md", "").with("slug", "a"),
        ]);
        let err = assign_slugs(&mut engine).unwrap_err();
        assert!(err.to_string().contains("duplicate slug 'a'"));
    }

    #[test]
    fn test_skipped_documents_may_share_slugs() {
        let mut draft = Document::new("draft.md", "").with("slug", "a");
        draft.skip = true;
        let mut engine = engine_with(vec![Document::new("a.md", ""), draft]);
        assign_slugs(&mut engine).unwrap();
        assert_eq!(engine.document(1).unwrap().slug(), Some("a"));
    }
}
