//! Output writing.
//!
//! Every rendered document that is not skipped becomes
//! `<output_dir>/<slug>.html`; an `index.html` lists them newest first.

use anyhow::Context as _;
use quire_core::{Engine, Hooks, Phase, Plugin, Settings, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine attribute listing every file written
pub const WRITTEN: &str = "written";

const INDEX_FILTER: &str = "not post.skip and post.get('slug') != None";
const INDEX_ENTRY: &str = "[post.slug, post.get('title', post.slug)]";

pub struct WriterPlugin {
    site_title: String,
}

impl WriterPlugin {
    pub fn new(settings: &Settings) -> Self {
        Self {
            site_title: settings
                .get_as::<String>("site.title")
                .unwrap_or_else(|| "quire".to_string()),
        }
    }

    fn write_all(&self, engine: &mut Engine) -> anyhow::Result<()> {
        let out_dir = engine.settings().output_dir();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        let mut written = Vec::new();
        for doc in engine.store().all().iter().filter(|d| !d.skip) {
            let (Some(slug), Some(html)) = (doc.slug(), doc.html()) else {
                tracing::warn!("Not writing {}: no slug or html", doc.path().display());
                continue;
            };
            let title = doc.title().unwrap_or(slug);
            let path = out_dir.join(format!("{}.html", slug));
            write_file(&path, &page(title, html))?;
            written.push(path);
        }

        let entries = engine
            .query()
            .filter(INDEX_FILTER)
            .sort("date")
            .map(INDEX_ENTRY)?;
        let index_path = out_dir.join("index.html");
        write_file(&index_path, &self.index_page(&entries))?;
        written.push(index_path);

        tracing::info!("Wrote {} files to {}", written.len(), out_dir.display());
        let written: Vec<Value> = written
            .iter()
            .map(|p| Value::from(p.to_string_lossy().into_owned()))
            .collect();
        engine.set_attr(WRITTEN, written);
        Ok(())
    }

    fn index_page(&self, entries: &[Value]) -> String {
        let items: String = entries
            .iter()
            .filter_map(|entry| match entry.as_list()? {
                [slug, title] => Some(format!(
                    "<li><a href=\"{}.html\">{}</a></li>\n",
                    html_escape(&slug.to_string()),
                    html_escape(&title.to_string())
                )),
                _ => None,
            })
            .collect();
        page(&self.site_title, &format!("<ul>\n{}</ul>\n", items))
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<main>\n{}</main>\n</body>\n</html>\n",
        html_escape(title),
        body
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Paths recorded in the `written` attribute
pub fn written_paths(engine: &Engine) -> Vec<PathBuf> {
    engine
        .attr(WRITTEN)
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_str).map(PathBuf::from).collect())
        .unwrap_or_default()
}

impl Plugin for WriterPlugin {
    fn name(&self) -> &str {
        "writer"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&[WRITTEN], Phase::Save);
        hooks.on(Phase::Save, move |engine| self.write_all(engine));
    }
}
