//! Markdown rendering.
//!
//! Bodies are rendered on the worker pool. Results are cached in the
//! engine's key/value store under the renderer options and the document's
//! content hash, so unchanged documents skip pulldown-cmark on rebuilds.

use crate::bool_setting;
use quire_core::{
    cache_key, slugify, BuildError, CacheStoreExt, ConfigError, Engine, Hooks, Phase, Plugin,
    Settings, Value,
};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u32,
    pub title: String,
    pub id: String,
}

impl From<Heading> for Value {
    fn from(heading: Heading) -> Self {
        let mut map = BTreeMap::new();
        map.insert("level".to_string(), Value::Int(heading.level.into()));
        map.insert("title".to_string(), Value::Str(heading.title));
        map.insert("id".to_string(), Value::Str(heading.id));
        Value::Map(map)
    }
}

/// Output of rendering one document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    pub html: String,
    pub headings: Vec<Heading>,
    pub word_count: usize,
}

/// Markdown processor
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MarkdownRenderer {
    pub fn new(smart_punctuation: bool) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        if smart_punctuation {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        Self { options }
    }

    /// Identifies the rendering options in cache keys
    pub fn fingerprint(&self) -> String {
        format!("{:x}", self.options.bits())
    }

    /// Convert markdown to HTML, giving every heading an id
    pub fn render(&self, markdown: &str) -> Rendered {
        let events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();

        let headings = collect_headings(&events);
        let word_count = count_words(&events);
        let events = attach_heading_ids(events, &headings);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Rendered {
            html: html_output,
            headings,
            word_count,
        }
    }
}

fn collect_headings(events: &[Event]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut current: Option<(u32, String, Option<String>)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level as u32, String::new(), id.as_ref().map(|s| s.to_string())));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut title, _)) = current {
                    title.push_str(text.as_ref());
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title, explicit)) = current.take() {
                    let id = explicit.unwrap_or_else(|| {
                        let base = match slugify(&title) {
                            s if s.is_empty() => "section".to_string(),
                            s => s,
                        };
                        let seen = used.entry(base.clone()).or_insert(0);
                        *seen += 1;
                        match *seen {
                            1 => base,
                            n => format!("{}-{}", base, n - 1),
                        }
                    });
                    headings.push(Heading { level, title, id });
                }
            }
            _ => {}
        }
    }

    headings
}

fn attach_heading_ids<'a>(events: Vec<Event<'a>>, headings: &[Heading]) -> Vec<Event<'a>> {
    let mut ids = headings.iter();
    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let generated = ids.next();
                let id = id.or_else(|| generated.map(|h| CowStr::from(h.id.clone())));
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                })
            }
            other => other,
        })
        .collect()
}

fn count_words(events: &[Event]) -> usize {
    events
        .iter()
        .map(|event| match event {
            Event::Text(text) | Event::Code(text) => text.split_whitespace().count(),
            _ => 0,
        })
        .sum()
}

/// Renders every document that is not skipped
pub struct MarkdownPlugin {
    renderer: MarkdownRenderer,
}

impl MarkdownPlugin {
    pub fn new(renderer: MarkdownRenderer) -> Self {
        Self { renderer }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let smart = bool_setting(settings, "markdown.smart_punctuation", false)?;
        Ok(Self::new(MarkdownRenderer::new(smart)))
    }

    fn render_all(&self, engine: &mut Engine) -> anyhow::Result<()> {
        let pending: Vec<(usize, String, String)> = engine
            .store()
            .all()
            .iter()
            .enumerate()
            .filter(|(_, doc)| !doc.skip)
            .map(|(index, doc)| (index, doc.raw().to_string(), doc.content_hash().to_string()))
            .collect();

        let fingerprint = self.renderer.fingerprint();
        let cache = engine.cache();
        let rendered = engine.pool().fan_out(pending, |(index, raw, hash)| {
            let key = cache_key(&["markdown", &fingerprint, &hash]);
            if let Some(hit) = cache.get_json::<Rendered>(&key) {
                return (index, hit);
            }
            let output = self.renderer.render(&raw);
            cache.set_json(&key, &output, None);
            (index, output)
        });

        let count = rendered.len();
        for (index, output) in rendered {
            let doc = engine
                .document_mut(index)
                .ok_or(BuildError::NoSuchDocument(index))?;
            doc.set("html", output.html);
            doc.set("word_count", output.word_count);
            doc.set("headings", output.headings);
        }

        tracing::info!("Rendered {} documents", count);
        tracing::debug!("Render cache: {}", engine.cache().stats());
        Ok(())
    }
}

impl Plugin for MarkdownPlugin {
    fn name(&self) -> &str {
        "markdown"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&["html", "headings", "word_count"], Phase::Render);
        hooks.on(Phase::Render, move |engine| self.render_all(engine));
    }
}
