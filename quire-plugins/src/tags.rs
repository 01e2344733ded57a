//! Tag index and the `tags` subcommand.

use clap::{Arg, ArgMatches, Command};
use quire_core::{Engine, Hooks, Phase, Plugin, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Engine attribute mapping each tag to the slugs carrying it
pub const TAG_INDEX: &str = "tag_index";

pub struct TagsPlugin;

/// Tag → slugs (paths for documents without one), over documents that
/// are not skipped
pub fn build_index(engine: &Engine) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for doc in engine.store().all().iter().filter(|d| !d.skip) {
        let name = doc
            .slug()
            .map(str::to_string)
            .unwrap_or_else(|| doc.path().to_string_lossy().into_owned());
        for tag in doc.tags() {
            index.entry(tag.to_string()).or_default().push(name.clone());
        }
    }
    index
}

fn to_value(index: BTreeMap<String, Vec<String>>) -> Value {
    Value::Map(
        index
            .into_iter()
            .map(|(tag, slugs)| (tag, Value::from(slugs)))
            .collect(),
    )
}

fn list_tags(engine: &mut Engine, matches: &ArgMatches) -> anyhow::Result<()> {
    let index = engine.get_or_compute(TAG_INDEX)?;
    let index = index
        .as_map()
        .ok_or_else(|| anyhow::anyhow!("'{}' should be a map", TAG_INDEX))?;

    match matches.get_one::<String>("tag") {
        Some(tag) => {
            let docs = index
                .get(tag)
                .and_then(Value::as_list)
                .ok_or_else(|| anyhow::anyhow!("no documents tagged '{}'", tag))?;
            for doc in docs {
                println!("{}", doc);
            }
        }
        None => {
            for (tag, docs) in index {
                let count = docs.as_list().map_or(0, <[Value]>::len);
                println!("{} ({})", tag, count);
            }
        }
    }
    Ok(())
}

impl Plugin for TagsPlugin {
    fn name(&self) -> &str {
        "tags"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&[TAG_INDEX], Phase::PostRender);
        hooks.on(Phase::PostRender, |engine| {
            let index = build_index(engine);
            tracing::info!("Indexed {} tags", index.len());
            engine.set_attr(TAG_INDEX, to_value(index));
            Ok(())
        });
        hooks.on_commands(|_, surface| {
            surface.add(
                Command::new("tags")
                    .about("List tags, or the documents carrying one tag")
                    .arg(Arg::new("tag").help("Tag to list documents for")),
                list_tags,
            );
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{Document, Settings};

    #[test]
    fn test_index_groups_by_tag() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(TagsPlugin)];
        let mut engine = Engine::new(Settings::default(), plugins).unwrap();
        let mut draft = Document::new("draft.md", "").with("tags", vec!["rust"]);
        draft.skip = true;
        for doc in [
            Document::new("a.md", "").with("tags", vec!["rust", "web"]),
            Document::new("b.md", "").with("tags", vec!["rust"]),
            Document::new("c.md", ""),
            draft,
        ] {
            engine.add_document(doc).unwrap();
        }
        engine.set_slug(0, "a").unwrap();

        let index = engine.get_or_compute(TAG_INDEX).unwrap();
        let index = index.as_map().unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["rust"], Value::from(vec!["a", "b.md"]));
        assert_eq!(index["web"], Value::from(vec!["a"]));
        assert!(engine.has_run(Phase::PostRender));
    }

    #[test]
    fn test_registers_subcommand() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(TagsPlugin)];
        let mut engine = Engine::new(Settings::default(), plugins).unwrap();
        let surface = engine.register_commands().unwrap();
        assert_eq!(surface.len(), 1);
        assert!(surface.handler("tags").is_some());
    }
}
