//! Source discovery.

use quire_core::{Hooks, Phase, Plugin, Settings, Value};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Engine attribute holding content-relative source paths
pub const SOURCES: &str = "sources";

const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Walks the content directory for markdown sources
pub struct GlobPlugin {
    extensions: Vec<String>,
    ignore: Vec<Regex>,
}

impl GlobPlugin {
    pub fn new(settings: &Settings) -> Self {
        let extensions = settings
            .get_as::<Vec<String>>("glob.extensions")
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect());
        Self {
            extensions,
            ignore: compile_ignore_patterns(&settings.ignore_patterns),
        }
    }

    /// Content-relative paths of every source under `root`, sorted
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            tracing::warn!("Content directory {} does not exist", root.display());
            return Vec::new();
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let wanted = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));
            if !wanted {
                continue;
            }

            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy();
            if should_ignore(&rel_str, &self.ignore) {
                tracing::debug!("Ignoring {} due to ignore_patterns", rel_str);
                continue;
            }
            files.push(rel.to_path_buf());
        }
        files.sort();
        files
    }
}

impl Plugin for GlobPlugin {
    fn name(&self) -> &str {
        "glob"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        hooks.produces(&[SOURCES], Phase::Glob);
        hooks.on(Phase::Glob, move |engine| {
            let root = engine.settings().content_dir();
            let files = self.discover(&root);
            tracing::info!("Found {} source files in {}", files.len(), root.display());

            let sources: Vec<Value> = files
                .iter()
                .map(|p| Value::from(p.to_string_lossy().into_owned()))
                .collect();
            engine.set_attr(SOURCES, sources);
            Ok(())
        });
    }
}

fn compile_ignore_patterns(patterns: &[String]) -> Vec<Regex> {
    let mut compiled = Vec::new();
    for pat in patterns {
        match Regex::new(pat) {
            Ok(re) => compiled.push(re),
            Err(err) => tracing::warn!("Invalid ignore pattern '{}': {}", pat, err),
        }
    }
    compiled
}

fn should_ignore(path: &str, ignores: &[Regex]) -> bool {
    ignores.iter().any(|re| re.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# x").unwrap();
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "a.markdown");
        touch(dir.path(), "notes/c.md");
        touch(dir.path(), "image.png");
        touch(dir.path(), "drafts/wip.md");

        let mut settings = Settings::default();
        settings.ignore_patterns = vec!["^drafts/".into(), "(".into()];
        let plugin = GlobPlugin::new(&settings);

        let found = plugin.discover(dir.path());
        assert_eq!(
            found,
            vec![
                PathBuf::from("a.markdown"),
                PathBuf::from("b.md"),
                PathBuf::from("notes/c.md"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let plugin = GlobPlugin::new(&Settings::default());
        assert!(plugin.discover(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_custom_extensions() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.md");
        touch(dir.path(), "b.txt");

        let settings = Settings::from_yaml("glob:\n  extensions: [txt]\n").unwrap();
        let found = GlobPlugin::new(&settings).discover(dir.path());
        assert_eq!(found, vec![PathBuf::from("b.txt")]);
    }
}
