//! End-to-end builds with the built-in plugins

use quire_core::{Engine, Phase, Settings, Value};
use quire_plugins::builtin_catalog;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn site(root: &Path, config: &str) -> Settings {
    write(root, "quire.yml", config);
    write(
        root,
        "content/hello.md",
        "---\ntitle: Hello\ndate: 2021-01-01\nstatus: published\ntags: [intro, rust]\n---\n# Hello\n\nFirst post.\n",
    );
    write(
        root,
        "content/notes/second.md",
        "---\ntitle: Second\ndate: 2022-06-01\nstatus: published\ntags: [rust]\n---\nMore words here.\n",
    );
    write(
        root,
        "content/wip.md",
        "---\ntitle: Work in progress\ndate: 2023-01-01\nstatus: draft\n---\nNot yet.\n",
    );
    write(root, "content/ignored/skip-me.md", "# ignored\n");
    Settings::load(root.join("quire.yml")).unwrap()
}

const CONFIG: &str = "\
hooks: [default]
ignore_patterns: ['^ignored/']
workers: 2
site:
  title: Test Site
";

#[test]
fn test_full_build_writes_site() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), CONFIG);
    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();

    engine.build().unwrap();

    let out = dir.path().join("public");
    let hello = fs::read_to_string(out.join("hello.html")).unwrap();
    assert!(hello.contains("<h1 id=\"hello\">Hello</h1>"));
    assert!(out.join("notes-second.html").exists());
    assert!(!out.join("wip.html").exists());
    assert!(!out.join("ignored-skip-me.html").exists());

    let index = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("<title>Test Site</title>"));
    assert!(index.find("notes-second.html").unwrap() < index.find("hello.html").unwrap());

    assert_eq!(engine.store().len(), 3);
    assert_eq!(engine.attr("document_count"), Some(&Value::Int(3)));
    assert!(engine.has_run(Phase::Save));

    engine.teardown().unwrap();
    assert!(engine.is_torn_down());
}

#[test]
fn test_lazy_tag_index_stops_before_save() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), CONFIG);
    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();

    let index = engine.get_or_compute("tag_index").unwrap();
    let index = index.as_map().unwrap();
    assert_eq!(index["rust"], Value::from(vec!["hello", "notes-second"]));
    assert_eq!(index["intro"], Value::from(vec!["hello"]));

    assert!(engine.has_run(Phase::PostRender));
    assert!(!engine.has_run(Phase::Save));
    assert!(!dir.path().join("public").exists());
}

#[test]
fn test_queries_over_loaded_site() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), CONFIG);
    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();
    engine.run(Phase::Render).unwrap();

    let published = engine
        .query()
        .filter("status == 'published'")
        .sort("date")
        .reverse(false)
        .map("title")
        .unwrap();
    assert_eq!(published, vec![Value::from("Hello"), Value::from("Second")]);

    let draft = engine.query().filter("post.skip").one().unwrap();
    assert_eq!(engine.document(draft).unwrap().title(), Some("Work in progress"));

    let wordy = engine
        .query()
        .filter("post.get('word_count', 0) >= 3")
        .map("post.slug")
        .unwrap();
    assert_eq!(wordy, vec![Value::from("notes-second"), Value::from("hello")]);
}

#[test]
fn test_drafts_included_when_configured() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), &format!("{CONFIG}loader:\n  drafts: true\n"));
    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();
    engine.build().unwrap();

    assert!(dir.path().join("public/wip.html").exists());
}

#[test]
fn test_disabled_writer_leaves_no_output() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), "hooks: [default]\ndisabled_hooks: [writer]\n");
    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();
    engine.build().unwrap();

    assert!(!dir.path().join("public").exists());
    assert!(engine.attr("written").is_none());
}

#[test]
fn test_unknown_plugin_fails_fast() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), "hooks: [default, sitemap]\n");
    let err = Engine::from_catalog(settings, &builtin_catalog()).unwrap_err();
    assert!(err.to_string().starts_with("plugin 'sitemap' not found (searched: glob, loader"));
}

#[test]
fn test_rebuild_reuses_render_cache() {
    let dir = tempdir().unwrap();
    let settings = site(dir.path(), CONFIG);
    {
        let mut engine = Engine::from_catalog(settings.clone(), &builtin_catalog()).unwrap();
        engine.run(Phase::Render).unwrap();
    }

    let mut engine = Engine::from_catalog(settings, &builtin_catalog()).unwrap();
    engine.run(Phase::Render).unwrap();
    let stats = engine.cache().stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 0);
    assert!(dir.path().join(".quire-cache").is_dir());
}
