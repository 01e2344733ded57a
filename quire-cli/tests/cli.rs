use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Three documents: two published, one draft
fn fixture(config: &str) -> TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "quire.yml", config);
    write(
        dir.path(),
        "content/one.md",
        "---\ntitle: One\ndate: 2021-01-01\nstatus: published\ntags: [rust]\n---\n# One\n",
    );
    write(
        dir.path(),
        "content/two.md",
        "---\ntitle: Two\ndate: 2023-01-01\nstatus: draft\n---\n# Two\n",
    );
    write(
        dir.path(),
        "content/three.md",
        "---\ntitle: Three\ndate: 2022-01-01\nstatus: published\ntags: [rust, web]\n---\n# Three\n",
    );
    dir
}

fn quire(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("quire").unwrap();
    cmd.current_dir(dir.path()).env_remove("QUIRE_CONFIG");
    cmd
}

#[test]
fn build_writes_pages() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 3 files"));

    let one = fs::read_to_string(dir.path().join("public/one.html")).unwrap();
    assert!(one.contains("<h1 id=\"one\">One</h1>"));
    assert!(dir.path().join("public/three.html").exists());
    assert!(dir.path().join("public/index.html").exists());
    assert!(!dir.path().join("public/two.html").exists());
}

#[test]
fn build_can_stop_early() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .args(["build", "--to", "render"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ran through render (3 documents)"));
    assert!(!dir.path().join("public").exists());
}

#[test]
fn list_sorted_dates_as_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = fixture("hooks: [default]\n");

    let assert = quire(&dir)
        .args([
            "list",
            "--filter",
            "status == 'published'",
            "--sort",
            "date",
            "--reverse",
            "false",
            "--map",
            "date",
            "--json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value, serde_json::json!(["2021-01-01", "2022-01-01"]));
    Ok(())
}

#[test]
fn list_defaults_to_reversed_load_order() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .args(["list", "--map", "post.slug"])
        .assert()
        .success()
        .stdout("two\nthree\none\n");
}

#[test]
fn show_single_document() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .args(["show", "title == 'Three'", "--field", "slug"])
        .assert()
        .success()
        .stdout("three\n");
}

#[test]
fn show_reports_ambiguous_and_missing() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .args(["show", "status == 'published'"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 documents match"));

    quire(&dir)
        .args(["show", "status == 'archived'"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No document matches"));
}

#[test]
fn get_resolves_tag_index_lazily() -> Result<(), Box<dyn std::error::Error>> {
    let dir = fixture("hooks: [default]\n");

    let assert = quire(&dir).args(["get", "tag_index"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["rust"], serde_json::json!(["one", "three"]));
    assert_eq!(value["web"], serde_json::json!(["three"]));

    // Stops at post_render, so nothing is written
    assert!(!dir.path().join("public").exists());
    Ok(())
}

#[test]
fn get_unknown_attribute_fails() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .args(["get", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such attribute 'nonexistent'"));
}

#[test]
fn capabilities_lists_producers() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .arg("capabilities")
        .assert()
        .success()
        .stdout(predicate::str::contains("tag_index"))
        .stdout(predicate::str::contains("tags@post_render"))
        .stdout(predicate::str::contains("markdown@render"));
}

#[test]
fn tags_plugin_subcommand() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir)
        .arg("tags")
        .assert()
        .success()
        .stdout("rust (2)\nweb (1)\n");

    quire(&dir)
        .args(["tags", "web"])
        .assert()
        .success()
        .stdout("three\n");
}

#[test]
fn disabled_plugin_command_is_unknown() {
    let dir = fixture("hooks: [default]\ndisabled_hooks: [tags]\n");

    quire(&dir).arg("tags").assert().failure();
}

#[test]
fn unknown_plugin_fails_fast() {
    let dir = fixture("hooks: [default, sitemap]\n");

    quire(&dir)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin 'sitemap' not found"));
}

#[test]
fn cache_clear_removes_entries() {
    let dir = fixture("hooks: [default]\n");

    quire(&dir).arg("build").assert().success();
    quire(&dir)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("2 entries"));

    quire(&dir)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout("Removed 2 cache entries\n");
    quire(&dir)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0 entries"));
}
