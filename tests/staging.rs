mod support;

use std::fs;

use bindery::{
    application::{
        entries::{ResolveError, resolve_entries},
        stage::{StageError, markdown::ComrakTransform, stage},
        theme::ThemeResolver,
    },
    domain::theme::ThemeLocation,
};
use serde_json::Value;
use tempfile::TempDir;

use support::resolve_in;

fn read_manifest(path: &std::path::Path) -> Value {
    let raw = fs::read_to_string(path).expect("read manifest");
    serde_json::from_str(&raw).expect("manifest is json")
}

#[test]
fn single_markdown_entry_stages_page_toc_and_manifest() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("intro.md"), "Plain paragraph without heading.\n").expect("write");

    let resolved = resolve_in(dir.path(), &["intro.md"]);
    let config = &resolved.config;
    let resolver = ThemeResolver::new(&config.context_dir);
    let publication =
        resolve_entries(config, &resolved.entries, &resolver).expect("entries resolve");
    let staged = stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    let root = dir.path().join(".bindery");
    let page = root.join("artifacts/intro.html");
    assert_eq!(staged.root, root);
    assert!(page.is_file());
    let html = fs::read_to_string(&page).expect("read page");
    assert!(html.contains("<p>Plain paragraph without heading.</p>"));

    let toc = fs::read_to_string(root.join("toc.html")).expect("read toc");
    assert!(toc.contains("<a href=\"artifacts/intro.html\">intro</a>"));

    let manifest = read_manifest(&root.join("manifest.json"));
    let reading_order = manifest["readingOrder"].as_array().expect("reading order");
    assert_eq!(reading_order.len(), 1);
    assert_eq!(reading_order[0]["href"], "artifacts/intro.html");
    assert_eq!(reading_order[0]["type"], "text/html");
    assert_eq!(manifest["resources"][0]["href"], "toc.html");
    assert_eq!(manifest["resources"][0]["rel"], "contents");
    assert_eq!(manifest["metadata"]["language"], "en");
    assert!(manifest["links"].as_array().expect("links").is_empty());
}

#[test]
fn remote_theme_is_referenced_but_never_copied() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("chapter.md"),
        "---\ntitle: Chapter One\ntheme: https://cdn.example.com/themes/paper.css\n---\n\n# Heading\n",
    )
    .expect("write");

    let resolved = resolve_in(dir.path(), &["chapter.md"]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");

    let theme = publication.themes.get("paper.css").expect("theme registered");
    assert!(matches!(theme.location, ThemeLocation::Remote(_)));
    assert_eq!(publication.entries[0].title.as_deref(), Some("Chapter One"));

    stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    let root = dir.path().join(".bindery");
    assert!(!root.join("paper.css").exists());
    let html = fs::read_to_string(root.join("artifacts/chapter.html")).expect("read page");
    assert!(html.contains("href=\"https://cdn.example.com/themes/paper.css\""));
    assert!(html.contains("<title>Chapter One</title>"));
}

#[test]
fn local_theme_is_copied_and_linked_relatively() {
    let dir = TempDir::new().expect("temp dir");
    fs::create_dir_all(dir.path().join("chapters")).expect("mkdir");
    fs::write(dir.path().join("chapters/one.md"), "# One\n").expect("write");
    fs::write(dir.path().join("book.css"), "body { color: black; }\n").expect("write css");

    let resolved = resolve_in(dir.path(), &["--theme", "book.css", "chapters/one.md"]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");
    stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    let root = dir.path().join(".bindery");
    assert_eq!(
        fs::read_to_string(root.join("book.css")).expect("staged theme"),
        "body { color: black; }\n"
    );
    let html = fs::read_to_string(root.join("artifacts/chapters/one.html")).expect("read page");
    assert!(html.contains("<link rel=\"stylesheet\" href=\"../../book.css\">"));
    assert!(html.contains("<title>One</title>"));

    let toc = fs::read_to_string(root.join("toc.html")).expect("read toc");
    assert!(toc.contains("href=\"book.css\""));
    assert!(toc.contains(">One</a>"));
}

#[test]
fn reading_order_follows_entry_order() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("b.md"), "# Bee\n").expect("write");
    fs::write(
        dir.path().join("a.html"),
        "<html><head><title>Ay</title></head><body></body></html>",
    )
    .expect("write");
    fs::write(
        dir.path().join("bindery.toml"),
        "entry = [\"b.md\", { path = \"a.html\", title = \"Override\" }]\ntoc = false\n",
    )
    .expect("write config");

    let resolved = resolve_in(dir.path(), &[]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");
    let staged = stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    assert_eq!(staged.entry_hrefs, vec!["artifacts/b.html", "artifacts/a.html"]);
    assert!(staged.toc_path.is_none());

    let manifest = read_manifest(&staged.manifest_path);
    assert!(manifest.get("resources").is_none());
    assert_eq!(manifest["readingOrder"][0]["title"], "Bee");
    assert_eq!(manifest["readingOrder"][1]["title"], "Override");
    assert_eq!(manifest["metadata"]["title"], "Bee");

    let copied = fs::read_to_string(dir.path().join(".bindery/artifacts/a.html")).expect("copy");
    assert!(copied.contains("<title>Ay</title>"));
}

#[test]
fn restaging_clears_previous_output() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("a.md"), "# A\n").expect("write");
    let stale = dir.path().join(".bindery/artifacts/stale.html");
    fs::create_dir_all(stale.parent().expect("parent")).expect("mkdir");
    fs::write(&stale, "old").expect("write stale");

    let resolved = resolve_in(dir.path(), &["a.md"]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");
    stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    assert!(!stale.exists());
    assert!(dir.path().join(".bindery/artifacts/a.html").is_file());
}

#[test]
fn duplicate_targets_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("a.md"), "# A\n").expect("write");

    let resolved = resolve_in(dir.path(), &["a.md", "./a.md"]);
    let err = resolve_entries(
        &resolved.config,
        &resolved.entries,
        &ThemeResolver::new(&resolved.config.context_dir),
    )
    .expect_err("duplicate target");
    assert!(matches!(err, ResolveError::DuplicateTarget { .. }));
}

#[test]
fn entries_outside_context_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let elsewhere = TempDir::new().expect("second temp dir");
    let outside = elsewhere.path().join("stray.md");
    fs::write(&outside, "# Stray\n").expect("write");

    let outside_arg = outside.display().to_string();
    let resolved = resolve_in(dir.path(), &[outside_arg.as_str()]);
    let err = resolve_entries(
        &resolved.config,
        &resolved.entries,
        &ThemeResolver::new(&resolved.config.context_dir),
    )
    .expect_err("outside context");
    assert!(matches!(err, ResolveError::OutsideContext { .. }));
}

#[test]
fn unsupported_and_missing_entries_fail() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("notes.txt"), "text").expect("write");

    let resolved = resolve_in(dir.path(), &["notes.txt"]);
    let resolver = ThemeResolver::new(&resolved.config.context_dir);
    let err = resolve_entries(&resolved.config, &resolved.entries, &resolver)
        .expect_err("unsupported");
    assert!(matches!(err, ResolveError::UnsupportedEntry { .. }));

    let resolved = resolve_in(dir.path(), &["absent.md"]);
    let err = resolve_entries(&resolved.config, &resolved.entries, &resolver)
        .expect_err("missing");
    assert!(matches!(err, ResolveError::MissingSource { .. }));
}

#[test]
fn staging_dir_holding_sources_is_refused_before_clearing() {
    let dir = TempDir::new().expect("temp dir");
    let chapters = dir.path().join("chapters");
    fs::create_dir_all(&chapters).expect("mkdir");
    let source = chapters.join("a.md");
    fs::write(&source, "# A\n").expect("write");

    let resolved = resolve_in(dir.path(), &["chapters/a.md", "--out-dir", "chapters"]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");

    let err = stage(config, &publication, &ComrakTransform::new()).expect_err("unsafe staging");
    assert!(matches!(
        &err,
        StageError::UnsafeStagingDir { staging, protected } if staging == &chapters && protected == &source
    ));
    assert_eq!(fs::read_to_string(&source).expect("source kept"), "# A\n");
}

#[test]
fn staging_dir_holding_local_theme_is_refused() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("a.md"), "# A\n").expect("write");
    let styles = dir.path().join("styles");
    fs::create_dir_all(&styles).expect("mkdir");
    fs::write(styles.join("book.css"), "body {}\n").expect("write css");

    let resolved = resolve_in(
        dir.path(),
        &["a.md", "--theme", "styles/book.css", "--out-dir", "styles"],
    );
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");

    let err = stage(config, &publication, &ComrakTransform::new()).expect_err("unsafe staging");
    assert!(matches!(err, StageError::UnsafeStagingDir { .. }));
    assert!(styles.join("book.css").is_file());
}

#[test]
fn reserved_characters_in_file_names_are_percent_encoded() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("c#1.md"), "# Sharp\n").expect("write");
    fs::write(dir.path().join("my notes.md"), "# Notes\n").expect("write");

    let resolved = resolve_in(dir.path(), &["c#1.md", "my notes.md"]);
    let config = &resolved.config;
    let publication = resolve_entries(
        config,
        &resolved.entries,
        &ThemeResolver::new(&config.context_dir),
    )
    .expect("entries resolve");
    let staged = stage(config, &publication, &ComrakTransform::new()).expect("staging succeeds");

    let root = dir.path().join(".bindery");
    assert!(root.join("artifacts/c#1.html").is_file());
    assert_eq!(
        staged.entry_hrefs,
        vec!["artifacts/c%231.html", "artifacts/my%20notes.html"]
    );

    let toc = fs::read_to_string(root.join("toc.html")).expect("read toc");
    assert!(toc.contains("<a href=\"artifacts/c%231.html\">Sharp</a>"));
    assert!(toc.contains("<a href=\"artifacts/my%20notes.html\">Notes</a>"));

    let manifest = read_manifest(&staged.manifest_path);
    assert_eq!(manifest["readingOrder"][0]["href"], "artifacts/c%231.html");
    assert_eq!(manifest["readingOrder"][1]["href"], "artifacts/my%20notes.html");
}
