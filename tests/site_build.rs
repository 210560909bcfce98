//! End-to-end builds over a real content tree on disk.

use std::fs;
use std::path::Path;

use galley::config::Settings;
use galley::engine::Engine;
use galley::modules::{FrontMatter, Markdown, ReadFiles, WriteFiles};
use galley::pipeline::{Pipeline, PipelineCollection};

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn site_pipelines(content: &Path, dist: &Path) -> PipelineCollection {
    let mut pipelines = PipelineCollection::new();
    pipelines
        .add(
            Pipeline::new("content")
                .add(ReadFiles::with_extensions(content, &["md"]))
                .add(FrontMatter::new())
                .add(Markdown)
                .add(WriteFiles::with_extension(dist, "html")),
        )
        .unwrap();
    pipelines
        .add(
            Pipeline::new("assets")
                .add(ReadFiles::with_extensions(content, &["css"]))
                .add(WriteFiles::new(dist)),
        )
        .unwrap();
    pipelines
}

#[test]
fn markdown_tree_renders_to_an_html_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let content = tmp.path().join("content");
    let dist = tmp.path().join("dist");
    write(
        &content,
        "index.md",
        "+++\ntitle = \"Home\"\n+++\n# Welcome\n",
    );
    write(
        &content,
        "posts/first.md",
        "+++\ntitle = \"First\"\n+++\nSome *emphasis* here.\n",
    );
    write(&content, "style.css", "body { margin: 0 }\n");

    let mut engine = Engine::new(site_pipelines(&content, &dist), Settings::new());
    let report = engine.execute().unwrap();

    let home = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(home.contains("<h1>Welcome</h1>"));
    let post = fs::read_to_string(dist.join("posts/first.html")).unwrap();
    assert!(post.contains("<em>emphasis</em>"));
    let css = fs::read_to_string(dist.join("style.css")).unwrap();
    assert_eq!(css, "body { margin: 0 }\n");

    assert_eq!(report.documents, 3);
    assert_eq!(report.pipelines.len(), 2);
    assert_eq!(report.pipelines[0].name, "content");
    assert_eq!(report.pipelines[0].outputs, 2);
    assert_eq!(report.pipelines[1].outputs, 1);
}

#[test]
fn a_rebuild_hits_the_render_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let content = tmp.path().join("content");
    let dist = tmp.path().join("dist");
    write(&content, "index.md", "# Home\n");
    write(&content, "posts/first.md", "Some *emphasis* here.\n");

    let mut engine = Engine::new(site_pipelines(&content, &dist), Settings::new());
    let first = engine.execute().unwrap();
    assert_eq!(first.cache.hits, 0);
    assert_eq!(first.cache.misses, 2);

    // Unchanged sources: the second build re-renders nothing.
    let second = engine.execute().unwrap();
    assert_eq!(second.cache.hits, 2);
    assert_eq!(second.cache.misses, 2);
}

#[test]
fn front_matter_metadata_survives_to_the_published_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let content = tmp.path().join("content");
    let dist = tmp.path().join("dist");
    write(
        &content,
        "about.md",
        "+++\ntitle = \"About\"\nweight = 2\n+++\nHello.\n",
    );

    let mut engine = Engine::new(site_pipelines(&content, &dist), Settings::new());
    engine.execute().unwrap();

    let published = engine.registry().get("content").unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].get_as::<String>("title").unwrap(), "About");
    assert_eq!(published[0].get_as::<i64>("weight").unwrap(), 2);
}

#[test]
fn write_path_front_matter_overrides_the_target() {
    let tmp = tempfile::tempdir().unwrap();
    let content = tmp.path().join("content");
    let dist = tmp.path().join("dist");
    write(
        &content,
        "notes/draft.md",
        "+++\nwrite_path = \"hidden/draft.md\"\n+++\nBody\n",
    );

    let mut engine = Engine::new(site_pipelines(&content, &dist), Settings::new());
    engine.execute().unwrap();

    assert!(dist.join("hidden/draft.html").exists());
    assert!(!dist.join("notes/draft.html").exists());
}

#[test]
fn a_bad_source_file_fails_the_build_and_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let content = tmp.path().join("content");
    let dist = tmp.path().join("dist");
    write(&content, "good.md", "fine\n");
    write(&content, "bad.md", "+++\nnot == toml\n+++\nbody\n");

    let mut engine = Engine::new(site_pipelines(&content, &dist), Settings::new());
    let err = engine.execute().unwrap_err();

    let message = err.to_string();
    assert!(message.contains("bad.md"));
    assert!(message.contains("invalid front matter"));
    // Nothing published for the failed pipeline.
    assert!(engine.registry().get("content").is_none());
}
