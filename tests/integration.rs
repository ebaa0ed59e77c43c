//! End-to-end tests: pack a directory into a SQLite archive, open it, and
//! drive the tool dispatcher the way the transports do.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use zim_reader::config::Config;
use zim_reader::pack::{pack_directory, PackOptions};
use zim_reader::sqlite_archive::SqliteArchive;
use zim_reader::traits::{ToolContext, ToolRegistry};
use zim_reader_core::Archive;

const DOG_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>&lt;b&gt;Dog&lt;/b&gt;</title><style>p { color: red }</style></head>
<body>
<h1>Dog</h1>
<p>The dog is a domesticated descendant of the wolf. A dog is loyal.</p>
<figure><img src="../I/dog.png" alt="A sleeping dog"><figcaption></figcaption></figure>



<p>See <a href="Wolf.html">the wolf article</a> or <a href="https://en.wikipedia.org/wiki/Dog">Wikipedia</a>.</p>
<picture><source srcset="../I/dog.webp"><img src="../I/dog.png" alt="picture alt"></picture>
<svg width="10" height="10"><title>svg title</title><circle r="4"/></svg>
</body>
</html>"#;

const WOLF_HTML: &str = r#"<html><head><title>Wolf</title></head>
<body><p>The wolf is a large canine. Every dog descends from a wolf.</p></body></html>"#;

const CAT_HTML: &str = r#"<html><head><title>Cat</title></head>
<body><p>The cat is a small carnivorous mammal.</p></body></html>"#;

fn write_site(root: &Path) {
    fs::create_dir_all(root.join("A")).unwrap();
    fs::create_dir_all(root.join("I")).unwrap();
    fs::write(root.join("A/Dog.html"), DOG_HTML).unwrap();
    fs::write(root.join("A/Wolf.html"), WOLF_HTML).unwrap();
    fs::write(root.join("A/Cat.html"), CAT_HTML).unwrap();
    fs::write(root.join("A/notes.txt"), "Field notes\n\n\n\nabout a dog.").unwrap();
    fs::write(root.join("I/dog.png"), [0x89, b'P', b'N', b'G', 0, 1, 2]).unwrap();
    fs::write(
        root.join("redirects.tsv"),
        "# from\tto\nA/Doggo.html\tA/Dog.html\nA/Puppy.html\tA/Doggo.html\n",
    )
    .unwrap();
}

async fn packed_archive(fulltext_index: bool) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let site = tmp.path().join("site");
    write_site(&site);
    let out = tmp.path().join("wiki.sqlite");
    let opts = PackOptions {
        fulltext_index,
        ..Default::default()
    };
    pack_directory(&site, &out, &opts).await.unwrap();
    (tmp, out)
}

async fn context(path: &Path) -> ToolContext {
    let archive = SqliteArchive::open(path, 2).await.unwrap();
    ToolContext::new(Arc::new(archive), Arc::new(Config::default()))
}

#[tokio::test]
async fn test_pack_summary_and_describe() {
    let tmp = TempDir::new().unwrap();
    let site = tmp.path().join("site");
    write_site(&site);
    let out = tmp.path().join("wiki.sqlite");

    let summary = pack_directory(&site, &out, &PackOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.entries, 7);
    assert_eq!(summary.articles, 3);
    assert_eq!(summary.redirects, 2);
    assert_eq!(summary.indexed, 4);

    let archive = SqliteArchive::open(&out, 1).await.unwrap();
    let info = archive.describe().await.unwrap();
    assert_eq!(info.backend, "sqlite");
    assert_eq!(info.entry_count, 7);
    assert_eq!(info.article_count, 3);
    assert_eq!(info.redirect_count, 2);
    assert!(info.has_fulltext_index);
    archive.close().await;
}

#[tokio::test]
async fn test_pack_respects_excludes_and_force() {
    let tmp = TempDir::new().unwrap();
    let site = tmp.path().join("site");
    write_site(&site);
    let out = tmp.path().join("wiki.sqlite");

    let opts = PackOptions {
        exclude_globs: vec!["I/**".to_string()],
        ..Default::default()
    };
    let first = pack_directory(&site, &out, &opts).await.unwrap();
    assert_eq!(first.entries, 6);

    assert!(pack_directory(&site, &out, &opts).await.is_err());

    let forced = PackOptions {
        force: true,
        ..Default::default()
    };
    let second = pack_directory(&site, &out, &forced).await.unwrap();
    assert_eq!(second.entries, 7);
}

#[tokio::test]
async fn test_search_returns_sanitized_ranked_results() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;
    let tools = ToolRegistry::with_builtins();

    let env = tools.call("search", json!({ "query": "dog" }), &ctx).await;
    let results = env.result().expect("search succeeds")["results"]
        .as_array()
        .unwrap()
        .clone();

    assert!(results.len() >= 2);
    assert_eq!(results[0]["path"], "A/Dog.html");
    assert_eq!(results[0]["title"], "Dog");
    assert_eq!(results[0]["score"], 100);

    let scores: Vec<i64> = results.iter().map(|r| r["score"].as_i64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores.iter().all(|s| (0..=100).contains(s)));
}

#[tokio::test]
async fn test_search_count_bounds_results() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;
    let tools = ToolRegistry::with_builtins();

    let env = tools
        .call("search", json!({ "query": "dog wolf", "count": 1 }), &ctx)
        .await;
    assert_eq!(env.result().unwrap()["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_without_hits_is_empty_array() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("search", json!({ "query": "giraffe" }), &ctx)
        .await;
    assert_eq!(env.to_json(), json!({ "result": { "results": [] } }));
}

#[tokio::test]
async fn test_search_without_index_fails() {
    let (_tmp, path) = packed_archive(false).await;
    let ctx = context(&path).await;
    assert!(!ctx.archive.has_fulltext_index());

    let env = ToolRegistry::with_builtins()
        .call("search", json!({ "query": "dog" }), &ctx)
        .await;
    let err = env.error().unwrap();
    assert_eq!(err.code, "missing_index");
    assert_eq!(
        err.message,
        "This archive does not contain a full-text search index."
    );
}

#[tokio::test]
async fn test_search_tolerates_fts_syntax_in_query() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("search", json!({ "query": "dog AND \"wolf* NEAR(" }), &ctx)
        .await;
    assert!(!env.is_error(), "{:?}", env);
}

#[tokio::test]
async fn test_read_html_is_compact_markdown() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("read", json!({ "path": "A/Dog.html" }), &ctx)
        .await;
    let markdown = env.result().unwrap()["markdown"].as_str().unwrap().to_string();

    assert!(markdown.contains("domesticated descendant of the wolf"));
    assert!(markdown.contains("See the wolf article or [Wikipedia](https://en.wikipedia.org/wiki/Dog)."));
    assert!(!markdown.contains("dog.png"));
    assert!(!markdown.contains("sleeping"));
    assert!(!markdown.contains("picture alt"));
    assert!(!markdown.contains("svg title"));
    assert!(!markdown.contains("color: red"));
    assert!(!markdown.contains("[]("));
    assert!(!markdown.contains("\n\n\n"));
}

#[tokio::test]
async fn test_read_follows_redirect_chain() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;
    let tools = ToolRegistry::with_builtins();

    let direct = tools.call("read", json!({ "path": "A/Dog.html" }), &ctx).await;
    let via_chain = tools
        .call("read", json!({ "path": "A/Puppy.html" }), &ctx)
        .await;
    assert!(!via_chain.is_error());
    assert_eq!(direct, via_chain);
}

#[tokio::test]
async fn test_read_plain_text_is_unmodified() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("read", json!({ "path": "A/notes.txt" }), &ctx)
        .await;
    assert_eq!(
        env.result().unwrap()["markdown"],
        "Field notes\n\n\n\nabout a dog."
    );
}

#[tokio::test]
async fn test_read_binary_is_rejected() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("read", json!({ "path": "I/dog.png" }), &ctx)
        .await;
    let err = env.error().unwrap();
    assert_eq!(err.code, "unsupported_content_type");
    assert!(err.message.contains("image/png"));
    assert!(env.result().is_none());
}

#[tokio::test]
async fn test_read_missing_path() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;

    let env = ToolRegistry::with_builtins()
        .call("read", json!({ "path": "A/Unicorn.html" }), &ctx)
        .await;
    let err = env.error().unwrap();
    assert_eq!(err.code, "not_found");
    assert_eq!(err.message, "Article not found for path 'A/Unicorn.html'");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_archive() {
    let (_tmp, path) = packed_archive(true).await;
    let ctx = context(&path).await;
    let tools = Arc::new(ToolRegistry::with_builtins());

    let mut handles = Vec::new();
    for i in 0..16 {
        let tools = tools.clone();
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                tools.call("search", json!({ "query": "wolf" }), &ctx).await
            } else {
                tools.call("read", json!({ "path": "A/Doggo.html" }), &ctx).await
            }
        }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().is_error());
    }
}
