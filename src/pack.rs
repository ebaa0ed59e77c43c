//! Archive packer: builds a SQLite archive from a directory tree.
//!
//! Every selected file becomes one entry whose path is the file's path
//! relative to the root (always `/`-separated). HTML and plain-text files
//! are added to the full-text index unless indexing is disabled.
//!
//! # Redirects
//!
//! A `redirects.tsv` file at the root adds redirect entries, one per line:
//!
//! ```text
//! # from            to
//! Doggo.html        Dog.html
//! ```
//!
//! # Usage
//!
//! ```bash
//! zim-reader pack ./site wiki.sqlite --exclude "drafts/**"
//! zim-reader pack ./site wiki-noindex.sqlite --no-index
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use zim_reader_core::sanitize::{sanitize_title, strip_tags};

use crate::db;

/// Name of the optional redirect list at the root of a packed directory.
pub const REDIRECTS_FILE: &str = "redirects.tsv";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>").unwrap()
});

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub fulltext_index: bool,
    pub force: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
            fulltext_index: true,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackSummary {
    pub entries: usize,
    pub articles: usize,
    pub redirects: usize,
    pub indexed: usize,
}

struct PackFile {
    path: String,
    title: String,
    mimetype: String,
    content: Vec<u8>,
}

/// Walks `root` and writes every selected file into a new archive at `out`.
pub async fn pack_directory(root: &Path, out: &Path, opts: &PackOptions) -> Result<PackSummary> {
    if !root.is_dir() {
        bail!("pack root is not a directory: {}", root.display());
    }
    if out.exists() && !opts.force {
        bail!(
            "output file already exists: {} (pass --force to overwrite)",
            out.display()
        );
    }

    let files = scan_directory(root, opts)?;
    let redirects = read_redirects(&root.join(REDIRECTS_FILE))?;

    let summary = write_staged(out, &files, &redirects, opts).await?;

    tracing::info!(
        out = %out.display(),
        entries = summary.entries,
        indexed = summary.indexed,
        "packed archive"
    );
    Ok(summary)
}

/// Sibling path the archive is built at before it replaces `out`.
fn staging_path(out: &Path) -> PathBuf {
    let mut name = out.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    out.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Builds the archive at a staging path and moves it over `out` only
/// once every row is committed. On failure nothing is left at either path.
async fn write_staged(
    out: &Path,
    files: &[PackFile],
    redirects: &[(String, String)],
    opts: &PackOptions,
) -> Result<PackSummary> {
    let staging = staging_path(out);
    remove_if_exists(&staging)?;

    let written = match db::connect_for_write(&staging).await {
        Ok(pool) => {
            let written = write_archive(&pool, files, redirects, opts).await;
            pool.close().await;
            written
        }
        Err(e) => Err(e),
    };

    match written {
        Ok(summary) => {
            remove_if_exists(out)?;
            std::fs::rename(&staging, out).with_context(|| {
                format!("Failed to move {} to {}", staging.display(), out.display())
            })?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(cleanup) = remove_if_exists(&staging) {
                tracing::warn!(error = %cleanup, "could not remove partial archive");
            }
            Err(e)
        }
    }
}

async fn write_archive(
    pool: &sqlx::SqlitePool,
    files: &[PackFile],
    redirects: &[(String, String)],
    opts: &PackOptions,
) -> Result<PackSummary> {
    create_schema(pool, opts.fulltext_index).await?;

    let mut summary = PackSummary::default();
    let mut tx = pool.begin().await?;

    let known: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();

    for file in files {
        sqlx::query(
            "INSERT INTO entries (path, title, mimetype, redirect_to, content) VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(&file.path)
        .bind(&file.title)
        .bind(&file.mimetype)
        .bind(&file.content)
        .execute(&mut *tx)
        .await?;
        summary.entries += 1;

        let is_html = file.mimetype == "text/html";
        if is_html {
            summary.articles += 1;
        }

        if opts.fulltext_index && (is_html || file.mimetype == "text/plain") {
            let text = String::from_utf8_lossy(&file.content);
            let body = if is_html { html_to_text(&text) } else { text.to_string() };
            sqlx::query(
                "INSERT INTO entries_fts (path, display_title, title, body) VALUES (?, ?, ?, ?)",
            )
            .bind(&file.path)
            .bind(&file.title)
            .bind(sanitize_title(&file.title))
            .bind(body)
            .execute(&mut *tx)
            .await?;
            summary.indexed += 1;
        }
    }

    for (from, to) in redirects {
        if known.contains(from.as_str()) {
            tracing::warn!(path = %from, "redirect shadows an existing file; skipped");
            continue;
        }
        if !known.contains(to.as_str()) && !redirects.iter().any(|(f, _)| f == to) {
            tracing::warn!(from = %from, to = %to, "redirect target not in archive");
        }
        let title = from.rsplit('/').next().unwrap_or(from);
        sqlx::query(
            "INSERT INTO entries (path, title, mimetype, redirect_to, content) VALUES (?, ?, '', ?, NULL)",
        )
        .bind(from)
        .bind(title)
        .bind(to)
        .execute(&mut *tx)
        .await?;
        summary.entries += 1;
        summary.redirects += 1;
    }

    tx.commit().await?;
    Ok(summary)
}

async fn create_schema(pool: &sqlx::SqlitePool, fulltext_index: bool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE entries (
            path TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            mimetype TEXT NOT NULL,
            redirect_to TEXT,
            content BLOB
        )
        "#,
    )
    .execute(pool)
    .await?;

    if fulltext_index {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE entries_fts USING fts5(
                path UNINDEXED,
                display_title UNINDEXED,
                title,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}

fn scan_directory(root: &Path, opts: &PackOptions) -> Result<Vec<PackFile>> {
    let include_set = build_globset(&opts.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), REDIRECTS_FILE.to_string()];
    default_excludes.extend(opts.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(read_file(path, rel_str)?);
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn read_file(path: &Path, relative: String) -> Result<PackFile> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mimetype = mimetype_for(path);

    let title = if mimetype == "text/html" {
        extract_title(&String::from_utf8_lossy(&content))
    } else {
        None
    }
    .unwrap_or_else(|| file_stem(path));

    Ok(PackFile {
        path: relative,
        title,
        mimetype,
        content,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Returns the raw (still escaped) contents of the first `<title>` element.
fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Flattens an HTML document into indexable text.
fn html_to_text(html: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let text = strip_tags(&without_code);
    html_escape::decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Guesses the stored mimetype from the file extension.
///
/// XHTML is stored as `text/html` and Markdown as `text/plain`, the two
/// types `read` renders.
pub fn mimetype_for(path: &Path) -> String {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    match guessed.essence_str() {
        "application/xhtml+xml" => "text/html".to_string(),
        "text/markdown" | "text/x-markdown" => "text/plain".to_string(),
        other => other.to_string(),
    }
}

/// Parses `from<TAB>to` lines. Blank lines and `#` comments are ignored.
fn read_redirects(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_redirects(&content)
}

fn parse_redirects(content: &str) -> Result<Vec<(String, String)>> {
    let mut redirects = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split('\t').map(str::trim).filter(|p| !p.is_empty());
        match (parts.next(), parts.next()) {
            (Some(from), Some(to)) => {
                if let Some(first) = first_seen.insert(from.to_string(), lineno + 1) {
                    bail!(
                        "{}:{}: duplicate redirect source '{}' (first listed on line {})",
                        REDIRECTS_FILE,
                        lineno + 1,
                        from,
                        first
                    );
                }
                redirects.push((from.to_string(), to.to_string()));
            }
            _ => bail!(
                "{}:{}: expected `from<TAB>to`, got '{}'",
                REDIRECTS_FILE,
                lineno + 1,
                line
            ),
        }
    }
    Ok(redirects)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Default output path next to the packed directory: `<dir>.sqlite`.
///
/// Paths without a final name component (`.`, `..`, `site/..`) are
/// canonicalized first so the output is named after the real directory.
pub fn default_output(root: &Path) -> Result<PathBuf> {
    let dir = match root.file_name() {
        Some(_) => root.to_path_buf(),
        None => std::fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve {}", root.display()))?,
    };
    let name = dir
        .file_name()
        .with_context(|| format!("Cannot name an archive after {}", root.display()))?;
    let mut file = name.to_os_string();
    file.push(".sqlite");
    Ok(dir.with_file_name(file))
}
