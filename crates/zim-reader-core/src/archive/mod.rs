//! Archive accessor abstraction.
//!
//! The [`Archive`] trait is the capability set the search and read tools
//! are written against: index presence, entry lookup by path, item loading
//! with redirect following, and searcher creation. Any backend that
//! implements it (the in-memory archive below, the SQLite archive in the
//! application crate) can be swapped in without touching the tools.
//!
//! # Handle lifetimes
//!
//! | Handle | Owner | Released |
//! |--------|-------|----------|
//! | `Arc<dyn Archive>` | process | once, via [`Archive::close`] at shutdown |
//! | [`Entry`], [`Item`] | one `read` call | on drop |
//! | [`Searcher`], [`SearchResults`], [`Query`] | one `search` call | on drop |
//!
//! Per-call handles are plain owned values, so every exit path (including
//! `?` early returns) releases them.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use memory::InMemoryArchive;

/// Maximum number of redirect hops followed before a load is abandoned.
pub const MAX_REDIRECT_HOPS: usize = 32;

/// An addressable entry: a path plus what it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    /// Target path when this entry is a redirect.
    pub redirect: Option<String>,
}

impl Entry {
    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }
}

/// Resolved content of an entry, after any redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Path of the entry the content was loaded from.
    pub path: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

impl Item {
    /// The mimetype without parameters, lowercased (`text/html; charset=utf-8` → `text/html`).
    pub fn media_type(&self) -> String {
        self.mimetype
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }
}

/// A raw hit as reported by the search engine. The title may still
/// contain markup and entity escapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: i64,
}

/// Summary of an opened archive, shown by `info` and `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub backend: String,
    pub entry_count: u64,
    pub article_count: u64,
    pub redirect_count: u64,
    pub has_fulltext_index: bool,
}

/// A parsed, backend-neutral full-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    terms: Vec<String>,
}

impl Query {
    /// Parses user text into lowercase alphanumeric terms.
    ///
    /// Fails when the text contains nothing searchable (e.g. only
    /// punctuation), which callers surface as a query-parse error.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let terms: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            anyhow::bail!("no searchable terms in '{}'", text);
        }
        Ok(Self {
            text: text.to_string(),
            terms,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// Capability set of an opened archive.
///
/// Implementations are shared by every in-flight call, so all methods
/// take `&self`. Backends that are not safe for concurrent reads must
/// serialize internally around the native calls, never across a whole
/// tool invocation.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Whether the archive carries a full-text index. Callers must not
    /// create a searcher when this is false.
    fn has_fulltext_index(&self) -> bool;

    /// Looks up an entry by exact path. `Ok(None)` means no such entry.
    async fn entry_by_path(&self, path: &str) -> Result<Option<Entry>>;

    /// Loads the content behind `entry`.
    ///
    /// With `follow_redirects`, redirect chains are resolved (at most
    /// [`MAX_REDIRECT_HOPS`] hops) and the final target's content is
    /// returned. Without it, loading a redirect entry is an error.
    async fn load_item(&self, entry: &Entry, follow_redirects: bool) -> Result<Item>;

    /// Creates a searcher bound to this archive for one call.
    async fn searcher<'a>(&'a self) -> Result<Box<dyn Searcher + 'a>>;

    /// Summary counts for diagnostics.
    async fn describe(&self) -> Result<ArchiveInfo>;

    /// Releases the archive. Called once at shutdown.
    async fn close(&self) {}
}

/// A per-call search session.
#[async_trait]
pub trait Searcher: Send {
    /// Executes `query`, returning a handle to the ranked result set.
    async fn search<'a>(&'a mut self, query: &Query) -> Result<Box<dyn SearchResults + 'a>>;
}

/// A ranked result set produced by [`Searcher::search`].
#[async_trait]
pub trait SearchResults: Send {
    /// Total number of matching entries.
    fn estimated_matches(&self) -> u64;

    /// Returns up to `count` hits starting at `offset`, in descending
    /// relevance order.
    async fn results(&mut self, offset: usize, count: usize) -> Result<Vec<SearchHit>>;
}

/// Converts raw relevance values (higher is better) into integer
/// percentages relative to `best`.
///
/// Non-positive or non-finite `best` maps every hit to 100.
pub fn percent_score(raw: f64, best: f64) -> i64 {
    if !best.is_finite() || best <= 0.0 {
        return 100;
    }
    ((raw / best) * 100.0).round().clamp(0.0, 100.0) as i64
}
