//! In-memory [`Archive`] implementation for tests and embedding.
//!
//! Entries are added through `&mut self` before the archive is shared;
//! afterwards it is read-only and needs no locking. Search is a
//! brute-force term count over titles and tag-stripped text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::sanitize::strip_tags;

use super::{
    percent_score, Archive, ArchiveInfo, Entry, Item, Query, SearchHit, SearchResults, Searcher,
    MAX_REDIRECT_HOPS,
};

/// Title matches weigh more than body matches.
const TITLE_WEIGHT: f64 = 3.0;

enum Stored {
    Content { mimetype: String, data: Vec<u8> },
    Redirect { target: String },
}

struct StoredEntry {
    title: String,
    body: Stored,
}

/// In-memory archive for testing and embedding.
pub struct InMemoryArchive {
    entries: HashMap<String, StoredEntry>,
    fulltext_index: bool,
    searchers_created: AtomicUsize,
}

impl InMemoryArchive {
    /// Creates an empty archive with a full-text index.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fulltext_index: true,
            searchers_created: AtomicUsize::new(0),
        }
    }

    /// Drops or restores the full-text index.
    pub fn with_fulltext_index(mut self, enabled: bool) -> Self {
        self.fulltext_index = enabled;
        self
    }

    /// Adds a `text/html` article.
    pub fn add_article(&mut self, path: &str, title: &str, html: &str) -> &mut Self {
        self.add_resource(path, title, "text/html", html.as_bytes().to_vec())
    }

    /// Adds an entry with arbitrary mimetype and content.
    pub fn add_resource(
        &mut self,
        path: &str,
        title: &str,
        mimetype: &str,
        data: Vec<u8>,
    ) -> &mut Self {
        self.entries.insert(
            path.to_string(),
            StoredEntry {
                title: title.to_string(),
                body: Stored::Content {
                    mimetype: mimetype.to_string(),
                    data,
                },
            },
        );
        self
    }

    /// Adds a redirect entry pointing at `target`.
    pub fn add_redirect(&mut self, path: &str, title: &str, target: &str) -> &mut Self {
        self.entries.insert(
            path.to_string(),
            StoredEntry {
                title: title.to_string(),
                body: Stored::Redirect {
                    target: target.to_string(),
                },
            },
        );
        self
    }

    /// Number of searchers handed out so far.
    pub fn searchers_created(&self) -> usize {
        self.searchers_created.load(Ordering::SeqCst)
    }

    fn to_entry(path: &str, stored: &StoredEntry) -> Entry {
        Entry {
            path: path.to_string(),
            redirect: match &stored.body {
                Stored::Redirect { target } => Some(target.clone()),
                Stored::Content { .. } => None,
            },
        }
    }

    fn rank(&self, query: &Query) -> Vec<(String, String, f64)> {
        let mut scored: Vec<(String, String, f64)> = self
            .entries
            .iter()
            .filter_map(|(path, stored)| {
                let (mimetype, data) = match &stored.body {
                    Stored::Content { mimetype, data } => (mimetype, data),
                    Stored::Redirect { .. } => return None,
                };
                if !mimetype.starts_with("text/") {
                    return None;
                }
                let title = stored.title.to_lowercase();
                let text = strip_tags(&String::from_utf8_lossy(data)).to_lowercase();
                let raw: f64 = query
                    .terms()
                    .iter()
                    .map(|t| {
                        TITLE_WEIGHT * title.matches(t.as_str()).count() as f64
                            + text.matches(t.as_str()).count() as f64
                    })
                    .sum();
                (raw > 0.0).then(|| (path.clone(), stored.title.clone(), raw))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored
    }
}

impl Default for InMemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Archive for InMemoryArchive {
    fn has_fulltext_index(&self) -> bool {
        self.fulltext_index
    }

    async fn entry_by_path(&self, path: &str) -> Result<Option<Entry>> {
        Ok(self.entries.get(path).map(|s| Self::to_entry(path, s)))
    }

    async fn load_item(&self, entry: &Entry, follow_redirects: bool) -> Result<Item> {
        let mut path = entry.path.clone();
        for _ in 0..=MAX_REDIRECT_HOPS {
            let stored = match self.entries.get(&path) {
                Some(s) => s,
                None => bail!("redirect target '{}' does not exist", path),
            };
            match &stored.body {
                Stored::Content { mimetype, data } => {
                    return Ok(Item {
                        path,
                        mimetype: mimetype.clone(),
                        data: data.clone(),
                    })
                }
                Stored::Redirect { target } => {
                    if !follow_redirects {
                        bail!("entry '{}' is a redirect to '{}'", path, target);
                    }
                    path = target.clone();
                }
            }
        }
        bail!(
            "redirect chain starting at '{}' exceeds {} hops",
            entry.path,
            MAX_REDIRECT_HOPS
        )
    }

    async fn searcher<'a>(&'a self) -> Result<Box<dyn Searcher + 'a>> {
        if !self.fulltext_index {
            bail!("archive has no full-text index");
        }
        self.searchers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySearcher { archive: self }))
    }

    async fn describe(&self) -> Result<ArchiveInfo> {
        let redirects = self
            .entries
            .values()
            .filter(|e| matches!(e.body, Stored::Redirect { .. }))
            .count() as u64;
        let articles = self
            .entries
            .values()
            .filter(|e| matches!(&e.body, Stored::Content { mimetype, .. } if mimetype == "text/html"))
            .count() as u64;
        Ok(ArchiveInfo {
            backend: "memory".to_string(),
            entry_count: self.entries.len() as u64,
            article_count: articles,
            redirect_count: redirects,
            has_fulltext_index: self.fulltext_index,
        })
    }
}

struct MemorySearcher<'a> {
    archive: &'a InMemoryArchive,
}

#[async_trait]
impl Searcher for MemorySearcher<'_> {
    async fn search<'a>(&'a mut self, query: &Query) -> Result<Box<dyn SearchResults + 'a>> {
        let ranked = self.archive.rank(query);
        let best = ranked.first().map(|r| r.2).unwrap_or(0.0);
        let hits = ranked
            .into_iter()
            .map(|(path, title, raw)| SearchHit {
                path,
                title,
                score: percent_score(raw, best),
            })
            .collect();
        Ok(Box::new(MemoryResults { hits }))
    }
}

struct MemoryResults {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchResults for MemoryResults {
    fn estimated_matches(&self) -> u64 {
        self.hits.len() as u64
    }

    async fn results(&mut self, offset: usize, count: usize) -> Result<Vec<SearchHit>> {
        Ok(self.hits.iter().skip(offset).take(count).cloned().collect())
    }
}
