//! SQLite-backed [`Archive`] implementation.
//!
//! An archive file holds one `entries` row per path and, optionally, an
//! FTS5 table used for ranked search:
//!
//! ```text
//! entries(path TEXT PRIMARY KEY, title TEXT, mimetype TEXT,
//!         redirect_to TEXT NULL, content BLOB NULL)
//! entries_fts(path UNINDEXED, display_title UNINDEXED, title, body)   -- optional
//! ```
//!
//! Files are produced by [`crate::pack`]. Index presence is detected once
//! when the archive is opened.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};

use zim_reader_core::archive::{
    percent_score, Archive, ArchiveInfo, Entry, Item, Query, SearchHit, SearchResults, Searcher,
    MAX_REDIRECT_HOPS,
};

use crate::db;

/// Column weights for `bm25(entries_fts, ...)`: path, display_title, title, body.
const BM25_WEIGHTS: &str = "0.0, 0.0, 3.0, 1.0";

/// SQLite implementation of the [`Archive`] trait.
pub struct SqliteArchive {
    pool: SqlitePool,
    path: PathBuf,
    fulltext_index: bool,
}

impl SqliteArchive {
    /// Opens an archive file read-only and checks its layout.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self> {
        if !path.is_file() {
            bail!("archive file not found: {}", path.display());
        }

        let pool = db::connect_read_only(path, max_connections)
            .await
            .with_context(|| format!("Failed to open archive at {}", path.display()))?;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&pool)
                .await
                .with_context(|| format!("{} is not a SQLite database", path.display()))?;

        if !tables.iter().any(|t| t == "entries") {
            pool.close().await;
            bail!(
                "{} is not an archive (no entries table); build one with `zim-reader pack`",
                path.display()
            );
        }
        let fulltext_index = tables.iter().any(|t| t == "entries_fts");

        tracing::info!(
            archive = %path.display(),
            fulltext_index,
            "opened archive"
        );

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            fulltext_index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builds an FTS5 expression matching any of the query terms.
///
/// Terms are quoted so FTS5 operators in user text are taken literally.
fn fts_expression(query: &Query) -> String {
    query
        .terms()
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl Archive for SqliteArchive {
    fn has_fulltext_index(&self) -> bool {
        self.fulltext_index
    }

    async fn entry_by_path(&self, path: &str) -> Result<Option<Entry>> {
        let row = sqlx::query("SELECT path, redirect_to FROM entries WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Entry {
            path: r.get("path"),
            redirect: r.get("redirect_to"),
        }))
    }

    async fn load_item(&self, entry: &Entry, follow_redirects: bool) -> Result<Item> {
        let mut path = entry.path.clone();
        for _ in 0..=MAX_REDIRECT_HOPS {
            let row = sqlx::query(
                "SELECT mimetype, redirect_to, content FROM entries WHERE path = ?",
            )
            .bind(&path)
            .fetch_optional(&self.pool)
            .await?;

            let row = match row {
                Some(r) => r,
                None => bail!("redirect target '{}' does not exist", path),
            };

            let redirect: Option<String> = row.get("redirect_to");
            match redirect {
                Some(target) => {
                    if !follow_redirects {
                        bail!("entry '{}' is a redirect to '{}'", path, target);
                    }
                    tracing::debug!(from = %path, to = %target, "following redirect");
                    path = target;
                }
                None => {
                    let data: Option<Vec<u8>> = row.get("content");
                    return Ok(Item {
                        path,
                        mimetype: row.get("mimetype"),
                        data: data.unwrap_or_default(),
                    });
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
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteSearcher { conn }))
    }

    async fn describe(&self) -> Result<ArchiveInfo> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS entries,
                   COALESCE(SUM(CASE WHEN redirect_to IS NULL AND mimetype = 'text/html' THEN 1 ELSE 0 END), 0) AS articles,
                   COALESCE(SUM(CASE WHEN redirect_to IS NOT NULL THEN 1 ELSE 0 END), 0) AS redirects
            FROM entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ArchiveInfo {
            backend: "sqlite".to_string(),
            entry_count: row.get::<i64, _>("entries") as u64,
            article_count: row.get::<i64, _>("articles") as u64,
            redirect_count: row.get::<i64, _>("redirects") as u64,
            has_fulltext_index: self.fulltext_index,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!(archive = %self.path.display(), "closed archive");
    }
}

/// Holds one pooled connection for the duration of a search call.
struct SqliteSearcher {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl Searcher for SqliteSearcher {
    async fn search<'a>(&'a mut self, query: &Query) -> Result<Box<dyn SearchResults + 'a>> {
        let expr = fts_expression(query);

        let matches: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries_fts WHERE entries_fts MATCH ?")
                .bind(&expr)
                .fetch_one(&mut *self.conn)
                .await?;

        let best: Option<f64> = sqlx::query_scalar(&format!(
            "SELECT bm25(entries_fts, {BM25_WEIGHTS}) AS relevance FROM entries_fts \
             WHERE entries_fts MATCH ? ORDER BY relevance LIMIT 1"
        ))
        .bind(&expr)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(Box::new(SqliteResults {
            conn: &mut self.conn,
            expr,
            matches: matches.max(0) as u64,
            best: best.map(|b| -b).unwrap_or(0.0),
        }))
    }
}

struct SqliteResults<'a> {
    conn: &'a mut PoolConnection<Sqlite>,
    expr: String,
    matches: u64,
    /// Relevance of the top hit, as a positive number.
    best: f64,
}

#[async_trait]
impl SearchResults for SqliteResults<'_> {
    fn estimated_matches(&self) -> u64 {
        self.matches
    }

    async fn results(&mut self, offset: usize, count: usize) -> Result<Vec<SearchHit>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT path, display_title, bm25(entries_fts, {BM25_WEIGHTS}) AS relevance \
             FROM entries_fts WHERE entries_fts MATCH ? \
             ORDER BY relevance, path LIMIT ? OFFSET ?"
        ))
        .bind(&self.expr)
        .bind(count as i64)
        .bind(offset as i64)
        .fetch_all(&mut **self.conn)
        .await?;

        let best = self.best;
        Ok(rows
            .iter()
            .map(|row| {
                let relevance: f64 = row.get("relevance");
                SearchHit {
                    path: row.get("path"),
                    title: row.get("display_title"),
                    score: percent_score(-relevance, best),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_expression_quotes_terms() {
        let q = Query::parse("rust AND near(ownership)").unwrap();
        assert_eq!(
            fts_expression(&q),
            "\"rust\" OR \"and\" OR \"near\" OR \"ownership\""
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let err = SqliteArchive::open(Path::new("/nonexistent/archive.sqlite"), 1)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("archive file not found"));
    }

    #[tokio::test]
    async fn test_open_non_archive_database_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("other.sqlite");
        let pool = db::connect_for_write(&path).await.unwrap();
        sqlx::query("CREATE TABLE unrelated (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let err = SqliteArchive::open(&path, 1).await.err().unwrap();
        assert!(err.to_string().contains("not an archive"));
    }
}
