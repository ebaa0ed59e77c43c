//! Full-text search over the open archive.
//!
//! The operation is a thin shell around the backend's searcher: it checks
//! the index precondition, builds a [`Query`], asks for the first `count`
//! hits and sanitizes their titles. Hit order and scores are passed through
//! exactly as the backend reports them.

use zim_reader_core::archive::{Archive, Query};
use zim_reader_core::sanitize::sanitize_title;
use zim_reader_core::{SearchResponse, SearchResultItem, ToolError};

use crate::config::SearchConfig;

/// Resolves the caller's `count` against configured defaults and limits.
///
/// Absent → `default_count`; below 1 → input error; above `max_count` →
/// clamped.
pub fn resolve_count(requested: Option<i64>, cfg: &SearchConfig) -> Result<usize, ToolError> {
    let count = requested.unwrap_or(cfg.default_count);
    if count < 1 {
        return Err(ToolError::InvalidInput(format!(
            "count must be a positive integer, got {}",
            count
        )));
    }
    Ok(count.min(cfg.max_count) as usize)
}

/// Runs a ranked search and returns up to `count` sanitized results.
///
/// Per-call handles (searcher, result set) are dropped before returning on
/// every path, releasing any backend resources they hold.
pub async fn search_archive(
    archive: &dyn Archive,
    query: &str,
    count: usize,
) -> Result<SearchResponse, ToolError> {
    if !archive.has_fulltext_index() {
        return Err(ToolError::MissingIndex);
    }
    if query.trim().is_empty() {
        return Err(ToolError::InvalidInput("query must not be empty".to_string()));
    }

    let parsed = Query::parse(query).map_err(|e| ToolError::QueryParse(e.to_string()))?;

    let mut searcher = archive
        .searcher()
        .await
        .map_err(|e| ToolError::Searcher(e.to_string()))?;
    let mut results = searcher
        .search(&parsed)
        .await
        .map_err(|e| ToolError::SearchExecution(e.to_string()))?;
    let hits = results
        .results(0, count)
        .await
        .map_err(|e| ToolError::ResultRetrieval(e.to_string()))?;

    tracing::debug!(
        query = parsed.text(),
        estimated = results.estimated_matches(),
        returned = hits.len(),
        "search complete"
    );

    let results = hits
        .into_iter()
        .take(count)
        .map(|hit| SearchResultItem {
            title: sanitize_title(&hit.title),
            path: hit.path,
            score: hit.score,
        })
        .collect();

    Ok(SearchResponse { results })
}
