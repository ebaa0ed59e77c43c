//! Result models returned by the `search` and `read` tools.
//!
//! These are the payload shapes placed inside a success envelope. Field
//! names are part of the wire contract with MCP clients.

use serde::{Deserialize, Serialize};

/// A single ranked search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Display title with entities decoded and markup removed.
    pub title: String,
    /// Exact entry path as reported by the archive. Pass it to `read` unchanged.
    pub path: String,
    /// Relevance in `[0, 100]`.
    pub score: i64,
}

/// Response body of the `search` tool.
///
/// `results` is always serialized as an array, never `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

/// Response body of the `read` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub markdown: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_search_response_serializes_as_array() {
        let json = serde_json::to_value(SearchResponse::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "results": [] }));
    }

    #[test]
    fn test_result_item_field_names() {
        let item = SearchResultItem {
            title: "Dog".to_string(),
            path: "A/Dog".to_string(),
            score: 97,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "title": "Dog", "path": "A/Dog", "score": 97 })
        );
    }
}
