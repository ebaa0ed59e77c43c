//! Per-call error taxonomy.
//!
//! Every failure a tool call can produce is a [`ToolError`]. None of them
//! are fatal: the dispatcher turns each into a failure envelope and the
//! server keeps serving. The `Display` text is the message shown to the
//! caller, so it never carries backtraces or internal state.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// A required parameter is missing, mistyped, or out of range.
    #[error("{0}")]
    InvalidInput(String),

    #[error("no tool registered with name: {0}")]
    UnknownTool(String),

    #[error("This archive does not contain a full-text search index.")]
    MissingIndex,

    #[error("Failed to parse query: {0}")]
    QueryParse(String),

    #[error("Failed to initialize searcher: {0}")]
    Searcher(String),

    #[error("Search execution failed: {0}")]
    SearchExecution(String),

    #[error("Failed to retrieve results: {0}")]
    ResultRetrieval(String),

    #[error("Article not found for path '{path}'")]
    NotFound { path: String },

    #[error("Failed to load article item: {0}")]
    Load(String),

    #[error("Cannot read non-text article (mimetype: {mimetype})")]
    UnsupportedContentType { mimetype: String },

    #[error("Failed to convert HTML to Markdown: {0}")]
    Conversion(String),

    #[error("request cancelled")]
    Cancelled,

    /// A handler fault caught at the dispatcher boundary.
    #[error("tool '{0}' failed unexpectedly")]
    Internal(String),
}

impl ToolError {
    /// Machine-readable code placed next to the message in failure envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::InvalidInput(_) | ToolError::QueryParse(_) => "bad_request",
            ToolError::UnknownTool(_) | ToolError::NotFound { .. } => "not_found",
            ToolError::MissingIndex => "missing_index",
            ToolError::UnsupportedContentType { .. } => "unsupported_content_type",
            ToolError::Conversion(_) => "conversion_failed",
            ToolError::Cancelled => "cancelled",
            ToolError::Searcher(_)
            | ToolError::SearchExecution(_)
            | ToolError::ResultRetrieval(_)
            | ToolError::Load(_) => "tool_error",
            ToolError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_value() {
        let err = ToolError::NotFound {
            path: "A/Missing".to_string(),
        };
        assert_eq!(err.to_string(), "Article not found for path 'A/Missing'");

        let err = ToolError::UnsupportedContentType {
            mimetype: "image/png".to_string(),
        };
        assert!(err.to_string().contains("image/png"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(ToolError::MissingIndex.code(), "missing_index");
        assert_eq!(ToolError::InvalidInput("x".into()).code(), "bad_request");
        assert_eq!(ToolError::Internal("search".into()).code(), "internal");
        assert_eq!(ToolError::Load("boom".into()).code(), "tool_error");
    }
}
