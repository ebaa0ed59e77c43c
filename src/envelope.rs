//! Uniform success/failure wrapper returned for every tool call.
//!
//! ```json
//! { "result": { "results": [ ... ] } }
//! { "error": { "code": "not_found", "message": "Article not found for path 'A/Nope'" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use zim_reader_core::ToolError;

/// Machine-readable code and human-readable message of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Success { result: Value },
    Failure { error: ErrorDetail },
}

impl Envelope {
    /// Wraps a payload. A payload that cannot be serialized becomes a failure.
    pub fn success<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(result) => Envelope::Success { result },
            Err(e) => Envelope::Failure {
                error: ErrorDetail {
                    code: "internal".to_string(),
                    message: format!("failed to encode result: {}", e),
                },
            },
        }
    }

    pub fn failure(err: &ToolError) -> Self {
        Envelope::Failure {
            error: ErrorDetail {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn from_result(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(result) => Envelope::Success { result },
            Err(e) => Self::failure(&e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Failure { .. })
    }

    /// The payload of a success envelope.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Envelope::Success { result } => Some(result),
            Envelope::Failure { .. } => None,
        }
    }

    /// The error detail of a failure envelope.
    pub fn error(&self) -> Option<&ErrorDetail> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Failure { error } => Some(error),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
