//! Tool trait and the dispatcher registry.
//!
//! Every callable operation implements [`Tool`]. The [`ToolRegistry`] owns
//! the set of tools for the whole process and is the single entry point
//! used by every transport (MCP, HTTP, CLI):
//!
//! ```text
//!   call(name, params)
//!        │
//!        ├─ unknown name ──────────────► failure envelope (not_found)
//!        ├─ validate_params fails ─────► failure envelope (bad_request)
//!        ▼
//!   tokio::spawn(tool.execute)
//!        ├─ Ok(value) ─────────────────► success envelope
//!        ├─ Err(ToolError) ────────────► failure envelope (per-error code)
//!        └─ panic ─────────────────────► failure envelope (internal)
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use zim_reader::traits::{ToolContext, ToolRegistry};
//! # async fn example(ctx: ToolContext) {
//! let tools = ToolRegistry::with_builtins();
//! let envelope = tools
//!     .call("search", serde_json::json!({ "query": "dog" }), &ctx)
//!     .await;
//! println!("{}", envelope.to_json());
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use zim_reader_core::archive::Archive;
use zim_reader_core::{MarkdownPipeline, ToolError};

use crate::config::Config;
use crate::envelope::Envelope;
use crate::read::read_article;
use crate::schema::validate_params;
use crate::search::{resolve_count, search_archive};

/// A named operation that MCP clients can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier used in `tools/call` and `POST /tools/{name}`.
    fn name(&self) -> &str;

    /// One-line description shown to clients.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) describing accepted arguments.
    fn parameters_schema(&self) -> Value;

    /// Runs the tool with arguments already validated against
    /// [`parameters_schema`](Tool::parameters_schema), defaults injected.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Everything a tool needs to serve one call.
///
/// The archive, pipeline and config are shared by all calls; `cancel` is
/// per call and is fired by the transport when the client gives up.
#[derive(Clone)]
pub struct ToolContext {
    pub archive: Arc<dyn Archive>,
    pub pipeline: Arc<MarkdownPipeline>,
    pub config: Arc<Config>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(archive: Arc<dyn Archive>, config: Arc<Config>) -> Self {
        Self {
            archive,
            pipeline: Arc::new(MarkdownPipeline::default()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Same shared state, different cancellation signal.
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }
}

/// Tool descriptor as listed by `GET /tools/list` and the `tools` command.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Full-text search over the archive.
pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the offline archive for articles. Returns the top hits as a JSON array of \
         objects with title, path and score; pass a path to `read` to fetch the article."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The keyword or phrase to search for."
                },
                "count": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Number of results to return. Defaults to 20."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = params["query"].as_str().unwrap_or("");
        let requested = params
            .get("count")
            .and_then(|v| v.as_i64().or_else(|| v.as_u64().map(|_| i64::MAX)));
        let count = resolve_count(requested, &ctx.config.search)?;

        let response = search_archive(ctx.archive.as_ref(), query, count).await?;
        serde_json::to_value(&response).map_err(|_| ToolError::Internal(self.name().to_string()))
    }
}

/// Article retrieval as Markdown.
pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read an article from the offline archive by its exact path (as returned by `search`). \
         HTML is converted to compact Markdown; plain text is returned unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The exact path of the article, obtained from search."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = params["path"].as_str().unwrap_or("");
        let response =
            read_article(ctx.archive.as_ref(), &ctx.pipeline, path, &ctx.cancel).await?;
        serde_json::to_value(&response).map_err(|_| ToolError::Internal(self.name().to_string()))
    }
}

/// Registry of callable tools, shared read-only by every transport.
///
/// Use [`ToolRegistry::with_builtins`] for the standard `search` and
/// `read` tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry holding `search` and `read`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(ReadTool));
        registry
    }

    /// Register a tool. Lookups return the first tool registered under a name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(Arc::from(tool));
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Dispatches one call and always returns an envelope.
    ///
    /// The handler runs in its own task so that a panic inside it is
    /// contained and reported as an `internal` failure. Firing
    /// `ctx.cancel` aborts the task and yields a `cancelled` failure.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Envelope {
        let Some(tool) = self.find(name) else {
            tracing::debug!(tool = name, "unknown tool");
            return Envelope::failure(&ToolError::UnknownTool(name.to_string()));
        };

        let params = match validate_params(&tool.parameters_schema(), &params) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "rejected arguments");
                return Envelope::failure(&ToolError::InvalidInput(e.to_string()));
            }
        };

        let started = Instant::now();
        let task_tool = Arc::clone(tool);
        let task_ctx = ctx.clone();
        let mut handle =
            tokio::spawn(async move { task_tool.execute(params, &task_ctx).await });

        let joined = tokio::select! {
            biased;
            joined = &mut handle => joined,
            _ = ctx.cancel.cancelled() => {
                handle.abort();
                tracing::info!(tool = name, "call cancelled");
                return Envelope::failure(&ToolError::Cancelled);
            }
        };

        let envelope = match joined {
            Ok(result) => Envelope::from_result(result),
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tool task failed");
                Envelope::failure(&ToolError::Internal(name.to_string()))
            }
        };

        match envelope.error() {
            Some(err) => tracing::info!(
                tool = name,
                code = %err.code,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "call failed: {}",
                err.message
            ),
            None => tracing::info!(
                tool = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "call ok"
            ),
        }
        envelope
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
