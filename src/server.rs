//! Transports: MCP over stdio, or an HTTP server.
//!
//! Without `--listen` the process speaks MCP on stdin/stdout. With it, an
//! axum server exposes the same tools over MCP Streamable HTTP and a plain
//! JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `*`    | `/mcp` | MCP Streamable HTTP endpoint |
//! | `GET`  | `/tools/list` | List tools with their parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool; body is the argument object |
//! | `GET`  | `/health` | Version and archive summary |
//!
//! # Error Contract
//!
//! `POST /tools/{name}` always answers with an envelope. Failures use the
//! HTTP status matching their code:
//!
//! ```json
//! { "error": { "code": "unsupported_content_type", "message": "Cannot read non-text article (mimetype: image/png)" } }
//! ```
//!
//! `bad_request` and `missing_index` (400), `not_found` (404), `cancelled`
//! (408), `unsupported_content_type` (415), everything else (500).

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use zim_reader_core::ArchiveInfo;

use crate::envelope::Envelope;
use crate::mcp::McpBridge;
use crate::traits::{ToolContext, ToolInfo, ToolRegistry};

/// Shared state for the HTTP route handlers.
#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Serves MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(tools: Arc<ToolRegistry>, ctx: ToolContext) -> anyhow::Result<()> {
    tracing::info!("serving MCP over stdio");
    let service = McpBridge::new(tools, ctx)
        .serve(rmcp::transport::stdio())
        .await
        .context("MCP handshake on stdio failed")?;
    let reason = service.waiting().await?;
    tracing::info!(?reason, "stdio session ended");
    Ok(())
}

/// Serves HTTP on `addr` until Ctrl-C.
pub async fn serve_http(
    addr: &str,
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let bridge = McpBridge::new(tools.clone(), ctx.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: shutdown.child_token(),
            ..Default::default()
        },
    );

    let app = router(tools, ctx).nest_service("/mcp", mcp_service);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal(tokio::signal::ctrl_c()).await;
            tracing::info!("ctrl_c received; shutting down");
            server_shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Resolves when `signal` fires. If the handler could not be installed the
/// error is logged and this never resolves, so the server keeps running.
async fn wait_for_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler; serving until killed");
        std::future::pending::<()>().await;
    }
}

/// Builds the JSON API routes (everything except `/mcp`).
fn router(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { tools, ctx })
}

/// HTTP status for a failure envelope code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "bad_request" | "missing_index" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "cancelled" => StatusCode::REQUEST_TIMEOUT,
        "unsupported_content_type" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = match self.error() {
            Some(err) => status_for_code(&err.code),
            None => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    archive: Option<ArchiveInfo>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let archive = match state.ctx.archive.describe().await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, "archive describe failed");
            None
        }
    };
    Json(HealthResponse {
        status: if archive.is_some() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        archive,
    })
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

/// Dispatches `POST /tools/{name}` through the registry.
///
/// The call is cancelled if the client goes away before it finishes.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Envelope {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let ctx = state.ctx.with_cancel(cancel);
    state.tools.call(&name, params, &ctx).await
}
