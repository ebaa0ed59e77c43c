//! MCP protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to the MCP JSON-RPC protocol so the same
//! `search` and `read` tools are reachable over stdio and over Streamable
//! HTTP. Each session gets a clone of [`McpBridge`]; everything inside is
//! behind `Arc`, so all sessions share one archive handle.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::envelope::Envelope;
use crate::traits::{ToolContext, ToolRegistry};

#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { tools, ctx }
    }

    /// Convert a registry tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

/// Maps an envelope onto an MCP tool result.
///
/// Successes carry the payload as JSON text; failures are error results
/// carrying only the message, so clients see a protocol-level tool error
/// rather than a transport fault.
pub fn to_call_tool_result(envelope: &Envelope) -> CallToolResult {
    match envelope {
        Envelope::Success { result } => {
            let text = serde_json::to_string(result).unwrap_or_default();
            CallToolResult::success(vec![Content::text(text)])
        }
        Envelope::Failure { error } => {
            CallToolResult::error(vec![Content::text(error.message.clone())])
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "zim-reader".to_string(),
                title: Some("ZIM Reader".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Offline encyclopedia access. Use `search` to find articles by keyword, then \
                 `read` with a result's exact path to get the article as Markdown."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(|t| Self::to_mcp_tool(t.as_ref()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let ctx = self.ctx.with_cancel(context.ct.clone());
        let envelope = self.tools.call(&request.name, params, &ctx).await;
        Ok(to_call_tool_result(&envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zim_reader_core::ToolError;

    #[test]
    fn test_descriptors_are_read_only() {
        let registry = ToolRegistry::with_builtins();
        let tool = McpBridge::to_mcp_tool(registry.find("search").unwrap().as_ref());
        assert_eq!(tool.name, "search");
        assert_eq!(tool.input_schema["required"], serde_json::json!(["query"]));
        assert_eq!(tool.annotations.unwrap().read_only_hint, Some(true));
    }

    #[test]
    fn test_failure_maps_to_error_result() {
        let env = Envelope::failure(&ToolError::NotFound {
            path: "A/Nope".to_string(),
        });
        let result = to_call_tool_result(&env);
        assert_eq!(result.is_error, Some(true));

        let ok = to_call_tool_result(&Envelope::success(&serde_json::json!({ "results": [] })));
        assert_eq!(ok.is_error, Some(false));
    }
}
