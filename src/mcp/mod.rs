//! MCP (Model Context Protocol) server exposing chat export as tools

pub mod handler;
pub use handler::ChatExportServer;

use crate::export::{ExportFormat, ExportOutcome, NotificationLog};
use rmcp::{ErrorData as McpError,
           handler::server::wrapper::Parameters,
           model::{CallToolResult, Content},
           tool,
           tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

/// Export tool parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportParams {
    /// URL of the conversation; the active tab is used when omitted
    #[serde(default)]
    pub url: Option<String>,

    /// Output format (default: pdf)
    #[serde(default)]
    pub format: ExportFormat,

    /// Directory to save into, overriding the configured one
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// Parameters of the read-only tools
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageParams {
    /// URL of the conversation; the active tab is used when omitted
    #[serde(default)]
    pub url: Option<String>,
}

/// Extract tool parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractParams {
    /// URL of the conversation; the active tab is used when omitted
    #[serde(default)]
    pub url: Option<String>,

    /// Expand collapsed messages first (default: true)
    #[serde(default = "default_true")]
    pub expand: bool,
}

fn default_true() -> bool {
    true
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

const BUSY: &str = "An export is already in progress; request ignored";

/// Answer for a request dropped because another one holds the page
fn ignored_while_busy(tool: &str) -> CallToolResult {
    log::info!("Export already in progress, ignoring {} request", tool);
    CallToolResult::success(vec![Content::text(BUSY)])
}

#[tool_router]
impl ChatExportServer {
    /// Export the conversation to a file
    #[tool(description = "Expand and export the chat conversation to a PDF, HTML or Markdown file")]
    async fn chat_export(&self, params: Parameters<ExportParams>) -> Result<CallToolResult, McpError> {
        let Ok(_busy) = self.busy().try_lock() else {
            return Ok(ignored_while_busy("chat_export"));
        };

        let params = params.0;
        let page = self.page(params.url).await?;
        let exporter = self.exporter(page, params.output_dir.map(PathBuf::from), Arc::new(NotificationLog::new()));

        match exporter.export(params.format).await {
            ExportOutcome::Completed(report) => json_result(&report),
            ExportOutcome::Skipped => Ok(ignored_while_busy("chat_export")),
            ExportOutcome::Failed(message) => Err(McpError::internal_error(
                format!("Failed to export chat: {}", message),
                None,
            )),
        }
    }

    /// Describe what is found on the page
    #[tool(description = "Report the chat container, message counts, collapsed messages and title found on the page")]
    async fn chat_inspect(&self, params: Parameters<PageParams>) -> Result<CallToolResult, McpError> {
        let page = self.page(params.0.url).await?;
        let exporter = self.exporter(page, None, Arc::new(NotificationLog::new()));

        let inspection = exporter
            .inspect()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(&inspection)
    }

    /// Return the conversation as structured messages
    #[tool(description = "Extract the chat conversation as JSON messages with sender, HTML content and metadata")]
    async fn chat_extract(&self, params: Parameters<ExtractParams>) -> Result<CallToolResult, McpError> {
        let Ok(_busy) = self.busy().try_lock() else {
            return Ok(ignored_while_busy("chat_extract"));
        };

        let params = params.0;
        let page = self.page(params.url).await?;
        let exporter = self.exporter(page, None, Arc::new(NotificationLog::new()));

        if params.expand {
            let expansion = exporter.expansion().expand_all(exporter.page()).await;
            if expansion.failed() > 0 {
                log::warn!("{} messages could not be expanded", expansion.failed());
            }
        }

        let content = exporter
            .extractor()
            .extract_all(exporter.page())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(&content)
    }
}
