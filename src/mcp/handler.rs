use crate::{browser::{BrowserSession, ChromePage, LaunchOptions},
            config::ExportConfig,
            export::{DirectorySink, Exporter, NotificationLog, PdfRenderer, SenderLabels}};
use rmcp::{ErrorData as McpError,
           ServerHandler,
           handler::server::router::tool::ToolRouter,
           model::{Implementation, ServerCapabilities, ServerInfo},
           tool_handler};
use std::{path::PathBuf, sync::Arc};

/// MCP server exposing chat export over a shared browser session
#[derive(Clone)]
pub struct ChatExportServer {
    session: Arc<BrowserSession>,
    config: Arc<ExportConfig>,

    /// Held for the duration of anything that clicks on the page
    busy: Arc<tokio::sync::Mutex<()>>,

    pub(crate) tool_router: ToolRouter<Self>,
}

impl ChatExportServer {
    /// Serve over an existing browser session
    pub fn new(session: BrowserSession, config: ExportConfig) -> Self {
        Self {
            session: Arc::new(session),
            config: Arc::new(config),
            busy: Arc::new(tokio::sync::Mutex::new(())),
            tool_router: Self::tool_router(),
        }
    }

    /// Launch a browser and serve over it
    pub fn with_options(options: LaunchOptions, config: ExportConfig) -> crate::error::Result<Self> {
        Ok(Self::new(BrowserSession::launch(options)?, config))
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub(crate) fn busy(&self) -> &tokio::sync::Mutex<()> {
        &self.busy
    }

    /// The page to work on: the tab showing `url` if given, else the active tab
    pub(crate) async fn page(&self, url: Option<String>) -> Result<ChromePage, McpError> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || match url {
            Some(url) => session.open(&url),
            None => session.active_page(),
        })
        .await
        .map_err(|e| McpError::internal_error(format!("browser task failed: {}", e), None))?
        .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    /// An exporter for the page with PDF output through this browser
    pub(crate) fn exporter(
        &self,
        page: ChromePage,
        output_dir: Option<PathBuf>,
        ui: Arc<NotificationLog>,
    ) -> Exporter<ChromePage> {
        let config = ExportConfig::clone(&self.config);
        let directory = output_dir.unwrap_or_else(|| config.output.directory.clone());
        let pdf = PdfRenderer::new(SenderLabels::from_output(&config.output), self.session.rasterizer());

        Exporter::new(page, config)
            .with_renderer(pdf)
            .with_sink(Arc::new(DirectorySink::new(directory)))
            .with_affordances(ui)
    }
}

#[tool_handler]
impl ServerHandler for ChatExportServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Exports chat conversations open in the browser. chat_inspect shows what is found on the page, \
                 chat_extract returns the messages as JSON, chat_export saves a PDF, HTML or Markdown document."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
