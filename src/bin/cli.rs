//! chat-export command line
//!
//! Exports a chat conversation from a browser tab, or from a DOM snapshot saved earlier with
//! `chat-export snapshot`.

use anyhow::{Context, bail};
use chat_export::browser::{BrowserSession, ChromePage, ConnectionOptions, LaunchOptions};
use chat_export::config::ExportConfig;
use chat_export::export::{ConsoleAffordances, DirectorySink, ExportFormat, ExportOutcome, Exporter, PdfRenderer,
                          SenderLabels};
use chat_export::page::{MemoryPage, Page};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chat-export")]
#[command(version)]
#[command(about = "Export chat conversations to PDF, HTML or Markdown", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand, extract and save the conversation
    Export {
        #[command(flatten)]
        source: Source,

        /// Output format: pdf, html or markdown
        #[arg(long, short = 'f', default_value = "pdf")]
        format: ExportFormat,

        /// Directory to save into (default: from configuration, else the current directory)
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Show what is found on the page without changing it
    Inspect {
        #[command(flatten)]
        source: Source,
    },

    /// Save the page's DOM, shadow roots included, as JSON for offline export
    Snapshot {
        #[command(flatten)]
        browser: BrowserArgs,

        /// File to write
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct Source {
    #[command(flatten)]
    browser: BrowserArgs,

    /// Read a saved DOM snapshot instead of a live page
    #[arg(long, value_name = "FILE", conflicts_with_all = ["url", "ws_endpoint"])]
    snapshot: Option<PathBuf>,
}

#[derive(Args)]
struct BrowserArgs {
    /// Conversation URL; an open tab at this URL is reused
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// WebSocket endpoint of a running browser (default: launch one)
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// Persistent browser profile directory, for signed-in sessions
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,
}

impl BrowserArgs {
    fn session(&self) -> anyhow::Result<BrowserSession> {
        match &self.ws_endpoint {
            Some(endpoint) => Ok(BrowserSession::connect(ConnectionOptions::new(endpoint.clone()))?),
            None => {
                let mut options = LaunchOptions::new().headless(!self.headed);
                options.chrome_path = self.chrome_path.clone();
                options.user_data_dir = self.user_data_dir.clone();
                Ok(BrowserSession::launch(options)?)
            }
        }
    }

    fn page(&self, session: &BrowserSession) -> anyhow::Result<ChromePage> {
        match &self.url {
            Some(url) => Ok(session.open(url)?),
            None if self.ws_endpoint.is_some() => Ok(session.active_page()?),
            None => bail!("--url is required unless attaching to a running browser with --ws-endpoint"),
        }
    }
}

fn load_snapshot(path: &Path) -> anyhow::Result<MemoryPage> {
    let json = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(MemoryPage::from_json(&json)?)
}

async fn export<P: Page>(
    page: P,
    config: ExportConfig,
    format: ExportFormat,
    session: Option<&BrowserSession>,
) -> anyhow::Result<()> {
    let labels = SenderLabels::from_output(&config.output);
    let directory = config.output.directory.clone();
    let mut exporter = Exporter::new(page, config)
        .with_sink(Arc::new(DirectorySink::new(directory)))
        .with_affordances(Arc::new(ConsoleAffordances));
    if let Some(session) = session {
        exporter = exporter.with_renderer(PdfRenderer::new(labels, session.rasterizer()));
    }

    match exporter.export(format).await {
        ExportOutcome::Completed(report) => {
            println!("{}", report.path.display());
            Ok(())
        }
        ExportOutcome::Skipped => bail!("another export is already running"),
        ExportOutcome::Failed(message) => bail!("export failed: {}", message),
    }
}

async fn inspect<P: Page>(page: P, config: ExportConfig) -> anyhow::Result<()> {
    let inspection = Exporter::new(page, config).inspect().await?;
    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::default(),
    };

    match cli.command {
        Command::Export { source, format, output } => {
            if let Some(output) = output {
                config.output.directory = output;
            }
            config.validate()?;

            match &source.snapshot {
                Some(path) => {
                    let page = load_snapshot(path)?;
                    // Offline PDF still needs a browser to print with
                    let session = match format {
                        ExportFormat::Pdf => Some(source.browser.session()?),
                        _ => None,
                    };
                    export(page, config, format, session.as_ref()).await
                }
                None => {
                    let session = source.browser.session()?;
                    let page = source.browser.page(&session)?;
                    export(page, config, format, Some(&session)).await
                }
            }
        }
        Command::Inspect { source } => match &source.snapshot {
            Some(path) => inspect(load_snapshot(path)?, config).await,
            None => {
                let session = source.browser.session()?;
                inspect(source.browser.page(&session)?, config).await
            }
        },
        Command::Snapshot { browser, output } => {
            let session = browser.session()?;
            let tree = browser.page(&session)?.snapshot().await?;
            std::fs::write(&output, tree.to_json()?).with_context(|| format!("cannot write {}", output.display()))?;
            log::info!("Saved {} elements to {}", tree.count_elements(), output.display());
            Ok(())
        }
    }
}
