//! # chat-export
//!
//! Export chat conversations rendered in a Chromium tab to PDF, HTML or Markdown, driven over the
//! Chrome DevTools Protocol (CDP).
//!
//! Chat pages hide their turns behind custom elements with shadow roots and collapse long messages
//! until clicked. The exporter walks open shadow roots, expands every collapsed message one at a time,
//! extracts the conversation as sanitized HTML per message and hands it to a renderer.
//!
//! ## Features
//!
//! - **MCP Server**: `chat_inspect`, `chat_extract` and `chat_export` tools for AI agents
//! - **CLI**: `chat-export export --url <conversation> --format markdown`
//! - **Offline export**: snapshot a page once, export it later without a browser (HTML and Markdown)
//! - **Configurable layout**: selector chains with `>>>` shadow-root hops, loaded from JSON
//!
//! ## Running the MCP Server
//!
//! ```bash
//! # Attach to a browser you are signed in with
//! cargo run --bin chat-export-mcp --features mcp-server -- --ws-endpoint ws://127.0.0.1:9222/devtools/browser/<id>
//!
//! # Or launch one
//! cargo run --bin chat-export-mcp --features mcp-server -- --headed
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use chat_export::{BrowserSession, ExportConfig, ExportFormat, Exporter, LaunchOptions};
//!
//! # async fn run() -> chat_export::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let page = session.open("https://gemini.google.com/app/0123456789abcdef")?;
//!
//! let exporter = Exporter::new(page, ExportConfig::default());
//! let outcome = exporter.export(ExportFormat::Markdown).await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! Anything implementing [`Page`] can be exported; [`MemoryPage`] replays a saved [`DomTree`]:
//!
//! ```rust
//! use chat_export::{MemoryPage, Page};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> chat_export::Result<()> {
//! let page = MemoryPage::from_json(r#"{"tag_name": "body", "children": []}"#)?;
//! assert_eq!(page.snapshot().await?.count_elements(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: snapshot model, shadow-aware selector chains, HTML sanitization
//! - [`page`]: the [`Page`] seam and the in-memory implementation
//! - [`chat`]: locating units, sender classification, expansion and extraction
//! - [`export`]: title and filename, renderers, download sink, the export orchestrator
//! - [`browser`]: Chromium session, CDP-backed page and PDF printing
//! - [`config`]: layout, timing and output settings
//! - [`error`]: error types and result aliases
//! - [`mcp`]: Model Context Protocol server (requires `mcp-handler` feature)

pub mod browser;
pub mod chat;
pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod page;

#[cfg(feature = "mcp-handler")]
pub mod mcp;

pub use browser::{BrowserSession, ChromePage, ConnectionOptions, LaunchOptions};
pub use chat::{ChatContent, Message, PageLayout, Sender};
pub use config::ExportConfig;
pub use dom::{DomTree, ElementNode, SelectorPath};
pub use error::{ExportError, Result};
pub use export::{ExportFormat, ExportOutcome, ExportReport, Exporter};
pub use page::{MemoryPage, Page};

#[cfg(feature = "mcp-handler")]
pub use mcp::ChatExportServer;
#[cfg(feature = "mcp-handler")]
pub use rmcp::ServiceExt;
