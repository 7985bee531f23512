//! Document renderers
//!
//! Message content arrives as sanitized HTML and is embedded as is, so structural markup (tables,
//! lists, code blocks, links) survives into HTML and PDF output unchanged. Markdown output
//! converts it with `html2md`.

use crate::chat::{ChatContent, Message, Sender};
use crate::config::OutputConfig;
use crate::dom::html::{escape_attribute, escape_text};
use crate::error::{ExportError, Result};
use crate::export::ExportFormat;
use async_trait::async_trait;

/// Turns a conversation into a document
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Format this renderer produces
    fn format(&self) -> ExportFormat;

    /// Render the conversation under the given display title
    async fn render(&self, content: &ChatContent, title: &str) -> Result<Vec<u8>>;
}

/// Converts a standalone HTML document into a paginated binary document
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, html: &str) -> Result<Vec<u8>>;
}

/// Headings used for each sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderLabels {
    pub user: String,
    pub agent: String,
}

impl SenderLabels {
    pub fn from_output(output: &OutputConfig) -> Self {
        Self {
            user: output.user_label.clone(),
            agent: output.agent_label.clone(),
        }
    }

    pub fn label(&self, sender: Sender) -> &str {
        match sender {
            Sender::User => &self.user,
            Sender::Agent => &self.agent,
        }
    }
}

impl Default for SenderLabels {
    fn default() -> Self {
        Self::from_output(&OutputConfig::default())
    }
}

fn export_line(content: &ChatContent) -> String {
    let stats = content.metadata();
    format!(
        "Exported {} · {} messages",
        content.timestamp().format("%Y-%m-%d %H:%M"),
        stats.total_messages
    )
}

/// Markdown document with one section per message
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    labels: SenderLabels,
}

impl MarkdownRenderer {
    pub fn new(labels: SenderLabels) -> Self {
        Self { labels }
    }

    fn message(&self, message: &Message, out: &mut String) {
        out.push_str(&format!("## {}\n\n", self.labels.label(message.sender())));
        if let Some(timestamp) = message.timestamp() {
            out.push_str(&format!("_{}_\n\n", timestamp));
        }
        out.push_str(html2md::parse_html(message.content()).trim());
        out.push_str("\n\n");
    }
}

#[async_trait]
impl Renderer for MarkdownRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Markdown
    }

    async fn render(&self, content: &ChatContent, title: &str) -> Result<Vec<u8>> {
        let mut out = format!("# {}\n\n_{}_\n\n", title, export_line(content));
        for (i, message) in content.messages().iter().enumerate() {
            if i > 0 {
                out.push_str("---\n\n");
            }
            self.message(message, &mut out);
        }
        Ok(out.into_bytes())
    }
}

const STYLESHEET: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; line-height: 1.5; color: #1f1f1f; max-width: 860px; margin: 0 auto; padding: 24px; }
header { border-bottom: 1px solid #ddd; margin-bottom: 24px; }
header .meta { color: #666; font-size: 0.9em; }
.message { margin: 0 0 20px; padding: 12px 16px; border-radius: 8px; page-break-inside: avoid; }
.message.user { background: #eef3fd; }
.message.agent { background: #f7f7f7; }
.message .sender { font-size: 0.85em; font-weight: 600; text-transform: uppercase; color: #555; margin: 0 0 8px; }
.message time { display: block; color: #888; font-size: 0.8em; margin-bottom: 8px; }
pre { background: #272822; color: #f8f8f2; padding: 12px; border-radius: 6px; overflow-x: auto; white-space: pre-wrap; }
code { font-family: "SFMono-Regular", Consolas, monospace; font-size: 0.9em; }
table { border-collapse: collapse; margin: 8px 0; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
img { max-width: 100%; }
"#;

/// Blocks every load except inline styles and embedded images
const OFFLINE_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline'; img-src data:";

/// Standalone styled HTML page
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    labels: SenderLabels,
    offline: bool,
}

impl HtmlRenderer {
    pub fn new(labels: SenderLabels) -> Self {
        Self { labels, offline: false }
    }

    /// Forbid the document from loading anything over the network
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Render the full document as a string
    pub fn document(&self, content: &ChatContent, title: &str) -> String {
        let title = escape_text(title);
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        if self.offline {
            out.push_str(&format!(
                "<meta http-equiv=\"Content-Security-Policy\" content=\"{}\">\n",
                OFFLINE_POLICY
            ));
        }
        out.push_str(&format!("<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n", title, STYLESHEET));
        out.push_str(&format!(
            "<header>\n<h1>{}</h1>\n<p class=\"meta\">{}</p>\n</header>\n<main>\n",
            title,
            escape_text(&export_line(content))
        ));

        for message in content.messages() {
            out.push_str(&format!(
                "<article class=\"message {}\">\n<h2 class=\"sender\">{}</h2>\n",
                message.sender(),
                escape_text(self.labels.label(message.sender()))
            ));
            if let Some(timestamp) = message.timestamp() {
                out.push_str(&format!(
                    "<time datetime=\"{}\">{}</time>\n",
                    escape_attribute(timestamp),
                    escape_text(timestamp)
                ));
            }
            out.push_str(&format!("<div class=\"content\">\n{}\n</div>\n</article>\n", message.content()));
        }

        out.push_str("</main>\n</body>\n</html>\n");
        out
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Html
    }

    async fn render(&self, content: &ChatContent, title: &str) -> Result<Vec<u8>> {
        Ok(self.document(content, title).into_bytes())
    }
}

/// Paginated document: the HTML rendering, rasterized
pub struct PdfRenderer<R: Rasterizer> {
    html: HtmlRenderer,
    rasterizer: R,
}

impl<R: Rasterizer> PdfRenderer<R> {
    pub fn new(labels: SenderLabels, rasterizer: R) -> Self {
        Self {
            html: HtmlRenderer::new(labels).offline(),
            rasterizer,
        }
    }
}

#[async_trait]
impl<R: Rasterizer> Renderer for PdfRenderer<R> {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    async fn render(&self, content: &ChatContent, title: &str) -> Result<Vec<u8>> {
        let document = self.html.document(content, title);
        let bytes = self.rasterizer.rasterize(&document).await?;
        if bytes.is_empty() {
            return Err(ExportError::RenderFailed("rasterizer produced an empty document".to_string()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn conversation() -> ChatContent {
        ChatContent::new(
            vec![
                Message::new(Sender::User, "<p>Show me a table</p>", None),
                Message::new(
                    Sender::Agent,
                    "<table><tr><th>a</th></tr><tr><td>1</td></tr></table><pre><code>let x = 1;</code></pre>",
                    Some("2024-05-01T10:00:00Z".to_string()),
                ),
            ],
            Local::now(),
        )
    }

    struct Echo;

    #[async_trait]
    impl Rasterizer for Echo {
        async fn rasterize(&self, html: &str) -> Result<Vec<u8>> {
            Ok(format!("%PDF-1.7\n{}", html).into_bytes())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Rasterizer for Rejecting {
        async fn rasterize(&self, _html: &str) -> Result<Vec<u8>> {
            Err(ExportError::RenderFailed("out of memory".to_string()))
        }
    }

    #[tokio::test]
    async fn test_html_keeps_markers() {
        let bytes = HtmlRenderer::default().render(&conversation(), "Tables & <code>").await.unwrap();
        let document = String::from_utf8(bytes).unwrap();

        assert!(document.contains("<title>Tables &amp; &lt;code&gt;</title>"));
        assert!(document.contains("<table><tr><th>a</th></tr>"));
        assert!(document.contains("<pre><code>let x = 1;</code></pre>"));
        assert!(document.contains("<article class=\"message user\">"));
        assert!(document.contains("<time datetime=\"2024-05-01T10:00:00Z\">"));
    }

    #[tokio::test]
    async fn test_markdown_sections() {
        let labels = SenderLabels {
            user: "Me".to_string(),
            agent: "Gemini".to_string(),
        };
        let bytes = MarkdownRenderer::new(labels).render(&conversation(), "Tables").await.unwrap();
        let markdown = String::from_utf8(bytes).unwrap();

        assert!(markdown.starts_with("# Tables\n"));
        assert!(markdown.contains("## Me\n\nShow me a table"));
        assert!(markdown.contains("## Gemini"));
        assert!(markdown.contains("let x = 1;"));
        assert_eq!(markdown.matches("\n---\n").count(), 1);
    }

    #[tokio::test]
    async fn test_pdf_passes_html_to_rasterizer() {
        let renderer = PdfRenderer::new(SenderLabels::default(), Echo);
        let bytes = renderer.render(&conversation(), "t").await.unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("%PDF"));
        assert!(text.contains("<table>"));
    }

    #[tokio::test]
    async fn test_print_document_loads_nothing_remote() {
        let content = ChatContent::new(
            vec![Message::new(Sender::Agent, "<img src=\"https://cdn.example/chart.png\">", None)],
            Local::now(),
        );

        let printed = PdfRenderer::new(SenderLabels::default(), Echo).render(&content, "t").await.unwrap();
        let printed = String::from_utf8(printed).unwrap();
        assert!(printed.contains(&format!("content=\"{}\"", OFFLINE_POLICY)));
        let policy_at = printed.find("Content-Security-Policy").unwrap();
        assert!(policy_at < printed.find("<img").unwrap());

        let saved = HtmlRenderer::default().document(&content, "t");
        assert!(!saved.contains("Content-Security-Policy"));
        assert!(saved.contains("https://cdn.example/chart.png"));
    }

    #[tokio::test]
    async fn test_pdf_rasterizer_rejection() {
        let renderer = PdfRenderer::new(SenderLabels::default(), Rejecting);
        let err = renderer.render(&conversation(), "t").await.unwrap_err();
        assert_eq!(err.to_string(), "Rendering failed: out of memory");
    }
}
