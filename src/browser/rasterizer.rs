use crate::{error::{ExportError, Result},
            export::Rasterizer};
use async_trait::async_trait;
use headless_chrome::{types::PrintToPdfOptions, Browser};

/// Prints HTML documents to PDF in a scratch tab of a running browser
#[derive(Clone)]
pub struct ChromeRasterizer {
    browser: Browser,
}

impl ChromeRasterizer {
    pub fn new(browser: Browser) -> Self {
        Self { browser }
    }

    fn print(&self, html: &str) -> Result<Vec<u8>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ExportError::RenderFailed(format!("Failed to open print tab: {}", e)))?;

        let printed = (|| {
            tab.navigate_to("about:blank")
                .and_then(|tab| tab.wait_until_navigated())
                .map_err(|e| ExportError::RenderFailed(format!("Failed to prepare print tab: {}", e)))?;

            // Written in place; the document's own policy blocks remote loads
            let literal = serde_json::to_string(html)?;
            tab.evaluate(
                &format!("document.open(); document.write({}); document.close(); true", literal),
                false,
            )
            .map_err(|e| ExportError::RenderFailed(format!("Failed to load document: {}", e)))?;

            tab.print_to_pdf(Some(PrintToPdfOptions {
                print_background: Some(true),
                ..Default::default()
            }))
            .map_err(|e| ExportError::RenderFailed(e.to_string()))
        })();

        if let Err(e) = tab.close(true) {
            log::debug!("Failed to close print tab: {}", e);
        }
        printed
    }
}

#[async_trait]
impl Rasterizer for ChromeRasterizer {
    async fn rasterize(&self, html: &str) -> Result<Vec<u8>> {
        let rasterizer = self.clone();
        let html = html.to_string();
        tokio::task::spawn_blocking(move || rasterizer.print(&html))
            .await
            .map_err(|e| ExportError::RenderFailed(format!("print task failed: {}", e)))?
    }
}
