use crate::chat::{ChatStats, ContentExtractor, ExpandResult, ExpansionEngine, PageLayout, Sender, TreeLocator};
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::export::filename::{extract_title, generate_filename};
use crate::export::render::{HtmlRenderer, MarkdownRenderer, Renderer, SenderLabels};
use crate::export::sink::{DirectorySink, DownloadSink};
use crate::export::ui::{Affordances, ConsoleAffordances, NotificationKind};
use crate::export::ExportFormat;
use crate::page::Page;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Title used in the document when the page has no usable one
const UNTITLED: &str = "Chat export";

/// Where an export currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Expanding,
    Extracting,
    ResolvingTitle,
    Rendering,
    Failed,
}

/// What a finished export produced
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub filename: String,
    pub format: ExportFormat,
    pub title: Option<String>,
    pub bytes: usize,
    pub messages: ChatStats,
    pub expansion: ExpandResult,
}

/// Result of one export request
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Completed(ExportReport),

    /// Another export was already running; nothing was done
    Skipped,

    /// The export stopped at a failing stage; carries that stage's error message
    Failed(String),
}

impl ExportOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExportOutcome::Completed(_))
    }
}

/// What the locator sees on the page, read without changing anything
#[derive(Debug, Clone, Serialize)]
pub struct PageInspection {
    pub container_found: bool,
    pub units: usize,
    pub user_units: usize,
    pub agent_units: usize,
    pub collapsed: usize,
    pub title: Option<String>,
    pub anchor: String,
    pub elements: usize,
}

/// Runs the export pipeline against one page
///
/// Expansion, extraction, title resolution, rendering and delivery run in that order. At most one
/// export is in flight per exporter; a request made while one is running is dropped.
pub struct Exporter<P: Page> {
    page: P,
    config: ExportConfig,
    layout: Arc<PageLayout>,
    expansion: ExpansionEngine,
    extractor: ContentExtractor,
    renderers: HashMap<ExportFormat, Arc<dyn Renderer>>,
    sink: Arc<dyn DownloadSink>,
    ui: Arc<dyn Affordances>,
    state: Mutex<ExportState>,
    in_flight: AtomicBool,
}

impl<P: Page> Exporter<P> {
    /// Create an exporter with Markdown and HTML output, saving into the configured directory
    pub fn new(page: P, config: ExportConfig) -> Self {
        let layout = Arc::new(config.layout.clone());
        let labels = SenderLabels::from_output(&config.output);

        let mut renderers: HashMap<ExportFormat, Arc<dyn Renderer>> = HashMap::new();
        renderers.insert(ExportFormat::Markdown, Arc::new(MarkdownRenderer::new(labels.clone())));
        renderers.insert(ExportFormat::Html, Arc::new(HtmlRenderer::new(labels)));

        Self {
            page,
            expansion: ExpansionEngine::new(Arc::clone(&layout), &config.expansion),
            extractor: ContentExtractor::new(Arc::clone(&layout)),
            layout,
            renderers,
            sink: Arc::new(DirectorySink::new(config.output.directory.clone())),
            ui: Arc::new(ConsoleAffordances),
            state: Mutex::new(ExportState::Idle),
            in_flight: AtomicBool::new(false),
            config,
        }
    }

    /// Add or replace the renderer for its format
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.insert(renderer.format(), Arc::new(renderer));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DownloadSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_affordances(mut self, ui: Arc<dyn Affordances>) -> Self {
        self.ui = ui;
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn expansion(&self) -> &ExpansionEngine {
        &self.expansion
    }

    pub fn extractor(&self) -> &ContentExtractor {
        &self.extractor
    }

    /// Formats this exporter can produce
    pub fn formats(&self) -> Vec<ExportFormat> {
        let mut formats: Vec<ExportFormat> = self.renderers.keys().copied().collect();
        formats.sort_by_key(|f| f.extension());
        formats
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ExportState) {
        let mut current = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log::debug!("Export state {:?} -> {:?}", *current, state);
        *current = state;
    }

    /// Export the conversation in the given format
    ///
    /// Never returns an error: a failing stage is reported through one error notification and
    /// [`ExportOutcome::Failed`]. The button and loading indicator are restored on every exit.
    pub async fn export(&self, format: ExportFormat) -> ExportOutcome {
        let Some(_guard) = FlightGuard::acquire(self) else {
            log::info!("Export already in progress, ignoring request");
            return ExportOutcome::Skipped;
        };

        match self.run(format).await {
            Ok(report) => {
                self.ui.show_notification(
                    &format!(
                        "Chat exported: {} messages saved to {}",
                        report.messages.total_messages,
                        report.path.display()
                    ),
                    NotificationKind::Success,
                );
                ExportOutcome::Completed(report)
            }
            Err(e) => {
                self.set_state(ExportState::Failed);
                log::error!("Export failed: {}", e);
                self.ui
                    .show_notification(&format!("Failed to export chat: {}", e), NotificationKind::Error);
                ExportOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run(&self, format: ExportFormat) -> Result<ExportReport> {
        self.set_state(ExportState::Expanding);
        let expansion = self.expansion.expand_all(&self.page).await;
        if expansion.failed() > 0 {
            log::warn!("{} messages could not be expanded", expansion.failed());
        }

        self.set_state(ExportState::Extracting);
        let tree = self.page.snapshot().await?;
        let content = self.extractor.extract_from(&tree)?;
        if content.is_empty() {
            return Err(ExportError::NoMessages);
        }
        log::info!("Extracted {} messages", content.messages().len());

        self.set_state(ExportState::ResolvingTitle);
        let title = extract_title(&tree, &self.layout);
        let filename = generate_filename(title.as_deref(), format, &self.config.output);

        self.set_state(ExportState::Rendering);
        let renderer = self
            .renderers
            .get(&format)
            .ok_or_else(|| ExportError::RenderFailed(format!("no renderer available for {}", format)))?;
        let bytes = renderer.render(&content, title.as_deref().unwrap_or(UNTITLED)).await?;
        let path = self.sink.deliver(&filename, &bytes).await?;

        Ok(ExportReport {
            path,
            filename,
            format,
            title,
            bytes: bytes.len(),
            messages: content.metadata(),
            expansion,
        })
    }

    /// Report what the locator finds on the page
    pub async fn inspect(&self) -> Result<PageInspection> {
        let tree = self.page.snapshot().await?;
        let locator = TreeLocator::new(&self.layout);
        let units = locator.find_units(&tree);
        let user_units = units
            .iter()
            .filter(|unit| self.extractor.identify_sender(unit.element) == Sender::User)
            .count();

        Ok(PageInspection {
            container_found: locator.find_container(&tree).is_some(),
            units: units.len(),
            user_units,
            agent_units: units.len() - user_units,
            collapsed: self.expansion.collapsed_in(&tree).len(),
            title: extract_title(&tree, &self.layout),
            anchor: locator.find_anchor(&tree).to_simple_string(),
            elements: tree.count_elements(),
        })
    }
}

/// Holds the single export slot for the duration of one export
///
/// Taking the slot disables the button and shows the loading indicator. Dropping the guard undoes
/// both and frees the slot, whether the export finished, failed, panicked or was cancelled.
struct FlightGuard<'a, P: Page> {
    exporter: &'a Exporter<P>,
}

impl<'a, P: Page> FlightGuard<'a, P> {
    fn acquire(exporter: &'a Exporter<P>) -> Option<Self> {
        exporter
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        exporter.ui.disable_button();
        exporter.ui.show_loading();
        Some(Self { exporter })
    }
}

impl<P: Page> Drop for FlightGuard<'_, P> {
    fn drop(&mut self) {
        self.exporter.ui.hide_loading();
        self.exporter.ui.enable_button();
        self.exporter.set_state(ExportState::Idle);
        self.exporter.in_flight.store(false, Ordering::SeqCst);
    }
}
