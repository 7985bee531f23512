//! Export pipeline: orchestration, title and filename, rendering, delivery and UI side effects

pub mod filename;
pub mod format;
pub mod orchestrator;
pub mod render;
pub mod sink;
pub mod ui;

pub use filename::{extract_title, generate_filename, generate_filename_at};
pub use format::ExportFormat;
pub use orchestrator::{ExportOutcome, ExportReport, ExportState, Exporter, PageInspection};
pub use render::{HtmlRenderer, MarkdownRenderer, PdfRenderer, Rasterizer, Renderer, SenderLabels};
pub use sink::{DirectorySink, DownloadSink};
pub use ui::{Affordances, ConsoleAffordances, NotificationKind, NotificationLog, UiEvent};
