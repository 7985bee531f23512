use crate::chat::layout::PageLayout;
use crate::chat::locator::TreeLocator;
use crate::chat::types::ExpandResult;
use crate::config::ExpansionConfig;
use crate::dom::{DomTree, ElementNode, NodeHandle};
use crate::error::{ExportError, Result};
use crate::page::{Page, ScrollOffset};
use std::sync::Arc;
use std::time::Duration;

/// Forces collapsed message units into their expanded state
///
/// Units are expanded one at a time, in document order. Each gets its own bounded wait, so a
/// stuck unit costs at most `unit_timeout` and never blocks the units after it.
#[derive(Debug, Clone)]
pub struct ExpansionEngine {
    layout: Arc<PageLayout>,
    unit_timeout: Duration,
    recheck_delay: Duration,
}

impl ExpansionEngine {
    /// Create a new ExpansionEngine
    pub fn new(layout: Arc<PageLayout>, config: &ExpansionConfig) -> Self {
        Self {
            layout,
            unit_timeout: config.unit_timeout(),
            recheck_delay: config.recheck_delay(),
        }
    }

    /// Per-unit wait budget
    pub fn unit_timeout(&self) -> Duration {
        self.unit_timeout
    }

    /// Whether a unit currently carries any collapse marker
    pub fn is_collapsed(&self, unit: &ElementNode) -> bool {
        self.layout.collapse.matches(unit)
    }

    /// Collapsed units of a snapshot, in document order
    pub fn collapsed_in(&self, tree: &DomTree) -> Vec<ElementNode> {
        TreeLocator::new(&self.layout)
            .find_units(tree)
            .into_iter()
            .filter(|unit| self.is_collapsed(unit.element))
            .map(|unit| unit.element.clone())
            .collect()
    }

    /// Every currently collapsed unit on the page; a page that cannot be read has none
    pub async fn find_collapsed<P: Page + ?Sized>(&self, page: &P) -> Vec<ElementNode> {
        match page.snapshot().await {
            Ok(tree) => self.collapsed_in(&tree),
            Err(e) => {
                log::warn!("Could not snapshot page while looking for collapsed messages: {}", e);
                Vec::new()
            }
        }
    }

    /// Expand one unit, waiting at most `unit_timeout` for it to leave the collapsed state
    pub async fn expand_one<P: Page + ?Sized>(&self, page: &P, unit: &ElementNode) -> Result<()> {
        if !self.is_collapsed(unit) {
            return Ok(());
        }

        let handle = unit
            .handle
            .ok_or_else(|| ExportError::ActivationFailed(format!("{} has no live handle", unit.to_simple_string())))?;
        let target = self.activation_target(unit).unwrap_or(handle);

        // Subscribe before clicking so no mutation is missed; dropping the watch disconnects it
        let mut watch = page.watch(handle).await?;
        log::debug!("Activating {} to expand {}", target, handle);
        page.activate(target).await?;

        let wait = async {
            let recheck = tokio::time::sleep(self.recheck_delay);
            tokio::pin!(recheck);
            let mut rechecked = false;

            loop {
                tokio::select! {
                    _ = &mut recheck, if !rechecked => rechecked = true,
                    changed = watch.changed() => changed?,
                }

                if self.expanded_now(page, handle).await? {
                    return Ok::<(), ExportError>(());
                }
            }
        };

        match tokio::time::timeout(self.unit_timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExportError::ExpansionTimeout {
                timeout_ms: self.unit_timeout.as_millis() as u64,
                failed: 1,
            }),
        }
    }

    /// Expand every collapsed unit and put the viewport back where it was
    pub async fn expand_all<P: Page + ?Sized>(&self, page: &P) -> ExpandResult {
        let original = match page.scroll_offset().await {
            Ok(offset) => Some(offset),
            Err(e) => {
                log::warn!("Could not read scroll position: {}", e);
                None
            }
        };

        let restore = original.map(|offset| ScrollRestore::new(page, offset));
        let result = self.expand_collapsed(page).await;

        if let Some(restore) = restore {
            restore.finish(page).await;
        }

        result
    }

    async fn expand_collapsed<P: Page + ?Sized>(&self, page: &P) -> ExpandResult {
        let collapsed = self.find_collapsed(page).await;
        let mut result = ExpandResult::default();

        if collapsed.is_empty() {
            log::debug!("No collapsed messages found");
            return result;
        }

        log::info!("Expanding {} collapsed messages", collapsed.len());
        for (i, unit) in collapsed.iter().enumerate() {
            match self.expand_one(page, unit).await {
                Ok(()) => result.record_success(),
                Err(e) => {
                    log::warn!("Failed to expand message {}: {}", i + 1, e);
                    result.record_failure(format!("Message {}: {}", i + 1, e));
                }
            }
        }

        log::info!(
            "Expanded {} of {} collapsed messages",
            result.expanded(),
            result.total_found()
        );
        result
    }

    async fn expanded_now<P: Page + ?Sized>(&self, page: &P, handle: NodeHandle) -> Result<bool> {
        // A detached unit keeps its last known state
        Ok(page
            .element(handle)
            .await?
            .is_some_and(|current| !self.is_collapsed(&current)))
    }

    /// The most specific element to click: a configured trigger, else the first button-like
    /// descendant; `None` means click the unit itself
    fn activation_target(&self, unit: &ElementNode) -> Option<NodeHandle> {
        let configured = self
            .layout
            .expand_triggers
            .iter()
            .find_map(|path| path.first_within(unit).and_then(|e| e.handle));
        if configured.is_some() {
            return configured;
        }

        let mut interactive = None;
        unit.visit(&mut |element| {
            if interactive.is_none() && !std::ptr::eq(element, unit) && element.is_interactive() {
                interactive = element.handle;
            }
        });
        interactive
    }
}

/// Puts the viewport back at a recorded offset
///
/// [`ScrollRestore::finish`] restores in line. A guard dropped without finishing, because the
/// expansion was cancelled or panicked, restores from a spawned task instead.
struct ScrollRestore {
    page: Option<Arc<dyn Page>>,
    offset: ScrollOffset,
    finished: bool,
}

impl ScrollRestore {
    fn new<P: Page + ?Sized>(page: &P, offset: ScrollOffset) -> Self {
        Self {
            page: page.detach(),
            offset,
            finished: false,
        }
    }

    async fn finish<P: Page + ?Sized>(mut self, page: &P) {
        self.finished = true;
        if let Err(e) = page.scroll_to(self.offset).await {
            log::warn!("Could not restore scroll position: {}", e);
        }
    }
}

impl Drop for ScrollRestore {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let Some(page) = self.page.take() else {
            log::warn!("Expansion interrupted; scroll position not restored");
            return;
        };
        let offset = self.offset;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                log::debug!("Expansion interrupted; restoring scroll position");
                runtime.spawn(async move {
                    if let Err(e) = page.scroll_to(offset).await {
                        log::warn!("Could not restore scroll position: {}", e);
                    }
                });
            }
            Err(_) => log::warn!("Expansion interrupted outside a runtime; scroll position not restored"),
        }
    }
}
