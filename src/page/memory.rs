use crate::dom::{DomTree, ElementNode, NodeHandle, SelectorPath};
use crate::error::{ExportError, Result};
use crate::page::{MutationWatch, Page, ScrollOffset};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

type Mutator = Arc<dyn Fn(&mut ElementNode) + Send + Sync>;

/// What happens on the page when a given element is activated
#[derive(Clone)]
pub struct Reaction {
    target: NodeHandle,
    delay: Duration,
    notify: bool,
    scroll_to: Option<ScrollOffset>,
    mutate: Mutator,
}

impl Reaction {
    /// Mutate `target` with an arbitrary function
    pub fn mutate(target: NodeHandle, f: impl Fn(&mut ElementNode) + Send + Sync + 'static) -> Self {
        Self {
            target,
            delay: Duration::ZERO,
            notify: true,
            scroll_to: None,
            mutate: Arc::new(f),
        }
    }

    /// Clear the usual collapse markers on `target`: the `collapsed` class, the `data-collapsed`
    /// flag, and `aria-expanded="false"`
    pub fn expand(target: NodeHandle) -> Self {
        Self::mutate(target, |element| {
            element.remove_class("collapsed");
            element.remove_attribute("data-collapsed");
            if element.get_attribute("aria-expanded").is_some() {
                element.add_attribute("aria-expanded", "true");
            }
        })
    }

    /// Apply the mutation after a delay instead of synchronously
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Apply the mutation without emitting a mutation notification
    pub fn silently(mut self) -> Self {
        self.notify = false;
        self
    }

    /// Also move the viewport, like a layout jump caused by the expansion
    pub fn scrolling_to(mut self, offset: ScrollOffset) -> Self {
        self.scroll_to = Some(offset);
        self
    }
}

struct Inner {
    tree: Mutex<DomTree>,
    scroll: Mutex<ScrollOffset>,
    reactions: Mutex<HashMap<NodeHandle, Reaction>>,
    failing: Mutex<HashSet<NodeHandle>>,
    activations: Mutex<Vec<NodeHandle>>,
    mutations: broadcast::Sender<Arc<Vec<NodeHandle>>>,
    active_watches: Arc<AtomicUsize>,
}

impl Inner {
    fn apply(&self, reaction: &Reaction) {
        let ancestry = {
            let mut tree = lock(&self.tree);
            match tree.find_mut(reaction.target) {
                Some(element) => (reaction.mutate)(element),
                None => {
                    log::debug!("Reaction target {} is not attached", reaction.target);
                    return;
                }
            }
            tree.ancestry(reaction.target)
        };

        if let Some(offset) = reaction.scroll_to {
            *lock(&self.scroll) = offset;
        }

        if reaction.notify {
            // No receivers simply means nobody is watching
            let _ = self.mutations.send(Arc::new(ancestry));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An in-process page backed by a [`DomTree`]
///
/// Used to export a previously saved snapshot without a browser, and to script page behaviour
/// (delayed or silent expansions, activation failures, scroll jumps) in tests.
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<Inner>,
}

impl MemoryPage {
    /// Create a page from a tree; elements without a handle get one
    pub fn new(mut tree: DomTree) -> Self {
        tree.assign_handles();
        let (mutations, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(tree),
                scroll: Mutex::new(ScrollOffset::default()),
                reactions: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
                activations: Mutex::new(Vec::new()),
                mutations,
                active_watches: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Create a page from a document root element
    pub fn from_root(root: ElementNode) -> Self {
        Self::new(DomTree::new(root))
    }

    /// Load a snapshot saved with [`DomTree::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(DomTree::from_json(json)?))
    }

    /// Register what happens when `trigger` is activated
    pub fn on_activate(&self, trigger: NodeHandle, reaction: Reaction) {
        lock(&self.inner.reactions).insert(trigger, reaction);
    }

    /// Make activating `handle` fail as if the click handler threw
    pub fn fail_activation(&self, handle: NodeHandle) {
        lock(&self.inner.failing).insert(handle);
    }

    /// Set the viewport scroll position
    pub fn set_scroll(&self, offset: ScrollOffset) {
        *lock(&self.inner.scroll) = offset;
    }

    /// Handles activated so far, in order
    pub fn activations(&self) -> Vec<NodeHandle> {
        lock(&self.inner.activations).clone()
    }

    /// Number of mutation watches currently alive
    pub fn active_watches(&self) -> usize {
        self.inner.active_watches.load(Ordering::SeqCst)
    }

    /// A copy of the current tree
    pub fn tree(&self) -> DomTree {
        lock(&self.inner.tree).clone()
    }

    /// Handles of all elements matching a selector path, in document order
    pub fn handles_of(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let path = SelectorPath::parse(selector)?;
        let tree = lock(&self.inner.tree);
        Ok(path
            .query_document(&tree.root)
            .iter()
            .filter_map(|m| m.element.handle)
            .collect())
    }

    /// Handle of the first element matching a selector path
    pub fn handle_of(&self, selector: &str) -> Result<Option<NodeHandle>> {
        Ok(self.handles_of(selector)?.first().copied())
    }
}

#[async_trait]
impl Page for MemoryPage {
    async fn snapshot(&self) -> Result<DomTree> {
        Ok(self.tree())
    }

    async fn element(&self, handle: NodeHandle) -> Result<Option<ElementNode>> {
        Ok(lock(&self.inner.tree).find(handle).cloned())
    }

    async fn activate(&self, handle: NodeHandle) -> Result<()> {
        lock(&self.inner.activations).push(handle);

        if lock(&self.inner.failing).contains(&handle) {
            return Err(ExportError::ActivationFailed(format!("click handler on {} threw", handle)));
        }

        if lock(&self.inner.tree).find(handle).is_none() {
            return Err(ExportError::ActivationFailed(format!("element {} is not attached", handle)));
        }

        let reaction = lock(&self.inner.reactions).get(&handle).cloned();
        if let Some(reaction) = reaction {
            if reaction.delay.is_zero() {
                self.inner.apply(&reaction);
            } else {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    tokio::time::sleep(reaction.delay).await;
                    inner.apply(&reaction);
                });
            }
        }

        Ok(())
    }

    async fn watch(&self, handle: NodeHandle) -> Result<Box<dyn MutationWatch>> {
        let counter = Arc::clone(&self.inner.active_watches);
        counter.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryWatch {
            handle,
            receiver: self.inner.mutations.subscribe(),
            counter,
        }))
    }

    async fn scroll_offset(&self) -> Result<ScrollOffset> {
        Ok(*lock(&self.inner.scroll))
    }

    async fn scroll_to(&self, offset: ScrollOffset) -> Result<()> {
        self.set_scroll(offset);
        Ok(())
    }

    fn detach(&self) -> Option<Arc<dyn Page>> {
        Some(Arc::new(self.clone()))
    }
}

struct MemoryWatch {
    handle: NodeHandle,
    receiver: broadcast::Receiver<Arc<Vec<NodeHandle>>>,
    counter: Arc<AtomicUsize>,
}

#[async_trait]
impl MutationWatch for MemoryWatch {
    async fn changed(&mut self) -> Result<()> {
        loop {
            match self.receiver.recv().await {
                Ok(ancestry) if ancestry.contains(&self.handle) => return Ok(()),
                Ok(_) => continue,
                // Missed notifications still mean something changed
                Err(broadcast::error::RecvError::Lagged(_)) => return Ok(()),
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ExportError::EvaluationFailed("page was closed".to_string()));
                }
            }
        }
    }
}

impl Drop for MemoryWatch {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryPage {
        MemoryPage::from_root(
            ElementNode::new("html").with_child(
                ElementNode::new("body").with_child(
                    ElementNode::new("div")
                        .with_class("turn collapsed")
                        .with_child(ElementNode::new("button").with_text("Show more")),
                ),
            ),
        )
    }

    #[tokio::test]
    async fn test_activation_applies_reaction() {
        let page = page();
        let turn = page.handle_of(".turn").unwrap().unwrap();
        let button = page.handle_of("button").unwrap().unwrap();
        page.on_activate(button, Reaction::expand(turn));

        page.activate(button).await.unwrap();

        let turn_now = page.element(turn).await.unwrap().unwrap();
        assert!(!turn_now.has_class("collapsed"));
        assert_eq!(page.activations(), vec![button]);
    }

    #[tokio::test]
    async fn test_watch_sees_descendant_mutation() {
        let page = page();
        let turn = page.handle_of(".turn").unwrap().unwrap();
        let button = page.handle_of("button").unwrap().unwrap();
        page.on_activate(button, Reaction::mutate(button, |b| b.add_attribute("hidden", "")));

        let mut watch = page.watch(turn).await.unwrap();
        assert_eq!(page.active_watches(), 1);

        page.activate(button).await.unwrap();
        watch.changed().await.unwrap();

        drop(watch);
        assert_eq!(page.active_watches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_reaction() {
        let page = page();
        let turn = page.handle_of(".turn").unwrap().unwrap();
        page.on_activate(turn, Reaction::expand(turn).after(Duration::from_millis(300)));

        page.activate(turn).await.unwrap();
        assert!(page.element(turn).await.unwrap().unwrap().has_class("collapsed"));

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert!(!page.element(turn).await.unwrap().unwrap().has_class("collapsed"));
    }

    #[tokio::test]
    async fn test_failing_activation() {
        let page = page();
        let button = page.handle_of("button").unwrap().unwrap();
        page.fail_activation(button);

        let err = page.activate(button).await.unwrap_err();
        assert!(matches!(err, ExportError::ActivationFailed(_)));
    }

    #[tokio::test]
    async fn test_scroll_roundtrip() {
        let page = page();
        page.scroll_to(ScrollOffset::new(0.0, 450.0)).await.unwrap();
        assert_eq!(page.scroll_offset().await.unwrap(), ScrollOffset::new(0.0, 450.0));
    }

    #[test]
    fn test_from_json_assigns_handles() {
        let page = MemoryPage::from_json(r#"{"tag_name":"html","children":[{"tag_name":"body"}]}"#).unwrap();
        assert!(page.handle_of("body").unwrap().is_some());
    }
}
