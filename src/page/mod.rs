//! The live page the exporter works against
//!
//! [`Page`] is the seam between the export pipeline and whatever hosts the conversation: a Chromium
//! tab driven over CDP ([`crate::browser::ChromePage`]) or an in-process [`MemoryPage`] built from a
//! saved snapshot. Locating and extracting only need [`Page::snapshot`]; the expansion engine is the
//! only caller of [`Page::activate`].

pub mod memory;

pub use memory::{MemoryPage, Reaction};

use crate::dom::{DomTree, ElementNode, NodeHandle};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Viewport scroll position in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    /// Create a new ScrollOffset
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Largest per-axis distance to another offset
    pub fn distance(&self, other: &ScrollOffset) -> f64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Subscription to mutations inside one element. Dropping it disconnects the observer.
#[async_trait]
pub trait MutationWatch: Send {
    /// Resolves on the next attribute, child-list or subtree mutation inside the watched element
    async fn changed(&mut self) -> Result<()>;
}

/// A live document that can be snapshotted, observed and clicked
#[async_trait]
pub trait Page: Send + Sync {
    /// Capture the whole document, open shadow roots included
    async fn snapshot(&self) -> Result<DomTree>;

    /// Re-read a single element and its subtree; `None` once it is no longer attached
    async fn element(&self, handle: NodeHandle) -> Result<Option<ElementNode>>;

    /// Dispatch a click on the element
    async fn activate(&self, handle: NodeHandle) -> Result<()>;

    /// Start observing mutations inside the element
    async fn watch(&self, handle: NodeHandle) -> Result<Box<dyn MutationWatch>>;

    /// Current viewport scroll position
    async fn scroll_offset(&self) -> Result<ScrollOffset>;

    /// Scroll the viewport to the given position
    async fn scroll_to(&self, offset: ScrollOffset) -> Result<()>;

    /// An owned handle on the same document, for work that outlives the current borrow
    fn detach(&self) -> Option<Arc<dyn Page>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_distance() {
        let a = ScrollOffset::new(0.0, 120.0);
        let b = ScrollOffset::new(3.0, 100.0);
        assert_eq!(a.distance(&b), 20.0);
        assert_eq!(a.distance(&a), 0.0);
    }
}
