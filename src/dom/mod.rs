//! DOM snapshot model
//!
//! This module provides the page-independent view of a document used by the rest of the crate:
//! - ElementNode: an element with attributes, light children and an optional open shadow root
//! - DomTree: a rooted snapshot with handle lookup
//! - flat: the parent-indexed node list snapshots travel as
//! - SelectorPath: CSS-like selector chains with explicit shadow-root hops
//! - html: serialization back to sanitized semantic HTML and plain text

pub mod element;
pub mod flat;
pub mod html;
pub mod selector;
pub mod tree;

pub use element::{DomNode, ElementNode, NodeHandle};
pub use flat::FlatNode;
pub use selector::{Match, SelectorPath};
pub use tree::DomTree;
