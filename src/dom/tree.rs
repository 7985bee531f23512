use crate::dom::element::{DomNode, ElementNode, NodeHandle};
use crate::dom::flat::{self, FlatNode};
use crate::error::{ExportError, Result};

/// Snapshot of a page's document tree, shadow roots included
#[derive(Debug, Clone, PartialEq)]
pub struct DomTree {
    /// Root element of the document (usually `<html>`)
    pub root: ElementNode,
}

impl DomTree {
    /// Create a new DomTree
    pub fn new(root: ElementNode) -> Self {
        Self { root }
    }

    /// Parse a snapshot saved with [`DomTree::to_json`]. A nested element object is accepted too;
    /// it is only limited by serde_json's nesting depth.
    pub fn from_json(json: &str) -> Result<Self> {
        let parse_error = |e: serde_json::Error| ExportError::DomParseFailed(format!("Failed to parse DOM JSON: {}", e));

        let mut root = if json.trim_start().starts_with('[') {
            let nodes: Vec<FlatNode> = serde_json::from_str(json).map_err(parse_error)?;
            flat::unflatten(nodes)?
        } else {
            serde_json::from_str::<ElementNode>(json).map_err(parse_error)?
        };
        root.simplify();
        Ok(Self::new(root))
    }

    /// Convert the DOM tree to JSON, as a flat node list
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&flat::flatten(&self.root))
            .map_err(|e| ExportError::DomParseFailed(format!("Failed to serialize DOM to JSON: {}", e)))
    }

    /// Give every element without a handle a fresh one, continuing after the largest existing handle
    pub fn assign_handles(&mut self) {
        let mut next = self.max_handle().map_or(1, |h| h.0 + 1);
        self.root.visit_mut(&mut |element| {
            if element.handle.is_none() {
                element.handle = Some(NodeHandle(next));
                next += 1;
            }
        });
    }

    /// Largest handle present in the tree
    pub fn max_handle(&self) -> Option<NodeHandle> {
        let mut max = None;
        self.root.visit(&mut |element| {
            if element.handle > max {
                max = element.handle;
            }
        });
        max
    }

    /// Find an element by its live handle
    pub fn find(&self, handle: NodeHandle) -> Option<&ElementNode> {
        let mut found = None;
        self.root.visit(&mut |element| {
            if found.is_none() && element.handle == Some(handle) {
                found = Some(element);
            }
        });
        found
    }

    /// Find an element by its live handle, mutably
    pub fn find_mut(&mut self, handle: NodeHandle) -> Option<&mut ElementNode> {
        Self::find_mut_in(&mut self.root, handle)
    }

    fn find_mut_in(node: &mut ElementNode, handle: NodeHandle) -> Option<&mut ElementNode> {
        if node.handle == Some(handle) {
            return Some(node);
        }

        let children = node.shadow_root.iter_mut().flatten().chain(node.children.iter_mut());
        for child in children {
            if let DomNode::Element(element) = child {
                if let Some(found) = Self::find_mut_in(element, handle) {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Handles of the element and all of its ancestors, innermost first.
    /// Shadow hosts count as ancestors of their shadow content.
    pub fn ancestry(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut path = Vec::new();
        Self::ancestry_in(&self.root, handle, &mut path);
        path.reverse();
        path
    }

    fn ancestry_in(node: &ElementNode, handle: NodeHandle, path: &mut Vec<NodeHandle>) -> bool {
        if let Some(own) = node.handle {
            path.push(own);
        }

        if node.handle == Some(handle) {
            return true;
        }

        let children = node.shadow_root.iter().flatten().chain(node.children.iter());
        for child in children.filter_map(DomNode::as_element) {
            if Self::ancestry_in(child, handle, path) {
                return true;
            }
        }

        if node.handle.is_some() {
            path.pop();
        }
        false
    }

    /// Count total elements in the tree
    pub fn count_elements(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |_| count += 1);
        count
    }
}
