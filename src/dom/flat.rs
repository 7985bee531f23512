//! Flat, document-ordered encoding of a snapshot
//!
//! Nested JSON hits serde_json's recursion limit on deep pages, so snapshots travel (from the page
//! bridge, and to and from saved files) as a list of nodes that point at their parent by index.
//! Index 0 is the root; every other node comes after its parent.

use crate::dom::element::{DomNode, ElementNode, NodeHandle};
use crate::error::{ExportError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Not;

/// One node of a flat snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatNode {
    Element {
        tag_name: String,

        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        attributes: IndexMap<String, String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        handle: Option<NodeHandle>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<usize>,

        /// Attached to the parent's shadow root rather than its light children
        #[serde(default, skip_serializing_if = "Not::not")]
        shadow: bool,

        /// Hosts a shadow root, possibly an empty one
        #[serde(default, skip_serializing_if = "Not::not")]
        host: bool,
    },
    Text {
        text: String,
        parent: usize,

        #[serde(default, skip_serializing_if = "Not::not")]
        shadow: bool,
    },
}

/// Encode an element and everything below it
pub fn flatten(root: &ElementNode) -> Vec<FlatNode> {
    let mut nodes = Vec::new();
    push_element(root, None, false, &mut nodes);
    nodes
}

fn push_element(element: &ElementNode, parent: Option<usize>, shadow: bool, nodes: &mut Vec<FlatNode>) {
    let index = nodes.len();
    nodes.push(FlatNode::Element {
        tag_name: element.tag_name.clone(),
        attributes: element.attributes.clone(),
        handle: element.handle,
        parent,
        shadow,
        host: element.shadow_root.is_some(),
    });

    let shadow_children = element.shadow_root.iter().flatten().map(|node| (node, true));
    for (node, in_shadow) in shadow_children.chain(element.children.iter().map(|node| (node, false))) {
        match node {
            DomNode::Element(child) => push_element(child, Some(index), in_shadow, nodes),
            DomNode::Text { text } => nodes.push(FlatNode::Text {
                text: text.clone(),
                parent: index,
                shadow: in_shadow,
            }),
        }
    }
}

/// Rebuild the element tree without recursion
pub fn unflatten(nodes: Vec<FlatNode>) -> Result<ElementNode> {
    let count = nodes.len();
    // Children collected per node, last child first
    let mut light: Vec<Vec<DomNode>> = vec![Vec::new(); count];
    let mut shadowed: Vec<Vec<DomNode>> = vec![Vec::new(); count];
    let mut root = None;

    for (index, node) in nodes.into_iter().enumerate().rev() {
        let (parent, in_shadow, built) = match node {
            FlatNode::Element {
                tag_name,
                attributes,
                handle,
                parent,
                shadow,
                host,
            } => {
                let mut children = std::mem::take(&mut light[index]);
                children.reverse();
                let mut shadow_children = std::mem::take(&mut shadowed[index]);
                shadow_children.reverse();

                let element = ElementNode {
                    tag_name: tag_name.to_ascii_lowercase(),
                    attributes,
                    children,
                    shadow_root: (host || !shadow_children.is_empty()).then_some(shadow_children),
                    handle,
                };
                (parent, shadow, DomNode::Element(element))
            }
            FlatNode::Text { text, parent, shadow } => {
                if !light[index].is_empty() || !shadowed[index].is_empty() {
                    return Err(ExportError::DomParseFailed(format!("text node {} has children", index)));
                }
                (Some(parent), shadow, DomNode::text(text))
            }
        };

        match (parent, built) {
            (Some(parent), built) if parent < index => {
                if in_shadow {
                    shadowed[parent].push(built);
                } else {
                    light[parent].push(built);
                }
            }
            (Some(parent), _) => {
                return Err(ExportError::DomParseFailed(format!(
                    "node {} names parent {}, which does not precede it",
                    index, parent
                )));
            }
            (None, DomNode::Element(element)) if index == 0 => root = Some(element),
            (None, _) => {
                return Err(ExportError::DomParseFailed(format!("node {} has no parent", index)));
            }
        }
    }

    root.ok_or_else(|| ExportError::DomParseFailed("snapshot has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ElementNode {
        ElementNode::new("html").with_handle(1).with_child(
            ElementNode::new("body")
                .with_attribute("class", "app")
                .with_text("before")
                .with_child(
                    ElementNode::new("chat-app")
                        .with_shadow_root(vec![ElementNode::new("div").with_attribute("id", "chat-history")])
                        .with_text("light"),
                )
                .with_child(ElementNode::new("empty-host").with_shadow_root(Vec::new())),
        )
    }

    #[test]
    fn test_roundtrip_keeps_shadow_and_light_order() {
        let root = sample();
        let nodes = flatten(&root);

        assert_eq!(nodes.len(), 7);
        assert!(matches!(&nodes[0], FlatNode::Element { parent: None, .. }));
        assert_eq!(unflatten(nodes).unwrap(), root);
    }

    #[test]
    fn test_deep_chain() {
        let mut root = ElementNode::new("p").with_text("bottom");
        for _ in 0..500 {
            root = ElementNode::new("div").with_child(root);
        }

        let json = serde_json::to_string(&flatten(&root)).unwrap();
        let nodes: Vec<FlatNode> = serde_json::from_str(&json).unwrap();
        assert_eq!(unflatten(nodes).unwrap(), root);
    }

    #[test]
    fn test_text_decodes_as_text() {
        let nodes: Vec<FlatNode> =
            serde_json::from_str(r#"[{"tag_name":"P"},{"text":"hi","parent":0}]"#).unwrap();
        let element = unflatten(nodes).unwrap();

        assert_eq!(element.tag_name, "p");
        assert_eq!(element.children, vec![DomNode::text("hi")]);
    }

    #[test]
    fn test_rejects_forward_parent() {
        let nodes = vec![
            FlatNode::Element {
                tag_name: "html".to_string(),
                attributes: IndexMap::new(),
                handle: None,
                parent: None,
                shadow: false,
                host: false,
            },
            FlatNode::Text {
                text: "x".to_string(),
                parent: 1,
                shadow: false,
            },
        ];
        assert!(matches!(unflatten(nodes), Err(ExportError::DomParseFailed(_))));
    }

    #[test]
    fn test_rejects_empty_and_orphans() {
        assert!(unflatten(Vec::new()).is_err());

        let orphan: Vec<FlatNode> = serde_json::from_str(r#"[{"tag_name":"html"},{"tag_name":"body"}]"#).unwrap();
        assert!(unflatten(orphan).is_err());
    }
}
