use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a live element, assigned by the page that produced the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A child of an element: either another element or a run of text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DomNode {
    Element(ElementNode),
    Text { text: String },
}

impl DomNode {
    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        DomNode::Text { text: text.into() }
    }

    /// Borrow the element, if this is one
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            DomNode::Element(element) => Some(element),
            DomNode::Text { .. } => None,
        }
    }
}

impl From<ElementNode> for DomNode {
    fn from(element: ElementNode) -> Self {
        DomNode::Element(element)
    }
}

/// Represents a DOM element node, including its open shadow root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// Lowercase HTML tag name (e.g., "div", "model-response")
    pub tag_name: String,

    /// Element attributes in document order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Light-DOM children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DomNode>,

    /// Children of the attached open shadow root, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_root: Option<Vec<DomNode>>,

    /// Handle of the live element this node was captured from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<NodeHandle>,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: IndexMap::new(),
            children: Vec::new(),
            shadow_root: None,
            handle: None,
        }
    }

    /// Builder method: set an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set the class attribute
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attribute("class", class)
    }

    /// Builder method: append a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(DomNode::text(text));
        self
    }

    /// Builder method: append an element child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.add_child(child);
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children.into_iter().map(DomNode::Element).collect();
        self
    }

    /// Builder method: attach a shadow root holding the given elements
    pub fn with_shadow_root(mut self, children: Vec<ElementNode>) -> Self {
        self.shadow_root = Some(children.into_iter().map(DomNode::Element).collect());
        self
    }

    /// Builder method: set the live handle
    pub fn with_handle(mut self, handle: u64) -> Self {
        self.handle = Some(NodeHandle(handle));
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.shift_remove(key)
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(DomNode::Element(child));
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Iterate over the class list
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace())
            .into_iter()
            .flatten()
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes().any(|c| c == class_name)
    }

    /// Remove a class from the class list
    pub fn remove_class(&mut self, class_name: &str) {
        if let Some(classes) = self.attributes.get_mut("class") {
            *classes = classes
                .split_whitespace()
                .filter(|c| *c != class_name)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Custom elements carry a hyphen in their tag name
    pub fn is_custom_element(&self) -> bool {
        self.tag_name.contains('-')
    }

    /// Whether a click on this element is expected to do something
    pub fn is_interactive(&self) -> bool {
        let tag_is_interactive = ["button", "summary"].iter().any(|&tag| self.is_tag(tag));

        let has_click_handler = self.attributes.contains_key("onclick");

        let has_clickable_role = self
            .get_attribute("role")
            .is_some_and(|r| ["button", "tab", "menuitem"].contains(&r.as_str()));

        tag_is_interactive || has_click_handler || has_clickable_role
    }

    /// Child elements of the light DOM
    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(DomNode::as_element)
    }

    /// Child elements of the shadow root, if one is attached
    pub fn shadow_elements(&self) -> Option<impl Iterator<Item = &ElementNode>> {
        self.shadow_root
            .as_ref()
            .map(|root| root.iter().filter_map(DomNode::as_element))
    }

    /// Depth-first visit of this element and every descendant, shadow roots included
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ElementNode)) {
        f(self);
        if let Some(root) = &self.shadow_root {
            for child in root.iter().filter_map(DomNode::as_element) {
                child.visit(f);
            }
        }
        for child in self.child_elements() {
            child.visit(f);
        }
    }

    /// Mutable depth-first visit, shadow roots included
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut ElementNode)) {
        f(self);
        if let Some(root) = &mut self.shadow_root {
            for child in root.iter_mut() {
                if let DomNode::Element(element) = child {
                    element.visit_mut(f);
                }
            }
        }
        for child in &mut self.children {
            if let DomNode::Element(element) = child {
                element.visit_mut(f);
            }
        }
    }

    /// Simplify element by removing children that never carry content (scripts, styles)
    pub fn simplify(&mut self) {
        let keep = |child: &DomNode| match child {
            DomNode::Element(e) => !matches!(e.tag_name.as_str(), "script" | "style" | "noscript" | "template"),
            DomNode::Text { .. } => true,
        };

        self.children.retain(keep);
        if let Some(root) = &mut self.shadow_root {
            root.retain(keep);
        }

        for child in self.children.iter_mut().chain(self.shadow_root.iter_mut().flatten()) {
            if let DomNode::Element(element) = child {
                element.simplify();
            }
        }
    }

    /// Convert to a short opening-tag representation, for logs
    pub fn to_simple_string(&self) -> String {
        let mut parts = vec![format!("<{}", self.tag_name)];

        if let Some(id) = self.id() {
            parts.push(format!(" id=\"{}\"", id));
        }

        if let Some(class) = self.attributes.get("class") {
            parts.push(format!(" class=\"{}\"", class));
        }

        if let Some(handle) = self.handle {
            parts.push(format!(" data-handle=\"{}\"", handle.0));
        }

        parts.push(">".to_string());
        parts.join("")
    }
}
