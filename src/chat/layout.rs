use crate::chat::sender::SenderRule;
use crate::dom::{ElementNode, SelectorPath};
use serde::{Deserialize, Serialize};

/// An attribute that must carry an exact value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub name: String,
    pub value: String,
}

/// Markers that put a unit in the collapsed state; any one of them is enough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseMarkers {
    /// State classes (e.g. `collapsed`)
    pub classes: Vec<String>,

    /// Data flags that count when present with any value other than `"false"`
    pub data_flags: Vec<String>,

    /// Structural state attributes (e.g. `aria-expanded="false"`)
    pub state_attributes: Vec<AttributeMatch>,
}

impl CollapseMarkers {
    /// Whether the element carries any collapse marker
    pub fn matches(&self, element: &ElementNode) -> bool {
        self.classes.iter().any(|c| element.has_class(c))
            || self
                .data_flags
                .iter()
                .any(|flag| element.get_attribute(flag).is_some_and(|v| v != "false"))
            || self
                .state_attributes
                .iter()
                .any(|attr| element.get_attribute(&attr.name) == Some(&attr.value))
    }
}

impl Default for CollapseMarkers {
    fn default() -> Self {
        Self {
            classes: vec!["collapsed".to_string()],
            data_flags: vec!["data-collapsed".to_string()],
            state_attributes: vec![AttributeMatch {
                name: "aria-expanded".to_string(),
                value: "false".to_string(),
            }],
        }
    }
}

/// Where things live on a chat page
///
/// Every list is an ordered set of candidates; the first one that yields something wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    /// The element holding all turns, searched from the document root
    pub container: Vec<SelectorPath>,

    /// Message units, searched inside the container
    pub units: Vec<SelectorPath>,

    /// Conversation title, searched from the document root
    pub title: Vec<SelectorPath>,

    /// Header element the export affordance attaches to
    pub anchor: Vec<SelectorPath>,

    /// Main document body of a unit, searched inside the unit
    pub body: Vec<SelectorPath>,

    /// Any content-bearing element of a unit, searched inside the unit
    pub content: Vec<SelectorPath>,

    /// Elements that expand a collapsed unit when clicked, searched inside the unit
    pub expand_triggers: Vec<SelectorPath>,

    /// Units that may have media attached next to them
    pub media_carriers: Vec<SelectorPath>,

    /// Attached media, searched inside the carrier's parent turn
    pub media: Vec<SelectorPath>,

    pub collapse: CollapseMarkers,

    pub senders: Vec<SenderRule>,

    /// Suffixes stripped from the title (e.g. `" - Gemini"`)
    pub title_suffixes: Vec<String>,

    /// Titles that say nothing about the conversation
    pub generic_titles: Vec<String>,
}

fn paths(sources: &[&str]) -> Vec<SelectorPath> {
    sources
        .iter()
        .filter_map(|source| match SelectorPath::parse(source) {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("Built-in selector rejected: {}", e);
                None
            }
        })
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            container: paths(&[
                "#chat-history",
                "infinite-scroller.chat-history",
                ".conversation-container-list",
                "chat-app >>> #chat-history",
                "[role=log]",
            ]),
            units: paths(&[
                "user-query, model-response",
                "[data-message-author-role]",
                ".chat-turn, .message-turn",
            ]),
            title: paths(&[
                "[data-test-id=conversation-title]",
                ".conversation.selected .conversation-title",
                ".conversation-title",
                "title",
            ]),
            anchor: paths(&["top-bar-actions", ".top-bar-actions", "header .right-section", "header"]),
            body: paths(&[
                ">>> .markdown",
                "message-content .markdown",
                ".markdown",
                "message-content >>> .markdown",
            ]),
            content: paths(&[
                ".query-text",
                "message-content",
                ".query-content",
                "[class*=message-content]",
                "[class*=content]",
            ]),
            expand_triggers: paths(&[
                "[data-test-id=expand-button]",
                ".expand-button",
                "button[aria-expanded=false]",
                "[aria-label*='Show more']",
                "[aria-label*=Expand]",
            ]),
            media_carriers: paths(&["user-query", "[data-message-author-role=user]"]),
            media: paths(&[
                "user-query-file-carousel img",
                "user-query-file-preview img",
                ".file-preview-container img",
                ".attachment img",
            ]),
            collapse: CollapseMarkers::default(),
            senders: SenderRule::defaults(),
            title_suffixes: strings(&[" - Gemini", " | Gemini", " - Google Gemini", " - ChatGPT", " - Claude"]),
            generic_titles: strings(&["Gemini", "Google Gemini", "ChatGPT", "Claude", "New chat", "Conversation"]),
        }
    }
}
