use crate::chat::layout::PageLayout;
use crate::chat::locator::{TreeLocator, Unit};
use crate::chat::sender::SenderClassifier;
use crate::chat::types::{ChatContent, Message, Sender};
use crate::dom::{html, DomTree, ElementNode, SelectorPath};
use crate::error::{ExportError, Result};
use crate::page::Page;
use chrono::Local;
use indexmap::IndexMap;
use std::sync::Arc;

/// Turns located message units into [`Message`]s
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    layout: Arc<PageLayout>,
    classifier: SenderClassifier,
}

impl ContentExtractor {
    /// Create a new ContentExtractor using the layout's sender rules
    pub fn new(layout: Arc<PageLayout>) -> Self {
        let classifier = SenderClassifier::new(layout.senders.clone());
        Self { layout, classifier }
    }

    pub fn identify_sender(&self, unit: &ElementNode) -> Sender {
        self.classifier.classify(unit)
    }

    /// Extract one unit
    ///
    /// Content comes from the first source that yields anything: the unit's main document body,
    /// then any content-bearing element, then the unit's own markup, then its plain text.
    /// Attached media of user turns are appended after the content.
    pub fn extract_message(&self, unit: &Unit<'_>) -> Result<Message> {
        let element = unit.element;
        let sender = self.identify_sender(element);

        let mut content = self
            .first_content(&self.layout.body, element)
            .or_else(|| self.first_content(&self.layout.content, element))
            .or_else(|| meaningful(html::inner_html(element)))
            .or_else(|| meaningful(html::text_to_html(&html::text_content(element))))
            .unwrap_or_default();

        let media = self.media_of(unit, &content);
        if !media.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&media);
        }

        if content.is_empty() {
            return Err(ExportError::ExtractionFailed(format!(
                "{} has no readable content",
                element.to_simple_string()
            )));
        }

        Ok(Message::new(sender, content, timestamp_of(element)))
    }

    /// Extract every unit of a snapshot
    ///
    /// A missing container is an error; units that cannot be read are logged and skipped.
    pub fn extract_from(&self, tree: &DomTree) -> Result<ChatContent> {
        let locator = TreeLocator::new(&self.layout);
        let container = locator.find_container(tree).ok_or(ExportError::ContainerNotFound)?;
        let units = locator.units_in(container);

        let mut messages = Vec::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            match self.extract_message(unit) {
                Ok(message) => messages.push(message),
                Err(e) => log::warn!("Skipping message {}: {}", i + 1, e),
            }
        }

        log::debug!("Extracted {} of {} message units", messages.len(), units.len());
        Ok(ChatContent::new(messages, Local::now()))
    }

    /// Snapshot the page and extract every unit
    pub async fn extract_all<P: Page + ?Sized>(&self, page: &P) -> Result<ChatContent> {
        let tree = page.snapshot().await?;
        self.extract_from(&tree)
    }

    fn first_content(&self, paths: &[SelectorPath], element: &ElementNode) -> Option<String> {
        paths
            .iter()
            .filter_map(|path| path.first_within(element))
            .find_map(|found| meaningful(html::inner_html(found)))
    }

    /// `<img>` embeds for the media attached to a carrier unit's turn
    fn media_of(&self, unit: &Unit<'_>, content: &str) -> String {
        if !self.layout.media_carriers.iter().any(|path| path.matches(unit.element)) {
            return String::new();
        }

        let scope = unit.parent.unwrap_or(unit.element);
        let mut attached: IndexMap<&str, Option<&str>> = IndexMap::new();
        for path in &self.layout.media {
            for found in path.query_within(scope) {
                if let Some(src) = found.element.get_attribute("src").filter(|s| !s.is_empty()) {
                    attached
                        .entry(src.as_str())
                        .or_insert_with(|| found.element.get_attribute("alt").map(String::as_str));
                }
            }
        }

        attached
            .into_iter()
            .map(|(src, alt)| (html::escape_attribute(src), alt))
            .filter(|(src, _)| !content.contains(&format!("src=\"{}\"", src)))
            .map(|(src, alt)| {
                format!(
                    "<p><img src=\"{}\" alt=\"{}\"></p>",
                    src,
                    html::escape_attribute(alt.unwrap_or("Attached image"))
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content that says something: visible text or an embedded image
fn meaningful(content: String) -> Option<String> {
    let trimmed = content.trim();
    let has_text = !strip_tags(trimmed).trim().is_empty();
    (has_text || trimmed.contains("<img")).then(|| trimmed.to_string())
}

fn strip_tags(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Timestamp from a `<time datetime>` descendant, else the unit's `data-timestamp`
fn timestamp_of(unit: &ElementNode) -> Option<String> {
    let mut found = None;
    unit.visit(&mut |element| {
        if found.is_none() && element.is_tag("time") {
            found = element.get_attribute("datetime").filter(|v| !v.is_empty()).cloned();
        }
    });

    found.or_else(|| unit.get_attribute("data-timestamp").filter(|v| !v.is_empty()).cloned())
}
