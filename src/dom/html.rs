//! Serialization of snapshot nodes back to sanitized, semantic HTML
//!
//! Rendering follows what the user sees: an element with a shadow root renders its shadow content,
//! with `<slot>` elements replaced by the host's light children. Custom elements are unwrapped,
//! page chrome (buttons, icons, scripts) is dropped, and only attributes that matter for the
//! exported document survive.

use crate::dom::element::{DomNode, ElementNode};

/// Tags removed together with their content
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "button", "svg", "canvas", "input", "textarea", "select", "mat-icon",
    "link", "meta", "iframe", "frame", "object", "embed", "video", "audio",
];

/// Elements without a closing tag
const VOID_TAGS: &[&str] = &["area", "br", "col", "hr", "img", "source", "track", "wbr"];

/// Kept attributes that hold a URL
const URL_ATTRIBUTES: &[&str] = &["href", "src"];

/// URL schemes that run script when followed
const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// Attributes kept on exported elements
const KEPT_ATTRIBUTES: &[&str] = &["href", "src", "alt", "title", "colspan", "rowspan", "start", "datetime", "lang"];

/// Elements that start a new line in the plain-text rendering
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "section", "table", "ul",
    "ol", "hr",
];

/// Serialize the rendered content of an element (without the element's own tag)
pub fn inner_html(element: &ElementNode) -> String {
    let mut writer = HtmlWriter::default();
    walk_content(element, &DOCUMENT, &mut writer);
    writer.out
}

/// Serialize an element including its own tag
pub fn outer_html(element: &ElementNode) -> String {
    let mut writer = HtmlWriter::default();
    walk_element(element, &DOCUMENT, &mut writer);
    writer.out
}

/// Rendered text of an element with whitespace runs collapsed to single spaces
pub fn normalized_text(element: &ElementNode) -> String {
    collapse_whitespace(&text_content(element))
}

/// Rendered text of an element, with line breaks between block elements
pub fn text_content(element: &ElementNode) -> String {
    let mut writer = TextWriter::default();
    walk_content(element, &DOCUMENT, &mut writer);
    writer.out
}

/// Collapse whitespace runs to single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for use in HTML content
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape text for use inside a double-quoted attribute value
pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Wrap plain text in paragraphs, one per blank-line separated block
pub fn text_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<String> = block.lines().map(|l| escape_text(l.trim())).collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_dropped(element: &ElementNode) -> bool {
    DROPPED_TAGS.contains(&element.tag_name.as_str())
        || element.get_attribute("aria-hidden").is_some_and(|v| v == "true")
}

fn keeps_attribute(name: &str, value: &str) -> bool {
    if URL_ATTRIBUTES.contains(&name) {
        return is_safe_url(value);
    }
    KEPT_ATTRIBUTES.contains(&name) || (name == "class" && value.split_whitespace().any(|c| c.starts_with("language-")))
}

/// Browsers ignore whitespace and control characters inside a scheme
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    !SCRIPT_SCHEMES.iter().any(|scheme| compact.starts_with(scheme))
}

/// The shadow tree being rendered: its host, and the scope the host's own light children belong to
struct Scope<'a> {
    host: Option<&'a ElementNode>,
    outer: Option<&'a Scope<'a>>,
}

/// The light tree of the document
static DOCUMENT: Scope<'static> = Scope { host: None, outer: None };

/// Receives rendered nodes in order
trait Visitor {
    fn text(&mut self, text: &str);

    /// Called before an element's content; `false` skips the content and [`Visitor::leave`]
    fn enter(&mut self, element: &ElementNode) -> bool;

    fn leave(&mut self, element: &ElementNode);
}

/// Content as displayed: the shadow tree if there is one, else the light children
fn walk_content<'a>(element: &'a ElementNode, scope: &Scope<'a>, visitor: &mut impl Visitor) {
    match &element.shadow_root {
        Some(shadow) => {
            let inner = Scope {
                host: Some(element),
                outer: Some(scope),
            };
            for node in shadow {
                walk_node(node, &inner, visitor);
            }
        }
        None => {
            for node in &element.children {
                walk_node(node, scope, visitor);
            }
        }
    }
}

fn walk_node<'a>(node: &'a DomNode, scope: &Scope<'a>, visitor: &mut impl Visitor) {
    match node {
        DomNode::Text { text } => visitor.text(text),
        DomNode::Element(element) => walk_element(element, scope, visitor),
    }
}

fn walk_element<'a>(element: &'a ElementNode, scope: &Scope<'a>, visitor: &mut impl Visitor) {
    if is_dropped(element) {
        return;
    }

    if element.is_tag("slot") {
        walk_slot(element, scope, visitor);
    } else if element.is_custom_element() {
        walk_content(element, scope, visitor);
    } else if visitor.enter(element) {
        walk_content(element, scope, visitor);
        visitor.leave(element);
    }
}

/// A slot shows the host's light children assigned to it, else its own fallback content
fn walk_slot<'a>(slot: &'a ElementNode, scope: &Scope<'a>, visitor: &mut impl Visitor) {
    if let Some(host) = scope.host {
        let assigned = assigned_nodes(host, slot);
        if !assigned.is_empty() {
            let outer = scope.outer.unwrap_or(&DOCUMENT);
            for node in assigned {
                walk_node(node, outer, visitor);
            }
            return;
        }
    }

    for node in &slot.children {
        walk_node(node, scope, visitor);
    }
}

/// Light children of `host` that go into `slot`: those naming it for a named slot, the unnamed
/// rest for the default slot
fn assigned_nodes<'a>(host: &'a ElementNode, slot: &ElementNode) -> Vec<&'a DomNode> {
    let name = slot.get_attribute("name").map(String::as_str).filter(|n| !n.is_empty());
    host.children
        .iter()
        .filter(|node| {
            let target = match node {
                DomNode::Element(child) => child.get_attribute("slot").map(String::as_str).filter(|n| !n.is_empty()),
                DomNode::Text { .. } => None,
            };
            target == name
        })
        .collect()
}

#[derive(Default)]
struct HtmlWriter {
    out: String,
}

impl Visitor for HtmlWriter {
    fn text(&mut self, text: &str) {
        self.out.push_str(&escape_text(text));
    }

    fn enter(&mut self, element: &ElementNode) -> bool {
        self.out.push('<');
        self.out.push_str(&element.tag_name);
        for (name, value) in &element.attributes {
            if keeps_attribute(name, value) {
                let value = if name == "class" {
                    value
                        .split_whitespace()
                        .filter(|c| c.starts_with("language-"))
                        .collect::<Vec<_>>()
                        .join(" ")
                } else {
                    value.clone()
                };
                self.out.push_str(&format!(" {}=\"{}\"", name, escape_attribute(&value)));
            }
        }
        self.out.push('>');

        !VOID_TAGS.contains(&element.tag_name.as_str())
    }

    fn leave(&mut self, element: &ElementNode) {
        self.out.push_str(&format!("</{}>", element.tag_name));
    }
}

#[derive(Default)]
struct TextWriter {
    out: String,
}

impl TextWriter {
    fn break_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}

fn is_block(element: &ElementNode) -> bool {
    BLOCK_TAGS.contains(&element.tag_name.as_str())
}

impl Visitor for TextWriter {
    fn text(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn enter(&mut self, element: &ElementNode) -> bool {
        if is_block(element) {
            self.break_line();
        }
        true
    }

    fn leave(&mut self, element: &ElementNode) {
        if is_block(element) {
            self.break_line();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_html_keeps_structure() {
        let element = ElementNode::new("div").with_class("markdown").with_child(
            ElementNode::new("p")
                .with_class("para")
                .with_text("Use ")
                .with_child(ElementNode::new("code").with_text("a < b"))
                .with_text(" and ")
                .with_child(ElementNode::new("strong").with_text("bold")),
        );

        assert_eq!(
            inner_html(&element),
            "<p>Use <code>a &lt; b</code> and <strong>bold</strong></p>"
        );
    }

    #[test]
    fn test_drops_chrome_and_unwraps_custom_elements() {
        let element = ElementNode::new("div")
            .with_child(ElementNode::new("button").with_text("Copy"))
            .with_child(ElementNode::new("mat-icon").with_text("content_copy"))
            .with_child(ElementNode::new("code-block").with_child(ElementNode::new("pre").with_text("fn main() {}")))
            .with_child(ElementNode::new("span").with_attribute("aria-hidden", "true").with_text("hidden"));

        assert_eq!(inner_html(&element), "<pre>fn main() {}</pre>");
    }

    #[test]
    fn test_attribute_whitelist() {
        let element = ElementNode::new("div")
            .with_child(
                ElementNode::new("a")
                    .with_attribute("href", "https://example.com/?a=1&b=\"2\"")
                    .with_attribute("_ngcontent-abc", "")
                    .with_attribute("target", "_blank")
                    .with_text("link"),
            )
            .with_child(ElementNode::new("code").with_class("hljs language-rust").with_text("x"))
            .with_child(ElementNode::new("img").with_attribute("src", "a.png").with_attribute("alt", "A"));

        assert_eq!(
            inner_html(&element),
            "<a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\">link</a>\
             <code class=\"language-rust\">x</code>\
             <img src=\"a.png\" alt=\"A\">"
        );
    }

    #[test]
    fn test_shadow_root_rendered_with_slots() {
        let host = ElementNode::new("message-content")
            .with_text("light text")
            .with_shadow_root(vec![
                ElementNode::new("div")
                    .with_class("frame")
                    .with_child(ElementNode::new("h2").with_text("Title")),
                ElementNode::new("slot"),
            ]);

        let wrapper = ElementNode::new("div").with_child(host);
        assert_eq!(inner_html(&wrapper), "<div><h2>Title</h2></div>light text");
    }

    #[test]
    fn test_named_and_default_slots_below_the_top_level() {
        let card = ElementNode::new("message-card")
            .with_shadow_root(vec![
                ElementNode::new("header").with_child(ElementNode::new("slot").with_attribute("name", "title")),
                ElementNode::new("section").with_child(ElementNode::new("slot")),
            ])
            .with_child(ElementNode::new("h3").with_attribute("slot", "title").with_text("Heading"))
            .with_child(ElementNode::new("p").with_text("body text"));

        let wrapper = ElementNode::new("div").with_child(card);
        assert_eq!(
            inner_html(&wrapper),
            "<header><h3>Heading</h3></header><section><p>body text</p></section>"
        );
    }

    #[test]
    fn test_slot_forwarded_through_nested_hosts() {
        // outer-card passes its light child into inner-card's slot via its own slot
        let inner = ElementNode::new("inner-card")
            .with_shadow_root(vec![ElementNode::new("blockquote").with_child(ElementNode::new("slot"))])
            .with_child(ElementNode::new("slot"));
        let outer = ElementNode::new("outer-card")
            .with_shadow_root(vec![ElementNode::new("div").with_child(inner)])
            .with_child(ElementNode::new("em").with_text("quoted"));

        assert_eq!(outer_html(&outer), "<div><blockquote><em>quoted</em></blockquote></div>");
        assert_eq!(normalized_text(&ElementNode::new("div").with_child(outer)), "quoted");
    }

    #[test]
    fn test_unfilled_slot_shows_fallback() {
        let host = ElementNode::new("chat-avatar")
            .with_shadow_root(vec![
                ElementNode::new("slot").with_attribute("name", "icon").with_text("default icon"),
                ElementNode::new("slot").with_text("no caption"),
            ])
            .with_child(ElementNode::new("span").with_attribute("slot", "missing").with_text("unassigned"));

        let wrapper = ElementNode::new("div").with_child(host);
        assert_eq!(inner_html(&wrapper), "default iconno caption");
    }

    #[test]
    fn test_embedded_content_and_script_urls_dropped() {
        let element = ElementNode::new("div")
            .with_child(ElementNode::new("iframe").with_attribute("src", "https://tracker.example/"))
            .with_child(ElementNode::new("object").with_attribute("data", "plugin.swf"))
            .with_child(ElementNode::new("embed").with_attribute("src", "movie.swf"))
            .with_child(ElementNode::new("video").with_attribute("src", "clip.mp4"))
            .with_child(ElementNode::new("a").with_attribute("href", " JavaScript:alert(1)").with_text("run"))
            .with_child(ElementNode::new("a").with_attribute("href", "java\tscript:alert(1)").with_text("tab"))
            .with_child(ElementNode::new("img").with_attribute("src", "vbscript:msgbox"))
            .with_child(ElementNode::new("a").with_attribute("href", "/docs").with_text("docs"));

        assert_eq!(inner_html(&element), "<a>run</a><a>tab</a><img><a href=\"/docs\">docs</a>");
    }

    #[test]
    fn test_outer_html() {
        let element = ElementNode::new("table")
            .with_child(ElementNode::new("tr").with_child(ElementNode::new("td").with_attribute("colspan", "2")));
        assert_eq!(outer_html(&element), "<table><tr><td colspan=\"2\"></td></tr></table>");
    }

    #[test]
    fn test_text_content_breaks_blocks() {
        let element = ElementNode::new("div")
            .with_child(ElementNode::new("p").with_text("First"))
            .with_child(ElementNode::new("p").with_text("Second"))
            .with_child(ElementNode::new("button").with_text("Copy"));

        assert_eq!(text_content(&element), "First\nSecond\n");
        assert_eq!(normalized_text(&element), "First Second");
    }

    #[test]
    fn test_text_to_html() {
        assert_eq!(
            text_to_html("Hello <world>\nline two\n\n  Next  "),
            "<p>Hello &lt;world&gt;<br>line two</p>\n<p>Next</p>"
        );
        assert_eq!(text_to_html("   "), "");
    }
}
