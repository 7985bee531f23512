//! CSS-like selector paths that can cross shadow boundaries
//!
//! A path is one or more selector lists joined by `>>>`. Each `>>>` is an explicit hop into the
//! open shadow root of the element matched so far; ordinary descendant matching never crosses a
//! shadow boundary on its own. A path starting with `>>>` enters the scope element's own shadow
//! root first.
//!
//! Supported within a list: `tag`, `*`, `.class`, `#id`, `[attr]`, `[attr=value]`,
//! `[attr*=value]`, `[attr^=value]`, the descendant (whitespace) and child (`>`) combinators, and
//! `,` alternatives.

use crate::dom::element::{DomNode, ElementNode};
use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// An element matched by a selector path, with the element that owns it
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub element: &'a ElementNode,

    /// Light-DOM parent, or the shadow host for top-level shadow content
    pub parent: Option<&'a ElementNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// `parts[i].0` links `parts[i - 1]` to `parts[i]`; ignored for the first part
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq)]
struct SelectorList(Vec<Complex>);

/// Parsed selector path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SelectorPath {
    source: String,
    enter_scope_shadow: bool,
    hops: Vec<SelectorList>,
}

impl SelectorPath {
    /// Parse a selector path
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| ExportError::InvalidSelector {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty selector"));
        }

        let mut segments: Vec<&str> = trimmed.split(">>>").map(str::trim).collect();
        let enter_scope_shadow = segments.first().is_some_and(|s| s.is_empty());
        if enter_scope_shadow {
            segments.remove(0);
        }

        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment around '>>>'"));
        }

        let hops = segments
            .into_iter()
            .map(|segment| parse_list(segment).map_err(|reason| invalid(&reason)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: trimmed.to_string(),
            enter_scope_shadow,
            hops,
        })
    }

    /// The text this path was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matches of this path within the document rooted at `root` (the root itself included),
    /// in document order and without duplicates
    pub fn query_document<'a>(&self, root: &'a ElementNode) -> Vec<Match<'a>> {
        self.query(root, true)
    }

    /// All matches among the descendants of `scope`, in document order and without duplicates
    pub fn query_within<'a>(&self, scope: &'a ElementNode) -> Vec<Match<'a>> {
        self.query(scope, false)
    }

    /// First match within the document rooted at `root`
    pub fn first_in_document<'a>(&self, root: &'a ElementNode) -> Option<&'a ElementNode> {
        self.query_document(root).first().map(|m| m.element)
    }

    /// First match among the descendants of `scope`
    pub fn first_within<'a>(&self, scope: &'a ElementNode) -> Option<&'a ElementNode> {
        self.query_within(scope).first().map(|m| m.element)
    }

    /// Whether the element itself matches the final hop of this path
    pub fn matches(&self, element: &ElementNode) -> bool {
        self.hops
            .last()
            .is_some_and(|list| list.0.iter().any(|c| c.matches(element, &[])))
    }

    fn query<'a>(&self, scope: &'a ElementNode, include_scope: bool) -> Vec<Match<'a>> {
        let mut roots: Vec<SearchRoot<'a>> = if self.enter_scope_shadow {
            match enter(scope) {
                Some(root) => vec![root],
                None => return Vec::new(),
            }
        } else {
            vec![SearchRoot::Element { element: scope, include_self: include_scope }]
        };

        let mut found = Vec::new();
        for (i, list) in self.hops.iter().enumerate() {
            found.clear();
            for root in &roots {
                root.collect(list, &mut found);
            }

            if i + 1 < self.hops.len() {
                // Hosts without a shadow root end their branch here
                roots = found.iter().filter_map(|m| enter(m.element)).collect();
                if roots.is_empty() {
                    return Vec::new();
                }
            }
        }

        dedupe(found)
    }
}

impl FromStr for SelectorPath {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SelectorPath {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SelectorPath> for String {
    fn from(path: SelectorPath) -> Self {
        path.source
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Where one hop of a path searches
enum SearchRoot<'a> {
    Element { element: &'a ElementNode, include_self: bool },
    Shadow { host: &'a ElementNode, children: &'a [DomNode] },
}

impl<'a> SearchRoot<'a> {
    fn collect(&self, list: &SelectorList, out: &mut Vec<Match<'a>>) {
        let mut ancestors = Vec::new();
        match *self {
            SearchRoot::Element { element, include_self } => {
                if include_self {
                    walk(element, None, &mut ancestors, list, out);
                } else {
                    ancestors.push(element);
                    for child in element.child_elements() {
                        walk(child, Some(element), &mut ancestors, list, out);
                    }
                }
            }
            SearchRoot::Shadow { host, children } => {
                for child in children.iter().filter_map(DomNode::as_element) {
                    walk(child, Some(host), &mut ancestors, list, out);
                }
            }
        }
    }
}

/// The one hop primitive: step into an element's shadow root, if it has one
fn enter(host: &ElementNode) -> Option<SearchRoot<'_>> {
    host.shadow_root
        .as_deref()
        .map(|children| SearchRoot::Shadow { host, children })
}

fn walk<'a>(
    element: &'a ElementNode,
    parent: Option<&'a ElementNode>,
    ancestors: &mut Vec<&'a ElementNode>,
    list: &SelectorList,
    out: &mut Vec<Match<'a>>,
) {
    if list.0.iter().any(|c| c.matches(element, ancestors)) {
        out.push(Match { element, parent });
    }

    ancestors.push(element);
    for child in element.child_elements() {
        walk(child, Some(element), ancestors, list, out);
    }
    ancestors.pop();
}

fn dedupe(matches: Vec<Match<'_>>) -> Vec<Match<'_>> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(m.element as *const ElementNode))
        .collect()
}

impl Complex {
    fn matches(&self, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        match_from(&self.parts, self.parts.len() - 1, element, ancestors)
    }
}

fn match_from(parts: &[(Combinator, Compound)], idx: usize, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
    if !parts[idx].1.matches(element) {
        return false;
    }
    if idx == 0 {
        return true;
    }

    match parts[idx].0 {
        Combinator::Child => ancestors
            .split_last()
            .is_some_and(|(parent, rest)| match_from(parts, idx - 1, parent, rest)),
        Combinator::Descendant => {
            (0..ancestors.len()).rev().any(|i| match_from(parts, idx - 1, ancestors[i], &ancestors[..i]))
        }
    }
}

impl Compound {
    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if !element.is_tag(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.id() != Some(id) {
                return false;
            }
        }

        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }

        self.attrs.iter().all(|attr| {
            let Some(value) = element.get_attribute(&attr.name) else {
                return false;
            };
            match &attr.op {
                AttrOp::Exists => true,
                AttrOp::Equals(expected) => value == expected,
                AttrOp::Contains(needle) => value.contains(needle.as_str()),
                AttrOp::Prefix(prefix) => value.starts_with(prefix.as_str()),
            }
        })
    }

    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }
}

fn parse_list(segment: &str) -> std::result::Result<SelectorList, String> {
    split_outside_brackets(segment, ',')?
        .into_iter()
        .map(|part| parse_complex(part.trim()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(SelectorList)
}

fn split_outside_brackets(input: &str, separator: char) -> std::result::Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1).ok_or("unbalanced ']'")?,
            (None, c) if c == separator && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return Err("unterminated attribute selector".to_string());
    }

    parts.push(&input[start..]);
    Ok(parts)
}

fn parse_complex(input: &str) -> std::result::Result<Complex, String> {
    if input.is_empty() {
        return Err("empty selector in list".to_string());
    }

    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut pos = 0;
    let mut pending = Combinator::Descendant;

    loop {
        let saw_space = skip_whitespace(&chars, &mut pos);
        if pos >= chars.len() {
            break;
        }

        if chars[pos] == '>' {
            if parts.is_empty() {
                return Err("selector cannot start with '>'".to_string());
            }
            pending = Combinator::Child;
            pos += 1;
            continue;
        }

        if !parts.is_empty() && !saw_space && pending == Combinator::Descendant {
            return Err(format!("unexpected character '{}'", chars[pos]));
        }

        let compound = parse_compound(&chars, &mut pos)?;
        parts.push((pending, compound));
        pending = Combinator::Descendant;
    }

    if parts.is_empty() {
        return Err("empty selector".to_string());
    }
    if pending == Combinator::Child {
        return Err("selector cannot end with '>'".to_string());
    }

    Ok(Complex { parts })
}

fn skip_whitespace(chars: &[char], pos: &mut usize) -> bool {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
    *pos > start
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(chars: &[char], pos: &mut usize) -> std::result::Result<Compound, String> {
    let mut compound = Compound::default();
    let universal = *pos < chars.len() && chars[*pos] == '*';

    if universal {
        *pos += 1;
    } else if *pos < chars.len() && is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '.' => {
                *pos += 1;
                let class = read_ident(chars, pos);
                if class.is_empty() {
                    return Err("expected class name after '.'".to_string());
                }
                compound.classes.push(class);
            }
            '#' => {
                *pos += 1;
                let id = read_ident(chars, pos);
                if id.is_empty() {
                    return Err("expected id after '#'".to_string());
                }
                compound.id = Some(id);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attribute(chars, pos)?);
            }
            c if c.is_whitespace() || c == '>' => break,
            c => return Err(format!("unexpected character '{}'", c)),
        }
    }

    if compound.is_empty() && !universal {
        return Err("expected a selector".to_string());
    }

    Ok(compound)
}

fn parse_attribute(chars: &[char], pos: &mut usize) -> std::result::Result<AttrSelector, String> {
    skip_whitespace(chars, pos);
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err("expected attribute name".to_string());
    }
    skip_whitespace(chars, pos);

    let op_kind = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrSelector { name, op: AttrOp::Exists });
        }
        Some('=') => {
            *pos += 1;
            '='
        }
        Some(&c) if (c == '*' || c == '^') && chars.get(*pos + 1) == Some(&'=') => {
            *pos += 2;
            c
        }
        _ => return Err("unterminated attribute selector".to_string()),
    };

    skip_whitespace(chars, pos);
    let value = match chars.get(*pos) {
        Some(&q) if q == '"' || q == '\'' => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated string in attribute selector".to_string());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };

    skip_whitespace(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return Err("unterminated attribute selector".to_string());
    }
    *pos += 1;

    let op = match op_kind {
        '*' => AttrOp::Contains(value),
        '^' => AttrOp::Prefix(value),
        _ => AttrOp::Equals(value),
    };
    Ok(AttrSelector { name, op })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ElementNode {
        ElementNode::new("html").with_child(
            ElementNode::new("body")
                .with_child(
                    ElementNode::new("div")
                        .with_attribute("id", "chat-history")
                        .with_child(
                            ElementNode::new("div")
                                .with_class("conversation-container")
                                .with_child(ElementNode::new("user-query").with_attribute("data-turn", "1"))
                                .with_child(
                                    ElementNode::new("model-response").with_shadow_root(vec![
                                        ElementNode::new("div")
                                            .with_class("markdown main")
                                            .with_child(ElementNode::new("p").with_text("answer")),
                                    ]),
                                ),
                        )
                        .with_child(
                            ElementNode::new("div")
                                .with_class("conversation-container")
                                .with_child(ElementNode::new("user-query").with_attribute("data-turn", "2")),
                        ),
                )
                .with_child(ElementNode::new("app-shell").with_shadow_root(vec![
                    ElementNode::new("header").with_child(ElementNode::new("span").with_class("title-text")),
                ])),
        )
    }

    fn tags(matches: &[Match<'_>]) -> Vec<String> {
        matches.iter().map(|m| m.element.tag_name.clone()).collect()
    }

    #[test]
    fn test_simple_tag_query() {
        let root = page();
        let path = SelectorPath::parse("user-query").unwrap();
        let matches = path.query_document(&root);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].element.get_attribute("data-turn").unwrap(), "1");
        assert_eq!(matches[1].element.get_attribute("data-turn").unwrap(), "2");
    }

    #[test]
    fn test_selector_list_keeps_document_order() {
        let root = page();
        let path = SelectorPath::parse("model-response, user-query").unwrap();
        assert_eq!(
            tags(&path.query_document(&root)),
            vec!["user-query", "model-response", "user-query"]
        );
    }

    #[test]
    fn test_overlapping_alternatives_are_deduplicated() {
        let root = page();
        let path = SelectorPath::parse("user-query, [data-turn]").unwrap();
        assert_eq!(path.query_document(&root).len(), 2);
    }

    #[test]
    fn test_descendant_does_not_cross_shadow_boundary() {
        let root = page();
        let path = SelectorPath::parse("model-response .markdown").unwrap();
        assert!(path.query_document(&root).is_empty());
    }

    #[test]
    fn test_shadow_hop() {
        let root = page();
        let path = SelectorPath::parse("model-response >>> .markdown").unwrap();
        let matches = path.query_document(&root);

        assert_eq!(matches.len(), 1);
        assert!(matches[0].element.has_class("main"));
        assert!(matches[0].parent.unwrap().is_tag("model-response"));
    }

    #[test]
    fn test_failed_hop_short_circuits() {
        let root = page();
        let path = SelectorPath::parse("user-query >>> .markdown").unwrap();
        assert!(path.query_document(&root).is_empty());

        let path = SelectorPath::parse("#missing >>> div").unwrap();
        assert!(path.query_document(&root).is_empty());
    }

    #[test]
    fn test_leading_hop_enters_scope_shadow() {
        let root = page();
        let response = SelectorPath::parse("model-response").unwrap().first_in_document(&root).unwrap();

        let path = SelectorPath::parse(">>> .markdown p").unwrap();
        assert_eq!(tags(&path.query_within(response)), vec!["p"]);

        let query = SelectorPath::parse("user-query").unwrap().first_in_document(&root).unwrap();
        assert!(path.query_within(query).is_empty());
    }

    #[test]
    fn test_child_combinator() {
        let root = page();
        let direct = SelectorPath::parse("#chat-history > .conversation-container").unwrap();
        assert_eq!(direct.query_document(&root).len(), 2);

        let too_deep = SelectorPath::parse("#chat-history > user-query").unwrap();
        assert!(too_deep.query_document(&root).is_empty());

        let descendant = SelectorPath::parse("#chat-history user-query").unwrap();
        assert_eq!(descendant.query_document(&root).len(), 2);
    }

    #[test]
    fn test_attribute_operators() {
        let root = page();
        assert_eq!(SelectorPath::parse("[data-turn='2']").unwrap().query_document(&root).len(), 1);
        assert_eq!(SelectorPath::parse("[class*=conversation]").unwrap().query_document(&root).len(), 2);
        assert_eq!(SelectorPath::parse("[id^=chat]").unwrap().query_document(&root).len(), 1);
        assert_eq!(SelectorPath::parse("div[data-turn]").unwrap().query_document(&root).len(), 0);
    }

    #[test]
    fn test_query_within_excludes_scope() {
        let root = page();
        let history = SelectorPath::parse("#chat-history").unwrap().first_in_document(&root).unwrap();

        assert!(SelectorPath::parse("#chat-history").unwrap().query_within(history).is_empty());
        assert_eq!(SelectorPath::parse("*").unwrap().query_within(history).len(), 5);
    }

    #[test]
    fn test_parent_is_reported() {
        let root = page();
        let matches = SelectorPath::parse("user-query").unwrap().query_document(&root);
        assert!(matches[0].parent.unwrap().has_class("conversation-container"));
    }

    #[test]
    fn test_matches_element() {
        let path = SelectorPath::parse("user-query, .user").unwrap();
        assert!(path.matches(&ElementNode::new("user-query")));
        assert!(path.matches(&ElementNode::new("div").with_class("user")));
        assert!(!path.matches(&ElementNode::new("div")));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "   ", "div[", "[=x]", "a >>>", ">>> >>> a", "> a", "a,,b", ".", "div!"] {
            assert!(SelectorPath::parse(bad).is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let paths: Vec<SelectorPath> = serde_json::from_str(r##"["#chat-history", "a >>> b"]"##).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(serde_json::to_string(&paths).unwrap(), r##"["#chat-history","a >>> b"]"##);

        let bad: std::result::Result<Vec<SelectorPath>, _> = serde_json::from_str(r#"["div["]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let path: SelectorPath = "chat-app >>> #chat-history".parse().unwrap();
        assert_eq!(path.to_string(), "chat-app >>> #chat-history");
    }
}
