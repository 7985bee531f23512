use crate::chat::layout::PageLayout;
use crate::dom::{DomTree, ElementNode, Match, SelectorPath};

/// A message unit located in a snapshot
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    pub element: &'a ElementNode,

    /// The logical turn the unit sits in (its parent, or shadow host)
    pub parent: Option<&'a ElementNode>,
}

impl<'a> From<Match<'a>> for Unit<'a> {
    fn from(m: Match<'a>) -> Self {
        Self {
            element: m.element,
            parent: m.parent,
        }
    }
}

/// Finds the conversation's parts in a snapshot by trying the layout's candidate paths in order
///
/// Nothing here fails: a path that does not resolve is skipped, and absence is reported as
/// `None` or an empty list.
#[derive(Debug, Clone, Copy)]
pub struct TreeLocator<'l> {
    layout: &'l PageLayout,
}

impl<'l> TreeLocator<'l> {
    pub fn new(layout: &'l PageLayout) -> Self {
        Self { layout }
    }

    /// The element holding all message units
    pub fn find_container<'a>(&self, tree: &'a DomTree) -> Option<&'a ElementNode> {
        let found = first_hit(&self.layout.container, |path| path.first_in_document(&tree.root));
        if found.is_none() {
            log::debug!("No chat container matched any of {} candidate paths", self.layout.container.len());
        }
        found
    }

    /// Message units in document order; empty when there is no container
    pub fn find_units<'a>(&self, tree: &'a DomTree) -> Vec<Unit<'a>> {
        self.find_container(tree)
            .map(|container| self.units_in(container))
            .unwrap_or_default()
    }

    /// Message units inside a located container, in document order
    pub fn units_in<'a>(&self, container: &'a ElementNode) -> Vec<Unit<'a>> {
        for path in &self.layout.units {
            let matches = path.query_within(container);
            if !matches.is_empty() {
                log::debug!("Located {} message units with '{}'", matches.len(), path);
                return matches.into_iter().map(Unit::from).collect();
            }
        }
        Vec::new()
    }

    /// The element holding the conversation title
    pub fn find_title<'a>(&self, tree: &'a DomTree) -> Option<&'a ElementNode> {
        first_hit(&self.layout.title, |path| path.first_in_document(&tree.root))
    }

    /// Where an export affordance would attach; the document root when nothing better exists
    pub fn find_anchor<'a>(&self, tree: &'a DomTree) -> &'a ElementNode {
        first_hit(&self.layout.anchor, |path| path.first_in_document(&tree.root)).unwrap_or(&tree.root)
    }
}

fn first_hit<'a>(
    paths: &[SelectorPath],
    mut query: impl FnMut(&SelectorPath) -> Option<&'a ElementNode>,
) -> Option<&'a ElementNode> {
    paths.iter().find_map(|path| query(path))
}
