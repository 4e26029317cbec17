//! Rewrite rules and the tree visitor that applies them.

use super::tree::{Element, Node};

/// One tree rewrite: a predicate on an element and its replacement.
pub(super) trait RewriteRule: Send + Sync {
    /// Whether this rule applies to `element`.
    fn matches(&self, element: &Element) -> bool;

    /// Replace a matching element. Returns the element unchanged when it
    /// turns out not to match.
    fn rewrite(&self, element: Element) -> Node;
}

/// Depth-first visitor applying the first matching rule to each element.
///
/// Children are rewritten before their parent, so a rule sees the already
/// rewritten subtree.
pub(super) struct Visitor<'a> {
    rules: &'a [Box<dyn RewriteRule>],
}

impl<'a> Visitor<'a> {
    pub(super) fn new(rules: &'a [Box<dyn RewriteRule>]) -> Self {
        Self { rules }
    }

    pub(super) fn visit_all(&self, nodes: Vec<Node>) -> Vec<Node> {
        nodes.into_iter().map(|node| self.visit(node)).collect()
    }

    fn visit(&self, node: Node) -> Node {
        match node {
            Node::Element(mut element) => {
                element.children = self.visit_all(std::mem::take(&mut element.children));
                match self.rules.iter().find(|rule| rule.matches(&element)) {
                    Some(rule) => rule.rewrite(element),
                    None => Node::Element(element),
                }
            }
            leaf => leaf,
        }
    }
}
