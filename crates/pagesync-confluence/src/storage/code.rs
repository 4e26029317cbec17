//! Fenced code blocks to the Confluence code macro.

use super::rules::RewriteRule;
use super::tree::{Element, Node};

/// Rewrites `<pre><code class="language-X">…</code></pre>`.
pub(super) struct CodeBlockRule;

impl CodeBlockRule {
    /// The `<code>` child, when it is the only meaningful child of `<pre>`.
    fn code_child(element: &Element) -> Option<&Element> {
        let mut meaningful = element.meaningful_children();
        let (_, only) = meaningful.next()?;
        if meaningful.next().is_some() {
            return None;
        }
        only.as_element().filter(|code| code.tag == "code")
    }
}

/// Language from a `language-X` class.
fn language(code: &Element) -> Option<&str> {
    code.attr("class")?
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty())
}

impl RewriteRule for CodeBlockRule {
    fn matches(&self, element: &Element) -> bool {
        element.tag == "pre" && Self::code_child(element).is_some()
    }

    fn rewrite(&self, element: Element) -> Node {
        let Some(code) = Self::code_child(&element) else {
            return element.into();
        };

        let mut children = Vec::with_capacity(2);
        if let Some(lang) = language(code) {
            children.push(
                Element::new("ac:parameter")
                    .with_attr("ac:name", "language")
                    .with_children(vec![Node::text(lang)])
                    .into(),
            );
        }
        let text = Node::Element(code.clone()).text_content();
        children.push(
            Element::new("ac:plain-text-body")
                .with_children(vec![Node::CData(text)])
                .into(),
        );

        Element::new("ac:structured-macro")
            .with_attr("ac:name", "code")
            .with_children(children)
            .into()
    }
}
