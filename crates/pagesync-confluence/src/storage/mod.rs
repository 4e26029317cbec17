//! Confluence storage-format transformation.
//!
//! Rewrites rendered HTML into the storage dialect Confluence expects:
//! GitHub-style alert block-quotes become panel macros and fenced code blocks
//! become the code macro. Everything else passes through untouched.
//!
//! # Example
//!
//! ```
//! use pagesync_confluence::storage::{ContentTransformer, TransformOptions};
//!
//! let transformer = ContentTransformer::new(TransformOptions::default());
//! let out = transformer.transform(r#"<pre><code class="language-sh">ls</code></pre>"#);
//! assert_eq!(
//!     out,
//!     r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">sh</ac:parameter><ac:plain-text-body><![CDATA[ls]]></ac:plain-text-body></ac:structured-macro>"#
//! );
//! ```

mod alert;
mod code;
mod entities;
mod parser;
mod rules;
mod serializer;
mod tree;

pub use parser::parse;
pub use serializer::serialize;
pub use tree::{Element, Node};

use tracing::warn;

use self::alert::AlertRule;
use self::code::CodeBlockRule;
use self::rules::{RewriteRule, Visitor};

/// Transformer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Rewrite `<pre><code>` blocks into the code macro.
    pub code_blocks: bool,
    /// Notice prepended to every page. `{title}` and `{relative_path}` are
    /// replaced with the document's values.
    pub notice_message: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            code_blocks: true,
            notice_message: None,
        }
    }
}

/// Rewrites storage-format trees with a fixed, ordered rule list.
pub struct ContentTransformer {
    rules: Vec<Box<dyn RewriteRule>>,
    notice_message: Option<String>,
}

impl ContentTransformer {
    /// Create a transformer for the given options.
    #[must_use]
    pub fn new(options: TransformOptions) -> Self {
        let mut rules: Vec<Box<dyn RewriteRule>> = vec![Box::new(AlertRule)];
        if options.code_blocks {
            rules.push(Box::new(CodeBlockRule));
        }
        Self {
            rules,
            notice_message: options.notice_message,
        }
    }

    /// Rewrite a parsed fragment.
    pub fn transform_tree(&self, nodes: Vec<Node>) -> Vec<Node> {
        Visitor::new(&self.rules).visit_all(nodes)
    }

    /// Rewrite raw markup.
    ///
    /// Markup that does not parse is returned unchanged.
    pub fn transform(&self, markup: &str) -> String {
        match parse(markup) {
            Ok(nodes) => serialize(&self.transform_tree(nodes)),
            Err(e) => {
                warn!("Content could not be parsed, sending it unchanged: {e}");
                markup.to_owned()
            }
        }
    }

    /// Notice paragraph for a document, if a notice is configured.
    pub fn notice(&self, title: &str, relative_path: &str) -> Option<Node> {
        let template = self.notice_message.as_deref()?;
        let text = template
            .replace("{title}", title)
            .replace("{relative_path}", relative_path);
        Some(
            Element::new("p")
                .with_children(vec![
                    Element::new("em")
                        .with_children(vec![Node::text(text)])
                        .into(),
                ])
                .into(),
        )
    }
}

/// Attributes Confluence adds to macros when a page is saved.
const SERVER_ATTRIBUTES: &[&str] = &["ac:schema-version", "ac:macro-id", "ac:local-id"];

/// Canonical form of storage markup for change detection.
///
/// Parsing and re-serializing removes differences in attribute quoting,
/// entity spelling and self-closing syntax. Attributes the server stamps on
/// macros are dropped and surrounding whitespace is ignored.
pub fn normalize(markup: &str) -> String {
    match parse(markup) {
        Ok(mut nodes) => {
            strip_server_attributes(&mut nodes);
            serialize(&nodes).trim().to_owned()
        }
        Err(_) => markup.trim().to_owned(),
    }
}

fn strip_server_attributes(nodes: &mut [Node]) {
    for node in nodes {
        if let Node::Element(element) = node {
            element
                .attrs
                .retain(|(key, _)| !SERVER_ATTRIBUTES.contains(&key.as_str()));
            strip_server_attributes(&mut element.children);
        }
    }
}
