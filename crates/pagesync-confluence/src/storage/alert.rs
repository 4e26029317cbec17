//! GitHub-style alert block-quotes to Confluence panel macros.

use std::sync::LazyLock;

use regex::Regex;

use super::rules::RewriteRule;
use super::tree::{Element, Node};

static ALERT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[!(NOTE|TIP|IMPORTANT|WARNING|CAUTION)\]").expect("invalid alert regex")
});

/// Macro name and panel title for an alert marker.
fn alert_macro(marker: &str) -> Option<(&'static str, &'static str)> {
    Some(match marker {
        "NOTE" => ("info", "Note"),
        "TIP" => ("tip", "Tip"),
        "IMPORTANT" => ("note", "Important"),
        "WARNING" => ("warning", "Warning"),
        "CAUTION" => ("warning", "Caution"),
        _ => return None,
    })
}

/// Where the alert marker was found.
enum MarkerSite {
    /// Leading text of the first paragraph.
    Paragraph,
    /// Text directly inside the block-quote.
    DirectText,
}

struct Alert {
    /// Index of the child holding the marker.
    index: usize,
    site: MarkerSite,
    macro_name: &'static str,
    title: &'static str,
    /// Text after the marker.
    remainder: String,
}

/// Rewrites `<blockquote>` starting with `[!NOTE]` and friends.
///
/// ```text
/// <blockquote><p>[!WARNING]
/// Do not do X</p></blockquote>
/// ```
/// becomes
/// ```text
/// <ac:structured-macro ac:name="warning">
///   <ac:parameter ac:name="title">Warning</ac:parameter>
///   <ac:rich-text-body><p>Do not do X</p></ac:rich-text-body>
/// </ac:structured-macro>
/// ```
pub(super) struct AlertRule;

impl AlertRule {
    fn find(element: &Element) -> Option<Alert> {
        let (index, first) = element.meaningful_children().next()?;

        let (site, text) = match first {
            Node::Text(text) => (MarkerSite::DirectText, text.trim_start()),
            Node::Element(p) if p.tag == "p" => match p.children.first() {
                Some(Node::Text(text)) => (MarkerSite::Paragraph, text.as_str()),
                _ => return None,
            },
            _ => return None,
        };

        let caps = ALERT_MARKER.captures(text)?;
        let (macro_name, title) = alert_macro(&caps[1])?;
        Some(Alert {
            index,
            site,
            macro_name,
            title,
            remainder: text[caps[0].len()..].to_owned(),
        })
    }
}

impl RewriteRule for AlertRule {
    fn matches(&self, element: &Element) -> bool {
        element.tag == "blockquote" && Self::find(element).is_some()
    }

    fn rewrite(&self, element: Element) -> Node {
        let Some(alert) = Self::find(&element) else {
            return element.into();
        };

        let mut children = element.children.into_iter().skip(alert.index);
        let mut body = Vec::new();

        match (alert.site, children.next()) {
            (MarkerSite::DirectText, _) => {
                let remainder = alert.remainder.trim();
                if !remainder.is_empty() {
                    body.push(
                        Element::new("p")
                            .with_children(vec![Node::text(remainder)])
                            .into(),
                    );
                }
            }
            (MarkerSite::Paragraph, Some(Node::Element(mut paragraph))) => {
                // Trailing space is kept when inline content follows the marker text.
                let remainder = if paragraph.children.len() == 1 {
                    alert.remainder.trim()
                } else {
                    alert.remainder.trim_start()
                };
                if remainder.is_empty() {
                    paragraph.children.remove(0);
                    // A hard break right after the marker belongs to the marker line.
                    if matches!(paragraph.children.first(), Some(Node::Element(br)) if br.tag == "br")
                    {
                        paragraph.children.remove(0);
                    }
                } else {
                    paragraph.children[0] = Node::text(remainder);
                }
                if paragraph.children.iter().any(|c| !c.is_blank()) {
                    body.push(paragraph.into());
                }
            }
            (MarkerSite::Paragraph, _) => {}
        }
        body.extend(children);

        Element::new("ac:structured-macro")
            .with_attr("ac:name", alert.macro_name)
            .with_children(vec![
                Element::new("ac:parameter")
                    .with_attr("ac:name", "title")
                    .with_children(vec![Node::text(alert.title)])
                    .into(),
                Element::new("ac:rich-text-body")
                    .with_children(body)
                    .into(),
            ])
            .into()
    }
}
