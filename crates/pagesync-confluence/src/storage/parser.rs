//! Storage-format parser with `ac:`/`ri:` namespace support.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use super::entities::{convert_html_entities, resolve_reference};
use super::tree::{Element, Node, VOID_ELEMENTS};
use crate::error::StorageError;

/// An HTML void start tag, with or without the XML `/>` terminator.
static VOID_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"<({})\b([^<>]*?)\s*/?>",
        VOID_ELEMENTS.join("|")
    ))
    .expect("invalid void element regex")
});

/// A stray end tag for a void element, such as `</br>`.
static VOID_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"</(?:{})\s*>", VOID_ELEMENTS.join("|"))).expect("invalid void end regex")
});

const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

/// Confluence XML namespaces.
const NAMESPACES: &[(&str, &str)] = &[
    ("ac", "http://www.atlassian.com/schema/confluence/4/ac/"),
    ("ri", "http://www.atlassian.com/schema/confluence/4/ri/"),
];

const WRAPPER: &str = "pagesync-root";

/// Parse a storage-format fragment into its top-level nodes.
///
/// The fragment is wrapped in an element declaring the Confluence namespaces,
/// so it may contain several top-level elements and bare text.
///
/// HTML void elements written without the XML terminator (`<br>`, `<img ...>`)
/// are accepted.
pub fn parse(markup: &str) -> Result<Vec<Node>, StorageError> {
    let markup = convert_html_entities(&close_void_elements(markup));
    let namespace_decls = NAMESPACES
        .iter()
        .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
        .collect::<Vec<_>>()
        .join(" ");
    let wrapped = format!("<{WRAPPER} {namespace_decls}>{markup}</{WRAPPER}>");

    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    // Open elements, outermost first. The wrapper is always at the bottom.
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(start_element(&e)),
            Event::Empty(e) => append(&mut stack, Node::Element(start_element(&e))),
            Event::Text(e) => append_text(&mut stack, &String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => {
                let name = lossy(&e);
                match resolve_reference(&name) {
                    Some(ch) => append_text(&mut stack, ch.encode_utf8(&mut [0; 4])),
                    None => append(&mut stack, Node::EntityRef(name)),
                }
            }
            Event::CData(e) => append(&mut stack, Node::CData(lossy(&e))),
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(StorageError::Unclosed(open.tag));
    }
    Ok(root.map(|r| r.children).unwrap_or_default())
}

/// Rewrite HTML void tags into self-closing XML form.
///
/// CDATA sections are copied as they are.
fn close_void_elements(markup: &str) -> Cow<'_, str> {
    if !VOID_START.is_match(markup) && !VOID_END.is_match(markup) {
        return Cow::Borrowed(markup);
    }

    let mut out = String::with_capacity(markup.len() + 16);
    let mut rest = markup;
    while let Some(start) = rest.find(CDATA_START) {
        let (outside, section) = rest.split_at(start);
        push_closed(outside, &mut out);
        let end = section
            .find(CDATA_END)
            .map_or(section.len(), |i| i + CDATA_END.len());
        out.push_str(&section[..end]);
        rest = &section[end..];
    }
    push_closed(rest, &mut out);
    Cow::Owned(out)
}

fn push_closed(markup: &str, out: &mut String) {
    let closed = VOID_START.replace_all(markup, "<$1$2 />");
    out.push_str(&VOID_END.replace_all(&closed, ""));
}

fn start_element(e: &BytesStart<'_>) -> Element {
    let mut element = Element::new(lossy(e.name().as_ref()));
    for attr in e.attributes().flatten() {
        let key = lossy(attr.key.as_ref());
        if key.starts_with("xmlns") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_or_else(|_| lossy(&attr.value), Cow::into_owned);
        element.attrs.push((key, value));
    }
    element
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Append text, merging with a preceding text node.
///
/// Entity references arrive as separate events; merging keeps one text node
/// per run of character data.
fn append_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(previous)) = parent.children.last_mut() {
        previous.push_str(text);
    } else {
        parent.children.push(Node::text(text));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_fragment_with_several_roots() {
        let nodes = parse("<h1>Title</h1>\n<p>Body</p>").unwrap();
        assert_eq!(
            nodes,
            vec![
                Element::new("h1").with_children(vec![Node::text("Title")]).into(),
                Node::text("\n"),
                Element::new("p").with_children(vec![Node::text("Body")]).into(),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_attribute_order() {
        let nodes = parse(r#"<ac:parameter ac:name="title" b="2" a="1">T</ac:parameter>"#).unwrap();
        let element = nodes[0].as_element().unwrap();
        assert_eq!(element.tag, "ac:parameter");
        assert_eq!(
            element.attrs,
            vec![
                ("ac:name".to_owned(), "title".to_owned()),
                ("b".to_owned(), "2".to_owned()),
                ("a".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn test_parse_merges_entity_text() {
        let nodes = parse("<p>a &lt; b&nbsp;c</p>").unwrap();
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.children, vec![Node::text("a < b\u{00a0}c")]);
    }

    #[test]
    fn test_parse_cdata() {
        let nodes = parse("<ac:plain-text-body><![CDATA[x < y]]></ac:plain-text-body>").unwrap();
        let body = nodes[0].as_element().unwrap();
        assert_eq!(body.children, vec![Node::CData("x < y".to_owned())]);
    }

    #[test]
    fn test_parse_self_closing() {
        let nodes = parse("<p>a<br />b</p>").unwrap();
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.children[1], Node::Element(Element::new("br")));
    }

    #[test]
    fn test_parse_html_void_elements() {
        let nodes = parse(r#"<p>a<br>b</p><hr><img src="x.png" alt="x"></img>"#).unwrap();
        assert_eq!(
            nodes,
            vec![
                Element::new("p")
                    .with_children(vec![
                        Node::text("a"),
                        Element::new("br").into(),
                        Node::text("b"),
                    ])
                    .into(),
                Element::new("hr").into(),
                Element::new("img")
                    .with_attr("src", "x.png")
                    .with_attr("alt", "x")
                    .into(),
            ]
        );
    }

    #[test]
    fn test_void_tags_inside_cdata_untouched() {
        let nodes = parse("<ac:plain-text-body><![CDATA[a<br>b]]></ac:plain-text-body>").unwrap();
        assert_eq!(nodes[0].text_content(), "a<br>b");
    }

    #[test]
    fn test_void_prefix_does_not_match_longer_tags() {
        let nodes = parse("<colgroup><col></colgroup>").unwrap();
        let colgroup = nodes[0].as_element().unwrap();
        assert_eq!(colgroup.tag, "colgroup");
        assert_eq!(colgroup.children, vec![Node::Element(Element::new("col"))]);
    }

    #[test]
    fn test_parse_unknown_entity_kept_by_name() {
        let nodes = parse("<p>x&nope;</p>").unwrap();
        let p = nodes[0].as_element().unwrap();
        assert_eq!(
            p.children,
            vec![Node::text("x"), Node::EntityRef("nope".to_owned())]
        );
    }

    #[test]
    fn test_parse_mismatched_tags_is_error() {
        assert!(parse("<p><strong>x</p></strong>").is_err());
    }

    #[test]
    fn test_parse_unclosed_is_error() {
        assert!(parse("<p>open").is_err());
    }
}
