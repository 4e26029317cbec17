//! Storage-format serializer.

use std::fmt::Write;

use super::tree::{Element, Node};

/// Serialize nodes back to storage-format markup.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::with_capacity(4096);
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(element) => write_element(element, out),
        Node::Text(text) => escape_into(text, false, out),
        Node::CData(text) => write_cdata(text, out),
        Node::EntityRef(name) => {
            let _ = write!(out, "&{name};");
        }
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attrs {
        let _ = write!(out, " {key}=\"");
        escape_into(value, true, out);
        out.push('"');
    }

    // Only void HTML elements and Confluence `ac:`/`ri:` elements self-close;
    // an empty `<p>` stays `<p></p>`.
    if element.children.is_empty() && (element.is_void() || element.tag.contains(':')) {
        out.push_str(" />");
        return;
    }

    out.push('>');
    for child in &element.children {
        write_node(child, out);
    }
    let _ = write!(out, "</{}>", element.tag);
}

/// Write a CDATA section, splitting any `]]>` inside the content.
fn write_cdata(text: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

fn escape_into(text: &str, in_attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
