//! HTML loading via `scraper` (html5ever)
//!
//! The parsed tree is copied into a [`Document`]. Children of `<template>`
//! elements land in the template's content fragment.

use ego_tree::NodeRef;
use scraper::{Html, Node};

use crate::dom::{Document, NodeId};

/// Parse a full HTML page
///
/// html5ever is forgiving: any input yields a document (with the usual
/// implied `html`, `head` and `body` elements).
pub fn parse_html(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let root = doc.root();
    for child in parsed.tree.root().children() {
        import(&mut doc, root, child);
    }
    doc
}

fn import(doc: &mut Document, parent: NodeId, node: NodeRef<'_, Node>) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                import(doc, parent, child);
            }
        }
        Node::Doctype(doctype) => doc.set_doctype(doctype.name()),
        Node::Element(element) => {
            let id = doc.create_element(element.name());
            for (name, value) in element.attrs() {
                doc.set_attribute(id, name, value);
            }
            let container = doc.template_content(id).unwrap_or(id);
            for child in node.children() {
                import(doc, container, child);
            }
            doc.append_child(parent, id);
        }
        Node::Text(text) => {
            let text: &str = text;
            let id = doc.create_text(text);
            doc.append_child(parent, id);
        }
        Node::Comment(comment) => {
            let comment: &str = comment;
            let id = doc.create_comment(comment);
            doc.append_child(parent, id);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_template_content_into_fragment() {
        let doc = parse_html(
            r#"<!DOCTYPE html><html><body><div id="out"><template hx-endpoint="/api"><p>Hello ${name}</p></template></div></body></html>"#,
        );
        let tpl = doc.select_first("template").unwrap().unwrap();
        let content = doc.template_content(tpl).unwrap();

        assert!(doc.children(tpl).is_empty());
        assert_eq!(doc.inner_html(content), "<p>Hello ${name}</p>");
        assert_eq!(doc.get_attribute(tpl, "hx-endpoint"), Some("/api"));
    }

    #[test]
    fn round_trips_doctype_and_body() {
        let doc = parse_html("<!DOCTYPE html><p class=\"x\">a &amp; b</p>");
        let html = doc.to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p class=\"x\">a &amp; b</p>"));
    }

    #[test]
    fn textarea_value_comes_from_text() {
        let doc = parse_html("<textarea id=\"t\">typed</textarea>");
        let textarea = doc.select_first("#t").unwrap().unwrap();
        assert_eq!(doc.value(textarea).as_deref(), Some("typed"));
    }
}
