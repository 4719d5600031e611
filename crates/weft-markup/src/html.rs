use std::fmt::Write;

use crate::document::{Document, NodeId};
use crate::node::NodeKind;

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl Document {
    /// Serializes the subtree rooted at `id`, `id` included.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, false, &mut out);
        out
    }

    /// Serializes the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self.tag(id).is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, raw, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, raw: bool, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };

        match kind {
            NodeKind::Document => {
                for child in self.children(id) {
                    self.write_html(*child, false, out);
                }
            }
            NodeKind::Doctype(name) => {
                let _ = write!(out, "<!DOCTYPE {name}>");
            }
            NodeKind::Text(text) if raw => out.push_str(text),
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
                out.push('>');

                if is_void_element(&element.name) {
                    return;
                }

                let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
                for child in self.children(id) {
                    self.write_html(*child, raw, out);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_html(self.root()))
    }
}

#[cfg(feature = "html")]
mod parse {
    use ego_tree::NodeRef;
    use scraper::{Html, Node};

    use crate::document::{Document, NodeId};

    impl Document {
        /// Loads a complete HTML document. The parser always produces
        /// `html`, `head` and `body` elements.
        pub fn parse_html(source: &str) -> Self {
            let html = Html::parse_document(source);
            let mut doc = Document::new();
            let root = doc.root();
            doc.import_children(html.tree.root(), root);
            doc
        }

        /// Loads an HTML fragment; its top-level nodes become children of the
        /// document root.
        pub fn parse_fragment(source: &str) -> Self {
            let html = Html::parse_fragment(source);
            let mut doc = Document::new();
            let root = doc.root();
            doc.import_children(*html.root_element(), root);
            doc
        }

        fn import_children(&mut self, from: NodeRef<'_, Node>, parent: NodeId) {
            for child in from.children() {
                let id = match child.value() {
                    Node::Element(element) => {
                        let id = self.create_element(element.name());
                        // Attribute storage order in the parser is not stable.
                        let mut attributes = element.attrs().collect::<Vec<_>>();
                        attributes.sort_by(|a, b| a.0.cmp(b.0));
                        for (name, value) in attributes {
                            let _ = self.set_attribute(id, name, value);
                        }
                        self.import_children(child, id);
                        id
                    }
                    Node::Text(text) => self.create_text(&**text),
                    Node::Comment(comment) => self.create_comment(&**comment),
                    Node::Doctype(doctype) => self.create_doctype(doctype.name()),
                    _ => continue,
                };
                let _ = self.append(parent, id);
            }
        }
    }
}
