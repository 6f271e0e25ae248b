//! XML reading helpers over `roxmltree` and a small string builder for
//! replies.
//!
//! NETCONF payloads are matched by local name only; prefixes and namespaces
//! on elements and on the `operation` attribute are ignored.

use std::borrow::Cow;

use quick_xml::escape::escape;
use roxmltree::{Document, Node};

use crate::error::CoreError;

pub fn parse(text: &str) -> Result<Document<'_>, CoreError> {
    Document::parse(text).map_err(|e| {
        tracing::debug!(error = %e, "XML parse failed");
        CoreError::MalformedXml
    })
}

pub fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

pub fn first_child_element<'a, 'input>(node: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    child_elements(node).next()
}

pub fn has_child_elements(node: Node<'_, '_>) -> bool {
    first_child_element(node).is_some()
}

pub fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Prefix bound to the element's namespace, e.g. `if` for
/// `<if:interfaces xmlns:if="...">`.
pub fn written_prefix<'input>(node: Node<'_, 'input>) -> Option<&'input str> {
    let uri = node.tag_name().namespace()?;
    node.lookup_prefix(uri).filter(|prefix| !prefix.is_empty())
}

/// First element (self included) with the given local name, depth first.
pub fn find<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Attribute value by local name, whatever its namespace.
pub fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attr| attr.name() == name)
        .map(|attr| attr.value())
}

/// Trimmed text of the element's first text child.
pub fn trimmed_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

// ── Reply fragments ──────────────────────────────────────────────────

/// How text written into a [`XmlBuilder`] is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    /// Standard XML escaping; the output is sent as is (hello).
    Direct,
    /// Escaped twice. Reply assembly turns every `&amp;` back into `&`
    /// exactly once, which leaves standard escaping on the wire.
    Embedded,
}

/// Minimal append-only XML writer.
#[derive(Debug)]
pub struct XmlBuilder {
    out: String,
    escaping: Escaping,
}

impl XmlBuilder {
    pub fn new(escaping: Escaping) -> Self {
        Self {
            out: String::new(),
            escaping,
        }
    }

    fn escaped<'s>(&self, text: &'s str) -> Cow<'s, str> {
        match self.escaping {
            Escaping::Direct => escape(text),
            Escaping::Embedded => match escape(text) {
                Cow::Borrowed(s) => Cow::Borrowed(s),
                Cow::Owned(once) => Cow::Owned(escape(&once).into_owned()),
            },
        }
    }

    pub fn open(&mut self, name: &str) -> &mut Self {
        self.open_with(name, &[])
    }

    pub fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            let value = self.escaped(value).into_owned();
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&value);
            self.out.push('"');
        }
        self.out.push('>');
        self
    }

    pub fn close(&mut self, name: &str) -> &mut Self {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        let escaped = self.escaped(text).into_owned();
        self.out.push_str(&escaped);
        self
    }

    /// `<name>text</name>`
    pub fn leaf(&mut self, name: &str, text: &str) -> &mut Self {
        self.open(name).text(text).close(name)
    }

    /// Append an already-formed fragment untouched.
    pub fn raw(&mut self, fragment: &str) -> &mut Self {
        self.out.push_str(fragment);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}
