//! XPath-traversable documents built from raw HTML or XML text.
//!
//! HTML goes through `scraper` (html5ever, so tag soup is repaired the way a
//! browser would); XML goes through `quick-xml`. Both are copied into an
//! `sxd-document` tree, which `sxd-xpath` evaluates expressions against.
//!
//! XML namespaces are flattened to local names while copying, so an expression
//! like `//entry/title` matches an Atom document without namespace bindings.
//!
//! Neither tree is `Send`. Build, query and drop an [`XPathDocument`] inside one
//! synchronous function; never hold it across an `.await`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{ElementRef, Html};
use sxd_document::{dom, Package};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value, XPath};
use thiserror::Error;

/// SEC-003: Maximum element nesting copied into the tree.
const MAX_DEPTH: usize = 512;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Malformed XML: {0}")]
    Xml(String),
    #[error("Document nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("Invalid XPath expression {expr:?}: {reason}")]
    XPath { expr: String, reason: String },
}

/// An owned document tree that XPath expressions can be evaluated against.
pub struct XPathDocument {
    package: Package,
}

impl XPathDocument {
    /// Parses HTML. Never fails: html5ever recovers from any input.
    pub fn parse_html(text: &str) -> Self {
        let html = Html::parse_document(text);
        let package = Package::new();
        {
            let doc = package.as_document();
            let root = copy_html_element(&doc, html.root_element(), 0);
            doc.root().append_child(root);
        }
        Self { package }
    }

    /// Parses well-formed XML.
    pub fn parse_xml(text: &str) -> Result<Self, DocumentError> {
        let package = Package::new();
        {
            let doc = package.as_document();
            let mut reader = Reader::from_str(text);

            let mut stack: Vec<dom::Element<'_>> = Vec::new();
            let mut has_root = false;

            loop {
                match reader.read_event() {
                    Ok(Event::Start(e)) => {
                        if stack.len() >= MAX_DEPTH {
                            return Err(DocumentError::TooDeep(MAX_DEPTH));
                        }
                        let element = copy_xml_element(&doc, &e, &reader);
                        attach(&doc, &stack, &mut has_root, element)?;
                        stack.push(element);
                    }
                    Ok(Event::Empty(e)) => {
                        let element = copy_xml_element(&doc, &e, &reader);
                        attach(&doc, &stack, &mut has_root, element)?;
                    }
                    Ok(Event::End(_)) => {
                        stack.pop();
                    }
                    Ok(Event::Text(t)) => {
                        if let Some(parent) = stack.last() {
                            // Undeclared HTML entities (&nbsp;) fail to unescape; keep the raw text
                            let text = match t.unescape() {
                                Ok(text) => text.into_owned(),
                                Err(_) => String::from_utf8_lossy(&t).into_owned(),
                            };
                            parent.append_child(doc.create_text(&text));
                        }
                    }
                    Ok(Event::CData(c)) => {
                        if let Some(parent) = stack.last() {
                            parent.append_child(doc.create_text(&String::from_utf8_lossy(&c)));
                        }
                    }
                    Ok(Event::Eof) => break,
                    Err(e) => return Err(DocumentError::Xml(e.to_string())),
                    _ => {}
                }
            }

            if !has_root {
                return Err(DocumentError::Xml("document has no root element".to_string()));
            }
        }
        Ok(Self { package })
    }

    /// The document node, the context for absolute expressions.
    pub fn root(&self) -> Node<'_> {
        self.package.as_document().root().into()
    }
}

fn copy_html_element<'d>(
    doc: &dom::Document<'d>,
    source: ElementRef<'_>,
    depth: usize,
) -> dom::Element<'d> {
    let element = doc.create_element(source.value().name());
    for (name, value) in source.value().attrs() {
        element.set_attribute_value(name, value);
    }

    if depth >= MAX_DEPTH {
        tracing::debug!(depth, "HTML nesting limit reached, truncating subtree");
        return element;
    }

    for child in source.children() {
        match child.value() {
            scraper::Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    element.append_child(copy_html_element(doc, child_element, depth + 1));
                }
            }
            scraper::Node::Text(text) => {
                element.append_child(doc.create_text(text));
            }
            _ => {}
        }
    }

    element
}

fn copy_xml_element<'d>(
    doc: &dom::Document<'d>,
    start: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> dom::Element<'d> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let element = doc.create_element(name.as_str());

    for attr in start.attributes().flatten() {
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.set_attribute_value(key.as_str(), &value);
    }

    element
}

fn attach<'d>(
    doc: &dom::Document<'d>,
    stack: &[dom::Element<'d>],
    has_root: &mut bool,
    element: dom::Element<'d>,
) -> Result<(), DocumentError> {
    match stack.last() {
        Some(parent) => parent.append_child(element),
        None if !*has_root => {
            doc.root().append_child(element);
            *has_root = true;
        }
        None => return Err(DocumentError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

/// Compiles an XPath expression.
pub fn compile(expr: &str) -> Result<XPath, DocumentError> {
    Factory::new()
        .build(expr)
        .map_err(|e| DocumentError::XPath {
            expr: expr.to_owned(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| DocumentError::XPath {
            expr: expr.to_owned(),
            reason: "empty expression".to_string(),
        })
}

/// Every node the expression selects from `context`, in document order.
///
/// Non-nodeset results and evaluation errors yield an empty list.
pub fn select_nodes<'d>(xpath: &XPath, context: Node<'d>) -> Vec<Node<'d>> {
    let ctx = Context::new();
    match xpath.evaluate(&ctx, context) {
        Ok(Value::Nodeset(nodes)) => nodes.document_order(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::debug!(error = ?e, "XPath evaluation failed");
            Vec::new()
        }
    }
}

/// The first selected node, if the expression yields a nodeset.
pub fn select_first<'d>(xpath: &XPath, context: Node<'d>) -> Option<Node<'d>> {
    select_nodes(xpath, context).into_iter().next()
}

/// String value of the expression: the first node's text for nodesets, the
/// converted value for strings, numbers and booleans.
pub fn select_string(xpath: &XPath, context: Node<'_>) -> Option<String> {
    let ctx = Context::new();
    match xpath.evaluate(&ctx, context) {
        Ok(Value::Nodeset(nodes)) => nodes
            .document_order()
            .into_iter()
            .next()
            .map(|node| node.string_value()),
        Ok(value) => Some(value.string()),
        Err(e) => {
            tracing::debug!(error = ?e, "XPath evaluation failed");
            None
        }
    }
}

/// Local name of an element node.
pub fn element_name(node: &Node<'_>) -> Option<String> {
    match node {
        Node::Element(element) => Some(element.name().local_part().to_ascii_lowercase()),
        _ => None,
    }
}

/// Attribute value of an element node.
pub fn attribute(node: &Node<'_>, name: &str) -> Option<String> {
    match node {
        Node::Element(element) => element.attribute_value(name).map(str::to_owned),
        _ => None,
    }
}

/// Value of an attribute node selected directly (`.../@href`).
pub fn attribute_node_value(node: &Node<'_>) -> Option<String> {
    match node {
        Node::Attribute(attr) => Some(attr.value().to_owned()),
        _ => None,
    }
}
