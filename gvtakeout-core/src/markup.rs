//! Generic markup tree
//!
//! The extractor never looks at raw bytes. It walks this small owned tree,
//! which is built by `html5ever` (through `markup5ever_rcdom`) and converted
//! once. Only elements and text survive the conversion; comments, doctypes
//! and processing instructions carry nothing the extractor needs.

use crate::error::{Error, Result};
use html5ever::tendril::TendrilSink;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::io::Read;

/// Tag used for the synthetic document root.
pub const DOCUMENT_TAG: &str = "#document";

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Element {
    /// Value of the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Whether the class attribute contains `token` as a whole word.
    pub fn has_class(&self, token: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == token))
            .unwrap_or(false)
    }

    /// Phone number from an `href="tel:..."` attribute.
    pub fn tel(&self) -> Option<&str> {
        self.attrs
            .iter()
            .filter(|a| a.name == "href")
            .find_map(|a| a.value.strip_prefix("tel:"))
    }

    /// Concatenated text of every descendant text node, trimmed.
    pub fn text(&self) -> String {
        let mut text = String::new();
        self.walk_text(&mut |t| text.push_str(t));
        text.trim().to_string()
    }

    /// Visit every descendant text node in document order.
    pub fn walk_text<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        for child in &self.children {
            match child {
                Node::Text(t) => visit(t),
                Node::Element(el) => el.walk_text(visit),
            }
        }
    }

    /// Depth-first, pre-order visit of this element and all element
    /// descendants. `ancestors` holds the path from `self` down to the
    /// visited element's parent (empty for `self`).
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element, &[&'a Element])) {
        let mut ancestors = Vec::new();
        self.walk_inner(&mut ancestors, visit);
    }

    fn walk_inner<'a>(
        &'a self,
        ancestors: &mut Vec<&'a Element>,
        visit: &mut impl FnMut(&'a Element, &[&'a Element]),
    ) {
        visit(self, ancestors);
        ancestors.push(self);
        for child in &self.children {
            if let Node::Element(el) = child {
                el.walk_inner(ancestors, visit);
            }
        }
        ancestors.pop();
    }
}

/// Build a tree from an HTML byte stream.
///
/// The tree builder itself tolerates any malformed markup; the only
/// structural failure is being unable to read the input.
pub fn parse_document<R: Read>(reader: &mut R) -> Result<Element> {
    let dom = html5ever::parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .read_from(reader)
        .map_err(|e| Error::Markup {
            message: format!("failed to read document: {}", e),
        })?;
    Ok(convert_document(&dom))
}

/// Build a tree from an in-memory HTML string.
pub fn parse_str(html: &str) -> Element {
    let dom = html5ever::parse_document(RcDom::default(), ParseOpts::default()).one(html);
    convert_document(&dom)
}

fn convert_document(dom: &RcDom) -> Element {
    Element {
        tag: DOCUMENT_TAG.to_string(),
        attrs: Vec::new(),
        children: convert_children(&dom.document),
    }
}

fn convert_children(handle: &Handle) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert)
        .collect()
}

fn convert(handle: &Handle) -> Option<Node> {
    match handle.data {
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => Some(Node::Element(Element {
            tag: name.local.to_string(),
            attrs: attrs
                .borrow()
                .iter()
                .map(|a| Attribute {
                    name: a.name.local.to_string(),
                    value: a.value.to_string(),
                })
                .collect(),
            children: convert_children(handle),
        })),
        NodeData::Text { ref contents } => Some(Node::Text(contents.borrow().to_string())),
        _ => None,
    }
}
