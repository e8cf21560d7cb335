//! # Document Model
//!
//! Arena-backed, mutable HTML tree that bindings read from and render into.
//!
//! ## Overview
//!
//! | Type | Role |
//! |------|------|
//! | [`Document`] | Owns every node; all reads and mutations go through it |
//! | [`NodeId`] | Copyable handle into the arena |
//! | [`NodeKind`] | Document, fragment, element, text or comment |
//! | [`SharedDocument`] | `Arc<Mutex<Document>>` handed to the engine |
//!
//! Removing a node only detaches it. [`Document::release`] hands a detached
//! subtree's slots back to the arena for reuse, except for pinned nodes: the
//! engine pins every node a binding holds, so those ids stay valid after a
//! `swap` or `update` takes them out of the tree. A released id reads as an
//! empty detached fragment until its slot is reused.
//!
//! `<template>` elements own a separate content fragment (see
//! [`Document::template_content`]); their content is not part of the
//! element's children, mirroring the browser model.
//!
//! Inserting a fragment moves its children, leaving the fragment empty.

pub mod css;
pub mod parse;

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::HtmjError;
pub use css::{ElementRef, Selector};

/// Document shared between the engine and in-flight pipelines
pub type SharedDocument = Arc<Mutex<Document>>;

/// Handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element name, attributes and form state
#[derive(Debug, Clone)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Value set by the user (overrides the value derived from markup)
    dirty_value: Option<String>,
    /// Content fragment of a `<template>` element
    content: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Fragment,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    live: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            live: true,
        }
    }

    fn vacant() -> Self {
        Self {
            live: false,
            ..Self::new(NodeKind::Fragment)
        }
    }
}

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are serialized verbatim
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements exposing a form-control `value`
const VALUE_ELEMENTS: &[&str] = &[
    "input", "textarea", "select", "option", "button", "output", "data",
];

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    /// Released slots, reused by the next created nodes
    free: Vec<NodeId>,
    /// Nodes that [`Document::release`] keeps alive
    pinned: FxHashSet<NodeId>,
    root: NodeId,
    doctype: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Document)],
            free: Vec::new(),
            pinned: FxHashSet::default(),
            root: NodeId(0),
            doctype: None,
        }
    }

    /// Parse an HTML page (see [`parse::parse_html`])
    pub fn parse(html: &str) -> Self {
        parse::parse_html(html)
    }

    /// Wrap into a [`SharedDocument`]
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_doctype(&mut self, name: impl Into<String>) {
        self.doctype = Some(name.into());
    }

    // ═══════════════════════════════════════════
    // CREATION
    // ═══════════════════════════════════════════

    fn push(&mut self, kind: NodeKind) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = NodeData::new(kind);
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Create a detached element (templates get an empty content fragment)
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let name = name.to_ascii_lowercase();
        let content = (name == "template").then(|| self.create_fragment());
        self.push(NodeKind::Element(ElementData {
            name,
            attrs: Vec::new(),
            dirty_value: None,
            content,
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    // ═══════════════════════════════════════════
    // READ ACCESS
    // ═══════════════════════════════════════════

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeKind::Text(text) = &mut self.nodes[id.0].kind {
            *text = value.into();
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(key, _)| key == name) {
                Some(slot) => slot.1 = value,
                None => el.attrs.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(key, _)| key != name);
        }
    }

    /// Content fragment of a `<template>` element
    pub fn template_content(&self, id: NodeId) -> Option<NodeId> {
        self.element(id)?.content
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            _ => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Current form-control value, `None` for elements without one
    ///
    /// - `input`, `button`, `output`, `data`: `value` attribute, else `""`
    /// - `textarea`: its text
    /// - `option`: `value` attribute, else its text
    /// - `select`: value of the `selected` option, else of the first option
    pub fn value(&self, id: NodeId) -> Option<String> {
        let el = self.element(id)?;
        if !VALUE_ELEMENTS.contains(&el.name.as_str()) {
            return None;
        }
        if let Some(dirty) = &el.dirty_value {
            return Some(dirty.clone());
        }

        let value = match el.name.as_str() {
            "textarea" => self.text_content(id),
            "option" => self
                .get_attribute(id, "value")
                .map(str::to_string)
                .unwrap_or_else(|| self.text_content(id).trim().to_string()),
            "select" => {
                let options: Vec<NodeId> = self
                    .descendants(id)
                    .into_iter()
                    .filter(|&n| self.tag_name(n) == Some("option"))
                    .collect();
                let chosen = options
                    .iter()
                    .copied()
                    .find(|&n| self.has_attribute(n, "selected"))
                    .or_else(|| options.first().copied());
                match chosen {
                    Some(option) => self.value(option).unwrap_or_default(),
                    None => String::new(),
                }
            }
            _ => self.get_attribute(id, "value").unwrap_or_default().to_string(),
        };
        Some(value)
    }

    /// Set the user-facing value of a form control (ignored for other nodes)
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(id) {
            if VALUE_ELEMENTS.contains(&el.name.as_str()) {
                el.dirty_value = Some(value);
            }
        }
    }

    /// Descendants in document order (excluding `id`, excluding template content)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Ancestor chain starting at `id` itself
    pub fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Whether `id` is attached under the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.ancestors_inclusive(id).last() == Some(&self.root)
    }

    // ═══════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════

    /// First element under `scope` matching `selector`
    pub fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        selector.select(self, scope, 1).into_iter().next()
    }

    /// All elements under `scope` matching `selector`, in document order
    pub fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        selector.select(self, scope, usize::MAX)
    }

    /// Parse `selector` and return the first match in the document
    pub fn select_first(&self, selector: &str) -> Result<Option<NodeId>, HtmjError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query(self.root, &selector))
    }

    /// Parse `selector` and return every match in the document
    pub fn select_all(&self, selector: &str) -> Result<Vec<NodeId>, HtmjError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_all(self.root, &selector))
    }

    // ═══════════════════════════════════════════
    // MUTATION
    // ═══════════════════════════════════════════

    /// Detach `id` from its parent (no-op when already detached)
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Nodes actually inserted when `node` is inserted somewhere
    fn take_insertables(&mut self, node: NodeId) -> Vec<NodeId> {
        match self.nodes[node.0].kind {
            NodeKind::Fragment => {
                let children = std::mem::take(&mut self.nodes[node.0].children);
                for &child in &children {
                    self.nodes[child.0].parent = None;
                }
                children
            }
            _ => {
                self.detach(node);
                vec![node]
            }
        }
    }

    /// Append `child` to `parent`; a fragment contributes its children
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        for node in self.take_insertables(child) {
            self.nodes[node.0].parent = Some(parent);
            self.nodes[parent.0].children.push(node);
        }
    }

    /// Replace `node` with `replacement` at the same position
    ///
    /// A node without a parent is left alone.
    pub fn replace_with(&mut self, node: NodeId, replacement: NodeId) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        let inserted = self.take_insertables(replacement);
        // Re-read the position: taking the replacement may have shifted siblings
        let Some(position) = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == node)
        else {
            return;
        };
        for &n in &inserted {
            self.nodes[n.0].parent = Some(parent);
        }
        self.nodes[parent.0]
            .children
            .splice(position..=position, inserted);
        self.nodes[node.0].parent = None;
    }

    /// Detach every child of `id`, returning them in order
    pub fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for &child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Copy `id` (and its subtree when `deep`) into a new detached node
    ///
    /// Template content and form values are copied along.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let mut kind = self.nodes[id.0].kind.clone();
        if let NodeKind::Element(el) = &mut kind {
            if let Some(content) = el.content {
                el.content = Some(self.clone_node(content, true));
            }
        }
        let copy = self.push(kind);
        if deep {
            let children = self.nodes[id.0].children.clone();
            for child in children {
                let child_copy = self.clone_node(child, true);
                self.nodes[child_copy.0].parent = Some(copy);
                self.nodes[copy.0].children.push(child_copy);
            }
        }
        copy
    }

    // ═══════════════════════════════════════════
    // LIFETIME
    // ═══════════════════════════════════════════

    /// Keep `id` and its subtree alive across [`Document::release`]
    pub fn pin(&mut self, id: NodeId) {
        self.pinned.insert(id);
    }

    pub fn is_pinned(&self, id: NodeId) -> bool {
        self.pinned.contains(&id)
    }

    /// Detach `id` and free its subtree, template content included
    ///
    /// Pinned nodes inside the subtree are detached instead of freed and keep
    /// their own subtrees. The root is never released.
    pub fn release(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if !self.nodes[node.0].live {
                continue;
            }
            if self.pinned.contains(&node) {
                self.nodes[node.0].parent = None;
                continue;
            }
            let data = std::mem::replace(&mut self.nodes[node.0], NodeData::vacant());
            stack.extend(data.children);
            if let NodeKind::Element(ElementData {
                content: Some(content),
                ..
            }) = data.kind
            {
                stack.push(content);
            }
            self.free.push(node);
        }
    }

    /// Number of allocated, unreleased nodes
    pub fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    // ═══════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════

    /// Serialize the whole document
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(doctype) = &self.doctype {
            let _ = write!(out, "<!DOCTYPE {doctype}>");
        }
        for &child in self.children(self.root) {
            self.write_node(child, &mut out, false);
        }
        out
    }

    /// Serialize `id` including itself
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out, false);
        out
    }

    /// Serialize the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self
            .tag_name(id)
            .is_some_and(|name| RAW_TEXT_ELEMENTS.contains(&name));
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out, raw);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String, raw_text: bool) {
        match &self.nodes[id.0].kind {
            NodeKind::Document | NodeKind::Fragment => {
                for &child in self.children(id) {
                    self.write_node(child, out, raw_text);
                }
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (key, value) in &el.attrs {
                    let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    return;
                }
                if let Some(content) = el.content {
                    self.write_node(content, out, false);
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
                for &child in self.children(id) {
                    self.write_node(child, out, raw);
                }
                let _ = write!(out, "</{}>", el.name);
            }
        }
    }

    /// Short human-readable label such as `div#out.list`
    pub fn describe(&self, id: NodeId) -> String {
        match &self.nodes[id.0].kind {
            NodeKind::Document => "#document".to_string(),
            NodeKind::Fragment => "#fragment".to_string(),
            NodeKind::Text(_) => "#text".to_string(),
            NodeKind::Comment(_) => "#comment".to_string(),
            NodeKind::Element(el) => {
                let mut label = el.name.clone();
                if let Some(id_attr) = self.get_attribute(id, "id") {
                    let _ = write!(label, "#{id_attr}");
                }
                if let Some(class) = self.get_attribute(id, "class") {
                    for name in class.split_whitespace() {
                        let _ = write!(label, ".{name}");
                    }
                }
                label
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
