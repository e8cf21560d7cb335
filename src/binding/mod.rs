//! Binding Module - declarative template attributes → binding descriptor
//!
//! Reads the attribute surface of one `<template>` element into a
//! [`BindingDescriptor`]:
//!
//! | Attribute (default prefix `hx-`) | Field | Default |
//! |---|---|---|
//! | `hx-endpoint` | `endpoint` | required (presence gates scanning) |
//! | `hx-data-sources` | `data_sources` | none |
//! | `hx-method` | `method` | `POST` with data sources, else `GET` |
//! | `hx-event` | `event` | `onload` |
//! | `hx-error` | `error_handler` | none |
//! | `hx-target` | `target` | template's parent |
//! | `hx-event-target` | `event_target` | resolved target |
//! | `hx-action` | `action` | `update` |
//!
//! Resolution is a pure read of the document. Selectors that are empty,
//! invalid or match nothing fall back silently.
//!
//! Data flow:
//! ```text
//! <template hx-*> → AttrValue (absent | empty | present)
//!                         ↓
//!                  resolve_binding
//!                         ↓
//!                 BindingDescriptor → Event Binder
//! ```

mod validate;

pub use validate::{diagnose, is_method_token, Diagnostic};

use serde::Serialize;
use tracing::debug;

use crate::dom::{Document, NodeId};

pub const DEFAULT_EVENT: &str = "onload";

/// Raw state of one declarative attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Absent,
    /// Present with an empty (or whitespace-only) value
    Empty,
    Present(String),
}

impl AttrValue {
    pub fn read(doc: &Document, node: NodeId, name: &str) -> Self {
        match doc.get_attribute(node, name) {
            None => Self::Absent,
            Some(value) if value.trim().is_empty() => Self::Empty,
            Some(value) => Self::Present(value.to_string()),
        }
    }

    /// The value when present and non-empty
    pub fn present(&self) -> Option<&str> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Empty => None,
        }
    }

    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Full attribute names for a given prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    pub endpoint: String,
    pub data_sources: String,
    pub method: String,
    pub event: String,
    pub error: String,
    pub target: String,
    pub event_target: String,
    pub action: String,
}

impl AttributeNames {
    pub fn with_prefix(prefix: &str) -> Self {
        let name = |suffix: &str| format!("{prefix}{suffix}").to_ascii_lowercase();
        Self {
            endpoint: name("endpoint"),
            data_sources: name("data-sources"),
            method: name("method"),
            event: name("event"),
            error: name("error"),
            target: name("target"),
            event_target: name("event-target"),
            action: name("action"),
        }
    }
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self::with_prefix("hx-")
    }
}

/// Insertion strategy for rendered fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Clear the target, then append
    #[default]
    Update,
    /// Append after existing children
    Append,
    /// Replace the target node itself
    Swap,
}

impl Action {
    /// Unknown values mean `update`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "append" => Self::Append,
            "swap" => Self::Swap,
            _ => Self::Update,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Append => "append",
            Self::Swap => "swap",
        }
    }
}

/// Normalized binding for one template, immutable after scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingDescriptor {
    pub template: NodeId,
    pub endpoint: String,
    pub method: String,
    /// Element selectors supplying payload fields
    pub data_sources: Option<Vec<String>>,
    /// Declared trigger, e.g. `onload` or `onclick`
    pub event: String,
    /// Name looked up in the handler registry on error
    pub error_handler: Option<String>,
    pub target: NodeId,
    pub event_target: NodeId,
    pub action: Action,
}

/// Split a data-sources attribute into trimmed selectors
pub fn parse_data_sources(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve `selector` to its first match, treating errors as a miss
fn resolve_selector(doc: &Document, selector: Option<&str>) -> Option<NodeId> {
    let selector = selector?;
    match doc.select_first(selector) {
        Ok(found) => found,
        Err(e) => {
            debug!(selector, error = %e, "selector ignored");
            None
        }
    }
}

/// Read the binding declared on `template`, `None` without an endpoint attribute
pub fn resolve_binding(
    doc: &Document,
    template: NodeId,
    names: &AttributeNames,
) -> Option<BindingDescriptor> {
    let endpoint = doc.get_attribute(template, &names.endpoint)?.trim().to_string();

    let data_sources = AttrValue::read(doc, template, &names.data_sources)
        .present()
        .map(parse_data_sources)
        .filter(|sources| !sources.is_empty());

    let method = resolve_method(
        &AttrValue::read(doc, template, &names.method),
        data_sources.is_some(),
    );

    let event = AttrValue::read(doc, template, &names.event)
        .present()
        .map(|e| e.trim().to_string())
        .unwrap_or_else(|| DEFAULT_EVENT.to_string());

    let error_handler = AttrValue::read(doc, template, &names.error)
        .present()
        .map(|e| e.trim().to_string());

    let target_attr = AttrValue::read(doc, template, &names.target);
    let target = resolve_selector(doc, target_attr.present())
        .or_else(|| doc.parent(template))
        .unwrap_or_else(|| doc.root());

    let event_target_attr = AttrValue::read(doc, template, &names.event_target);
    let event_target = resolve_selector(doc, event_target_attr.present()).unwrap_or(target);

    let action = AttrValue::read(doc, template, &names.action)
        .present()
        .map(Action::parse)
        .unwrap_or_default();

    Some(BindingDescriptor {
        template,
        endpoint,
        method,
        data_sources,
        event,
        error_handler,
        target,
        event_target,
        action,
    })
}

/// Explicit method (upper-cased) wins; otherwise POST with data sources, else GET
pub fn resolve_method(declared: &AttrValue, has_data_sources: bool) -> String {
    match declared.present() {
        Some(method) => method.trim().to_ascii_uppercase(),
        None if has_data_sources => "POST".to_string(),
        None => "GET".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Document {
        Document::parse(&format!("<html><body>{body}</body></html>"))
    }

    fn bind(doc: &Document) -> BindingDescriptor {
        let template = doc.select_first("template").unwrap().unwrap();
        resolve_binding(doc, template, &AttributeNames::default()).unwrap()
    }

    #[test]
    fn defaults_without_optional_attributes() {
        let doc = page(r#"<div id="host"><template hx-endpoint="/api/data"><p>x</p></template></div>"#);
        let binding = bind(&doc);
        let host = doc.select_first("#host").unwrap().unwrap();

        assert_eq!(binding.endpoint, "/api/data");
        assert_eq!(binding.method, "GET");
        assert_eq!(binding.data_sources, None);
        assert_eq!(binding.event, "onload");
        assert_eq!(binding.error_handler, None);
        assert_eq!(binding.target, host);
        assert_eq!(binding.event_target, host);
        assert_eq!(binding.action, Action::Update);
    }

    #[test]
    fn data_sources_imply_post() {
        let doc = page(
            r#"<template hx-endpoint="/api" hx-data-sources=" #input1 , #input2,, "></template>"#,
        );
        let binding = bind(&doc);
        assert_eq!(binding.method, "POST");
        assert_eq!(
            binding.data_sources,
            Some(vec!["#input1".to_string(), "#input2".to_string()])
        );
    }

    #[test]
    fn explicit_method_overrides_default() {
        let doc = page(r##"<template hx-endpoint="/api" hx-data-sources="#a" hx-method="put"></template>"##);
        assert_eq!(bind(&doc).method, "PUT");
    }

    #[test]
    fn empty_attributes_behave_as_absent() {
        let doc = page(
            r#"<div id="host"><template hx-endpoint="/api" hx-data-sources="" hx-method="" hx-event=" " hx-error="" hx-target="" hx-action=""></template></div>"#,
        );
        let binding = bind(&doc);
        let host = doc.select_first("#host").unwrap().unwrap();
        assert_eq!(binding.method, "GET");
        assert_eq!(binding.data_sources, None);
        assert_eq!(binding.event, "onload");
        assert_eq!(binding.error_handler, None);
        assert_eq!(binding.target, host);
        assert_eq!(binding.action, Action::Update);
    }

    #[test]
    fn unmatched_or_invalid_selectors_fall_back() {
        let doc = page(
            r##"<section id="host"><template hx-endpoint="/api" hx-target="#missing" hx-event-target="[broken"></template></section>"##,
        );
        let binding = bind(&doc);
        let host = doc.select_first("#host").unwrap().unwrap();
        assert_eq!(binding.target, host);
        assert_eq!(binding.event_target, host);
    }

    #[test]
    fn structural_and_sibling_selectors_resolve() {
        let doc = page(
            r##"<div id="host"><ul id="list"><li>a</li><li>b</li></ul><p>after</p><span id="x:y"></span>
                <template hx-endpoint="/api" hx-target="#list li:first-child" hx-event-target="#list ~ p"></template>
                <template hx-endpoint="/b" hx-target="#x\:y"></template></div>"##,
        );
        let templates = doc.select_all("template").unwrap();
        let names = AttributeNames::default();
        let list = doc.select_first("#list").unwrap().unwrap();
        let first_li = doc.children(list)[0];
        let p = doc.select_first("p").unwrap().unwrap();
        let span = doc.select_first("span").unwrap().unwrap();

        let binding = resolve_binding(&doc, templates[0], &names).unwrap();
        assert_eq!(binding.target, first_li);
        assert_eq!(binding.event_target, p);

        let escaped = resolve_binding(&doc, templates[1], &names).unwrap();
        assert_eq!(escaped.target, span);
    }

    #[test]
    fn event_target_defaults_to_resolved_target() {
        let doc = page(
            r##"<div id="out"></div><form id="f"></form><template hx-endpoint="/api" hx-target="#out"></template><template hx-endpoint="/b" hx-target="#out" hx-event-target="#f"></template>"##,
        );
        let templates = doc.select_all("template").unwrap();
        let names = AttributeNames::default();
        let out = doc.select_first("#out").unwrap().unwrap();
        let form = doc.select_first("#f").unwrap().unwrap();

        let first = resolve_binding(&doc, templates[0], &names).unwrap();
        assert_eq!(first.target, out);
        assert_eq!(first.event_target, out);

        let second = resolve_binding(&doc, templates[1], &names).unwrap();
        assert_eq!(second.target, out);
        assert_eq!(second.event_target, form);
    }

    #[test]
    fn resolution_is_pure() {
        let doc = page(r##"<template hx-endpoint="/api" hx-target="#nope" hx-action="swap"></template>"##);
        assert_eq!(bind(&doc), bind(&doc));
        assert_eq!(bind(&doc).action, Action::Swap);
    }

    #[test]
    fn missing_endpoint_yields_none() {
        let doc = page("<template></template>");
        let template = doc.select_first("template").unwrap().unwrap();
        assert!(resolve_binding(&doc, template, &AttributeNames::default()).is_none());
    }

    #[test]
    fn custom_prefix() {
        let doc = page(r#"<template data-x-endpoint="/api" data-x-event="onclick"></template>"#);
        let template = doc.select_first("template").unwrap().unwrap();
        let binding =
            resolve_binding(&doc, template, &AttributeNames::with_prefix("data-x-")).unwrap();
        assert_eq!(binding.event, "onclick");
    }

    #[test]
    fn action_parse() {
        assert_eq!(Action::parse("append"), Action::Append);
        assert_eq!(Action::parse(" SWAP "), Action::Swap);
        assert_eq!(Action::parse("replace"), Action::Update);
    }
}
