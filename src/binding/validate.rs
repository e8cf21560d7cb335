//! Binding diagnostics
//!
//! Resolution never fails; it silently falls back. `diagnose` reports what
//! the fallbacks hid so that `htmj scan` can show authoring mistakes.
//!
//! HTTP method tokens are checked by hand (RFC 9110 `tchar`), single pass,
//! no allocations.

use std::fmt;

use crate::binding::{AttrValue, AttributeNames, DEFAULT_EVENT};
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Attribute declared with an empty value (treated as absent)
    EmptyAttribute { attribute: String },
    EmptyEndpoint,
    InvalidSelector {
        attribute: String,
        selector: String,
        reason: String,
    },
    UnmatchedSelector { attribute: String, selector: String },
    UnknownAction { value: String },
    InvalidMethod { value: String },
    /// Event name too short to carry the two-character prefix
    UnusableEvent { value: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAttribute { attribute } => {
                write!(f, "{attribute} is empty and will be ignored")
            }
            Self::EmptyEndpoint => write!(f, "endpoint is empty"),
            Self::InvalidSelector {
                attribute,
                selector,
                reason,
            } => write!(f, "{attribute}: invalid selector '{selector}' ({reason})"),
            Self::UnmatchedSelector {
                attribute,
                selector,
            } => write!(f, "{attribute}: '{selector}' matches nothing, using fallback"),
            Self::UnknownAction { value } => {
                write!(f, "unknown action '{value}', using 'update'")
            }
            Self::InvalidMethod { value } => write!(f, "'{value}' is not a valid HTTP method"),
            Self::UnusableEvent { value } => {
                write!(f, "event '{value}' has no name after its two-character prefix")
            }
        }
    }
}

/// Whether `method` is a valid HTTP method token
pub fn is_method_token(method: &str) -> bool {
    !method.is_empty()
        && method.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

fn check_selector(
    doc: &Document,
    attribute: &str,
    selector: &str,
    out: &mut Vec<Diagnostic>,
) {
    match doc.select_first(selector) {
        Ok(Some(_)) => {}
        Ok(None) => out.push(Diagnostic::UnmatchedSelector {
            attribute: attribute.to_string(),
            selector: selector.to_string(),
        }),
        Err(crate::error::HtmjError::InvalidSelector { reason, .. }) => {
            out.push(Diagnostic::InvalidSelector {
                attribute: attribute.to_string(),
                selector: selector.to_string(),
                reason,
            })
        }
        Err(other) => out.push(Diagnostic::InvalidSelector {
            attribute: attribute.to_string(),
            selector: selector.to_string(),
            reason: other.to_string(),
        }),
    }
}

/// Everything the resolver will silently paper over for `template`
pub fn diagnose(doc: &Document, template: NodeId, names: &AttributeNames) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    match doc.get_attribute(template, &names.endpoint) {
        Some(endpoint) if endpoint.trim().is_empty() => out.push(Diagnostic::EmptyEndpoint),
        _ => {}
    }

    for attribute in [
        &names.data_sources,
        &names.method,
        &names.event,
        &names.error,
        &names.target,
        &names.event_target,
        &names.action,
    ] {
        if AttrValue::read(doc, template, attribute) == AttrValue::Empty {
            out.push(Diagnostic::EmptyAttribute {
                attribute: attribute.clone(),
            });
        }
    }

    if let AttrValue::Present(method) = AttrValue::read(doc, template, &names.method) {
        if !is_method_token(method.trim()) {
            out.push(Diagnostic::InvalidMethod { value: method });
        }
    }

    if let AttrValue::Present(event) = AttrValue::read(doc, template, &names.event) {
        let event = event.trim();
        if event != DEFAULT_EVENT && event.chars().count() <= 2 {
            out.push(Diagnostic::UnusableEvent {
                value: event.to_string(),
            });
        }
    }

    for attribute in [&names.target, &names.event_target] {
        if let Some(selector) = AttrValue::read(doc, template, attribute).present() {
            check_selector(doc, attribute, selector, &mut out);
        }
    }

    if let Some(sources) = AttrValue::read(doc, template, &names.data_sources).present() {
        for selector in super::parse_data_sources(sources) {
            check_selector(doc, &names.data_sources, &selector, &mut out);
        }
    }

    if let Some(action) = AttrValue::read(doc, template, &names.action).present() {
        if !matches!(
            action.trim().to_ascii_lowercase().as_str(),
            "update" | "append" | "swap"
        ) {
            out.push(Diagnostic::UnknownAction {
                value: action.to_string(),
            });
        }
    }

    out
}
