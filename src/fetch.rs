//! Data Fetcher
//!
//! Turns a binding into a request and a response into a [`FetchResult`]:
//!
//! 1. [`collect_payload`] reads values from the data-source elements
//! 2. [`build_request`] resolves the endpoint and attaches the JSON body
//! 3. [`fetch_data`] sends it and normalizes every failure into
//!    `FetchResult::Error`; nothing propagates past this boundary

use serde_json::{Map, Value};
use tracing::{instrument, warn};
use url::Url;

use crate::dom::Document;
use crate::transport::{FetchRequest, Transport, TransportResponse, CONTENT_TYPE_JSON};

/// Message used when a failed response carries no `error` field
pub const GENERIC_ERROR: &str = "An error occurred";

/// Outcome of one fetch: data to render, or an error message
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Data(Value),
    Error(String),
}

impl FetchResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Data(_) => None,
        }
    }

    /// Number of render items the data would produce
    pub fn item_count(&self) -> usize {
        match self {
            Self::Data(Value::Array(items)) => items.len(),
            Self::Data(_) => 1,
            Self::Error(_) => 0,
        }
    }
}

/// Payload key for a data-source selector (one leading `#` stripped)
pub fn payload_key(selector: &str) -> &str {
    selector.strip_prefix('#').unwrap_or(selector)
}

/// Read current values of the data-source elements
///
/// `None` when no sources are declared. Selectors that are invalid or match
/// nothing are skipped, so declared sources that all miss give an empty
/// object. Each element contributes its form-control value, else its text.
pub fn collect_payload(doc: &Document, sources: Option<&[String]>) -> Option<Map<String, Value>> {
    let sources = sources?;
    let mut payload = Map::new();
    for selector in sources {
        let Ok(Some(element)) = doc.select_first(selector) else {
            continue;
        };
        let value = doc
            .value(element)
            .unwrap_or_else(|| doc.text_content(element));
        payload.insert(payload_key(selector).to_string(), Value::String(value));
    }
    Some(payload)
}

/// Resolve `endpoint` against `base` when one is configured
///
/// Without a base, or when joining fails, the endpoint is used verbatim.
pub fn resolve_endpoint(endpoint: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => match base.join(endpoint) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(endpoint, error = %e, "could not resolve endpoint against base URL");
                endpoint.to_string()
            }
        },
        None => endpoint.to_string(),
    }
}

/// Build the request for one trigger
///
/// The body is attached only when the method is not GET and a payload exists.
pub fn build_request(
    endpoint: &str,
    method: &str,
    payload: Option<Map<String, Value>>,
    base: Option<&Url>,
) -> FetchRequest {
    let body = match payload {
        Some(payload) if !method.eq_ignore_ascii_case("GET") => {
            Some(Value::Object(payload).to_string())
        }
        _ => None,
    };
    FetchRequest {
        url: resolve_endpoint(endpoint, base),
        method: method.to_string(),
        headers: vec![("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())],
        body,
    }
}

/// Interpret a raw response
///
/// The body must parse as JSON. A non-success status, or an object body
/// with a truthy `error` field, becomes an error carrying that field
/// (or [`GENERIC_ERROR`]).
pub fn normalize_response(response: &TransportResponse) -> FetchResult {
    let data: Value = match serde_json::from_str(&response.body) {
        Ok(data) => data,
        Err(e) => return FetchResult::Error(format!("Invalid JSON response: {e}")),
    };

    let error_field = data.get("error").and_then(error_message);
    if !response.is_success() {
        return FetchResult::Error(error_field.unwrap_or_else(|| GENERIC_ERROR.to_string()));
    }
    match error_field {
        Some(message) => FetchResult::Error(message),
        None => FetchResult::Data(data),
    }
}

/// Message of an `error` field, `None` when the field is falsy
fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Send `request` and normalize the outcome; never fails
#[instrument(skip(transport, request), fields(method = %request.method, url = %request.url))]
pub async fn fetch_data(transport: &dyn Transport, request: &FetchRequest) -> FetchResult {
    let result = match transport.send(request).await {
        Ok(response) => normalize_response(&response),
        Err(e) => FetchResult::Error(e.to_string()),
    };
    if let FetchResult::Error(message) = &result {
        warn!(error = %message, "Failed to fetch data");
    }
    result
}
