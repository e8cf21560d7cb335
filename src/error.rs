//! Error types with fix suggestions
//!
//! `HtmjError` covers the outer, fallible surfaces of the library: loading
//! configuration and pages, parsing selectors, building the HTTP client.
//! The fetch-and-render pipeline itself never returns these; failures there
//! degrade into `FetchResult::Error` (see [`crate::fetch`]).

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum HtmjError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ─────────────────────────────────────────────────────────────
    // Selectors (HTMJ-010 to HTMJ-011)
    // ─────────────────────────────────────────────────────────────
    #[error("HTMJ-010: Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("HTMJ-011: Selector '{selector}' matched no element")]
    NoMatch { selector: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration (HTMJ-020 to HTMJ-021)
    // ─────────────────────────────────────────────────────────────
    #[error("HTMJ-020: Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("HTMJ-021: Invalid dispatch spec '{spec}' (expected SELECTOR:EVENT)")]
    InvalidDispatch { spec: String },

    // ─────────────────────────────────────────────────────────────
    // Transport (HTMJ-030)
    // ─────────────────────────────────────────────────────────────
    #[error("HTMJ-030: HTTP client error: {0}")]
    HttpClient(String),
}

impl FixSuggestion for HtmjError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            HtmjError::Io(_) => Some("Check file path and permissions"),
            HtmjError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            HtmjError::InvalidSelector { .. } => {
                Some("Use a querySelector-style CSS selector; escape special characters with '\\' (e.g. #a\\:b). Dynamic pseudo-classes like :hover are rejected")
            }
            HtmjError::NoMatch { .. } => Some("Verify the element exists in the page"),
            HtmjError::InvalidBaseUrl { .. } => {
                Some("Use an absolute URL such as http://localhost:5000/")
            }
            HtmjError::InvalidDispatch { .. } => Some("Use e.g. --dispatch '#load-btn:click'"),
            HtmjError::HttpClient(_) => Some("Check TLS backend and user agent settings"),
        }
    }
}
