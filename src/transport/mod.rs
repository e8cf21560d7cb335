//! # Transport Layer
//!
//! How the fetcher talks to endpoints.
//!
//! - [`Transport`] - Core trait: send one request, return status + body
//! - [`HttpTransport`] - Production transport using `reqwest`
//! - [`MockTransport`] - Test transport with scripted responses
//!
//! Transports only move bytes. Interpreting the status and JSON body into a
//! [`FetchResult`](crate::fetch::FetchResult) is the fetcher's job.
//!
//! No retry, backoff or timeout is applied here; a stalled request stalls
//! only the pipeline awaiting it.

mod mock;

pub use mock::{MockResponse, MockTransport};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::HtmjConfig;
use crate::error::HtmjError;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response: status code and body text
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Failed to read response: {0}")]
    Body(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport (one pooled client per engine)
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HtmjConfig) -> Result<Self, HtmjError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| HtmjError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            TransportError::InvalidMethod {
                method: request.method.clone(),
            }
        })?;

        debug!(%method, %url, has_body = request.body.is_some(), "sending request");

        let mut builder = self.client.request(method, url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
