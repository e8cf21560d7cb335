//! Mock transport for testing
//!
//! Returns scripted responses per `(method, url)` route without touching the
//! network, and records every request for assertions.
//!
//! Each route holds a FIFO queue; the last queued outcome keeps answering
//! once the queue is down to one entry. Unrouted requests fail like a
//! refused connection.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{FetchRequest, Transport, TransportError, TransportResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self::text(status, body.to_string())
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    /// Hold the response back for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Respond(MockResponse),
    Fail(TransportError),
}

#[derive(Debug)]
struct Route {
    method: String,
    url: String,
    queue: VecDeque<Outcome>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MockTransport::push`]
    pub fn on(self, method: &str, url: &str, response: MockResponse) -> Self {
        self.push(method, url, response);
        self
    }

    /// Queue a response for `method url`
    pub fn push(&self, method: &str, url: &str, response: MockResponse) {
        self.enqueue(method, url, Outcome::Respond(response));
    }

    /// Queue a transport failure for `method url`
    pub fn fail(&self, method: &str, url: &str, message: impl Into<String>) {
        self.enqueue(
            method,
            url,
            Outcome::Fail(TransportError::Request(message.into())),
        );
    }

    fn enqueue(&self, method: &str, url: &str, outcome: Outcome) {
        let mut routes = self.routes.lock();
        let method = method.to_ascii_uppercase();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.url == url)
        {
            Some(route) => route.queue.push_back(outcome),
            None => routes.push(Route {
                method,
                url: url.to_string(),
                queue: VecDeque::from([outcome]),
            }),
        }
    }

    fn next_outcome(&self, request: &FetchRequest) -> Option<Outcome> {
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.url == request.url)?;
        if route.queue.len() > 1 {
            route.queue.pop_front()
        } else {
            route.queue.front().cloned()
        }
    }

    /// Get all requests made to this transport
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());

        match self.next_outcome(request) {
            Some(Outcome::Respond(response)) => {
                if let Some(delay) = response.delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse {
                    status: response.status,
                    body: response.body,
                })
            }
            Some(Outcome::Fail(err)) => Err(err),
            None => Err(TransportError::Request(format!(
                "connection refused: {} {}",
                request.method, request.url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get(url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            method: "GET".into(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn queued_responses_then_sticky_last() {
        let transport = MockTransport::new()
            .on("get", "/a", MockResponse::json(200, json!({"n": 1})))
            .on("GET", "/a", MockResponse::json(200, json!({"n": 2})));

        let first = transport.send(&get("/a")).await.unwrap();
        let second = transport.send(&get("/a")).await.unwrap();
        let third = transport.send(&get("/a")).await.unwrap();

        assert_eq!(first.body, r#"{"n":1}"#);
        assert_eq!(second.body, r#"{"n":2}"#);
        assert_eq!(third.body, r#"{"n":2}"#);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn unrouted_request_fails() {
        let transport = MockTransport::new();
        let err = transport.send(&get("/nowhere")).await.unwrap_err();
        assert!(matches!(err, TransportError::Request(msg) if msg.contains("/nowhere")));
        assert_eq!(transport.last_request(), Some(get("/nowhere")));
    }

    #[tokio::test]
    async fn scripted_failure() {
        let transport = MockTransport::new();
        transport.fail("GET", "/down", "network unreachable");
        let err = transport.send(&get("/down")).await.unwrap_err();
        assert_eq!(err, TransportError::Request("network unreachable".into()));
    }
}
