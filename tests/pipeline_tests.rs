//! End-to-end pipeline tests against the mock transport
//!
//! Each test loads a page, starts the engine and inspects the document and
//! the event log afterwards. No network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use htmj::{
    Document, EventKind, EventLog, HandlerRegistry, Htmj, HtmjConfig, MockResponse, MockTransport,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

// =============================================================================
// HELPERS
// =============================================================================

fn page(body: &str) -> String {
    format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>")
}

fn engine(body: &str, transport: Arc<MockTransport>) -> Htmj {
    Htmj::new(Document::parse(&page(body)).into_shared(), transport)
}

fn inner(htmj: &Htmj, selector: &str) -> String {
    let doc = htmj.document();
    let doc = doc.lock();
    let node = doc.select_first(selector).unwrap().unwrap();
    doc.inner_html(node)
}

/// Registry with one handler recording every message it receives
fn recording_handler(name: &str) -> (HandlerRegistry, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let registry = HandlerRegistry::new();
    let sink = Arc::clone(&calls);
    registry.register(name, move |message| sink.lock().push(message.to_string()));
    (registry, calls)
}

// =============================================================================
// RENDERING
// =============================================================================

#[tokio::test]
async fn greeting_renders_into_target() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/api/user", MockResponse::json(200, json!({"name": "Ann"}))),
    );
    let htmj = engine(
        r##"<div id="out">placeholder</div>
            <template hx-endpoint="/api/user" hx-target="#out">Hello ${name}</template>"##,
        Arc::clone(&transport),
    );

    htmj.start().await;

    let doc = htmj.document();
    let doc = doc.lock();
    let out = doc.select_first("#out").unwrap().unwrap();
    assert_eq!(doc.children(out).len(), 1);
    assert_eq!(doc.text(doc.children(out)[0]), Some("Hello Ann"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn append_keeps_original_child_first() {
    let transport = Arc::new(MockTransport::new().on(
        "GET",
        "/items",
        MockResponse::json(200, json!([{"x": 1}, {"x": 2}])),
    ));
    let htmj = engine(
        r##"<ul id="list"><li>orig</li></ul>
            <template hx-endpoint="/items" hx-target="#list" hx-action="append"><li>${x}</li></template>"##,
        transport,
    );

    htmj.start().await;

    assert_eq!(inner(&htmj, "#list"), "<li>orig</li><li>1</li><li>2</li>");
}

#[tokio::test]
async fn default_target_is_template_parent() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/row", MockResponse::json(200, json!({"v": "r"}))),
    );
    let htmj = engine(
        r#"<div id="host"><template hx-endpoint="/row"><span>${v}</span></template></div>"#,
        transport,
    );

    htmj.start().await;

    // update clears the host, template included
    assert_eq!(inner(&htmj, "#host"), "<span>r</span>");
}

#[tokio::test]
async fn swap_replaces_the_target() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/card", MockResponse::json(200, json!({"t": "new"}))),
    );
    let htmj = engine(
        r##"<main id="main"><div id="old">old</div></main>
            <template hx-endpoint="/card" hx-target="#old" hx-action="swap"><article>${t}</article></template>"##,
        transport,
    );

    htmj.start().await;

    assert_eq!(inner(&htmj, "#main"), "<article>new</article>");
}

#[tokio::test]
async fn nested_array_expands_per_entry() {
    let transport = Arc::new(MockTransport::new().on(
        "GET",
        "/order",
        MockResponse::json(
            200,
            json!({"id": 7, "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 0}]}),
        ),
    ));
    let htmj = engine(
        r##"<div id="out"></div>
            <template hx-endpoint="/order" hx-target="#out"><h1>Order ${id}</h1><ul><li data-nested-array="items"><b>${sku}</b> x${qty}</li></ul></template>"##,
        transport,
    );

    htmj.start().await;

    assert_eq!(
        inner(&htmj, "#out"),
        r#"<h1>Order 7</h1><ul><div><li data-nested-array="items"><b>a</b> x1</li><li data-nested-array="items"><b>b</b> x</li></div></ul>"#
    );
}

#[tokio::test]
async fn structural_selectors_resolve_targets() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/first", MockResponse::json(200, json!({"v": "hit"}))),
    );
    let htmj = engine(
        r##"<div id="host"><ul id="list"><li>one</li><li>two</li></ul><p>below</p>
            <template hx-endpoint="/first" hx-target="#list li:first-child" hx-event="onclick"
                      hx-event-target="#list ~ p"><b>${v}</b></template></div>"##,
        Arc::clone(&transport),
    );
    htmj.start().await;

    let outcome = htmj.dispatch_selector("#host > p", "click").await.unwrap();

    assert_eq!(outcome.triggered, 1);
    assert_eq!(inner(&htmj, "#list"), "<li><b>hit</b></li><li>two</li>");
}

#[tokio::test]
async fn repeated_updates_keep_document_size_flat() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/n", MockResponse::json(200, json!([{"n": 1}, {"n": 2}]))),
    );
    let htmj = engine(
        r##"<button id="b">go</button>
            <div id="host"><template hx-endpoint="/n" hx-event="onclick" hx-event-target="#b"><p>${n}</p></template></div>"##,
        transport,
    );
    htmj.start().await;
    htmj.dispatch_selector("#b", "click").await.unwrap();
    let settled = htmj.document().lock().live_nodes();

    for _ in 0..500 {
        htmj.dispatch_selector("#b", "click").await.unwrap();
    }

    assert_eq!(htmj.document().lock().live_nodes(), settled);
    assert_eq!(inner(&htmj, "#host"), "<p>1</p><p>2</p>");
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn not_found_invokes_handler_once_and_leaves_target() {
    let transport = Arc::new(MockTransport::new().on(
        "GET",
        "/missing",
        MockResponse::json(404, json!({"error": "not found"})),
    ));
    let (handlers, calls) = recording_handler("showErr");
    let htmj = engine(
        r##"<div id="out"><p>keep</p></div>
            <template hx-endpoint="/missing" hx-target="#out" hx-error="showErr"><b>${x}</b></template>"##,
        transport,
    )
    .with_handlers(handlers);

    htmj.start().await;

    assert_eq!(*calls.lock(), vec!["not found".to_string()]);
    assert_eq!(inner(&htmj, "#out"), "<p>keep</p>");
    assert!(htmj
        .event_log()
        .events()
        .iter()
        .any(|e| matches!(&e.kind, EventKind::HandlerInvoked { handler, .. } if handler == "showErr")));
}

#[tokio::test]
async fn error_field_on_success_status_is_an_error() {
    let transport = Arc::new(MockTransport::new().on(
        "GET",
        "/soft",
        MockResponse::json(200, json!({"error": "quota exceeded"})),
    ));
    let (handlers, calls) = recording_handler("onErr");
    let htmj = engine(
        r#"<div id="out">keep</div><template hx-endpoint="/soft" hx-target="div" hx-error="onErr"></template>"#,
        transport,
    )
    .with_handlers(handlers);

    htmj.start().await;

    assert_eq!(*calls.lock(), vec!["quota exceeded".to_string()]);
    assert_eq!(inner(&htmj, "#out"), "keep");
}

#[tokio::test]
async fn transport_failure_reaches_handler() {
    let (handlers, calls) = recording_handler("onErr");
    let htmj = engine(
        r#"<div id="out">keep</div><template hx-endpoint="/down" hx-error="onErr"></template>"#,
        Arc::new(MockTransport::new()),
    )
    .with_handlers(handlers);

    htmj.start().await;

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("connection refused"));
}

#[tokio::test]
async fn unhandled_error_is_swallowed() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/boom", MockResponse::json(500, json!({}))),
    );
    let htmj = engine(
        r##"<div id="out">keep</div><template hx-endpoint="/boom" hx-target="#out">${x}</template>"##,
        transport,
    );

    htmj.start().await;

    assert_eq!(inner(&htmj, "#out"), "keep");
    let outcomes = htmj.event_log().outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        &outcomes[0].kind,
        EventKind::ErrorSwallowed { error, .. } if error == "An error occurred"
    ));
}

#[tokio::test]
async fn unregistered_handler_is_reported() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/boom", MockResponse::json(500, json!({"error": "x"}))),
    );
    let htmj = engine(
        r#"<div>keep</div><template hx-endpoint="/boom" hx-error="nobody"></template>"#,
        transport,
    );

    htmj.start().await;

    assert!(htmj
        .event_log()
        .events()
        .iter()
        .any(|e| matches!(&e.kind, EventKind::HandlerMissing { handler, .. } if handler == "nobody")));
}

#[tokio::test]
async fn handler_registered_after_start_is_used() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/late", MockResponse::json(400, json!({"error": "bad"}))),
    );
    let htmj = engine(
        r##"<button id="go">Go</button><template hx-endpoint="/late" hx-event="onclick" hx-event-target="#go" hx-error="late"></template>"##,
        transport,
    );
    htmj.start().await;

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    htmj.handlers().register("late", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    htmj.dispatch_selector("#go", "click").await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// =============================================================================
// EVENTS AND PAYLOADS
// =============================================================================

#[tokio::test]
async fn click_posts_data_sources() {
    let transport = Arc::new(
        MockTransport::new().on("POST", "/search", MockResponse::json(200, json!([{"hit": "h1"}]))),
    );
    let htmj = engine(
        r##"<input id="q" value="rust"><span id="scope">docs</span><button id="go">Search</button>
            <ul id="results"></ul>
            <template hx-endpoint="/search" hx-data-sources="#q, #scope" hx-event="onclick"
                      hx-event-target="#go" hx-target="#results"><li>${hit}</li></template>"##,
        Arc::clone(&transport),
    );

    let report = htmj.start().await;
    assert_eq!(report.listening, 1);
    assert_eq!(transport.request_count(), 0);

    let outcome = htmj.dispatch_selector("#go", "click").await.unwrap();
    assert_eq!(outcome.triggered, 1);
    assert!(outcome.default_prevented);

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"q": "rust", "scope": "docs"}));
    assert_eq!(inner(&htmj, "#results"), "<li>h1</li>");
}

#[tokio::test]
async fn payload_reads_current_values_at_trigger_time() {
    let transport = Arc::new(
        MockTransport::new().on("PUT", "/name", MockResponse::json(200, json!({}))),
    );
    let htmj = engine(
        r##"<input id="name" value="before"><button id="save">Save</button><div id="out"></div>
            <template hx-endpoint="/name" hx-method="put" hx-data-sources="#name"
                      hx-event="onclick" hx-event-target="#save" hx-target="#out"></template>"##,
        Arc::clone(&transport),
    );
    htmj.start().await;

    {
        let doc = htmj.document();
        let mut doc = doc.lock();
        let input = doc.select_first("#name").unwrap().unwrap();
        doc.set_value(input, "after");
    }
    htmj.dispatch_selector("#save", "click").await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "PUT");
    assert_eq!(request.body.as_deref(), Some(r#"{"name":"after"}"#));
}

#[tokio::test]
async fn events_bubble_from_descendants() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/bubble", MockResponse::json(200, json!({"n": 1}))),
    );
    let htmj = engine(
        r##"<form id="f"><button id="inside">x</button></form><p id="out"></p>
            <template hx-endpoint="/bubble" hx-event="onclick" hx-event-target="#f" hx-target="#out">${n}</template>"##,
        Arc::clone(&transport),
    );
    htmj.start().await;

    htmj.dispatch_selector("#inside", "click").await.unwrap();

    assert_eq!(transport.request_count(), 1);
    assert_eq!(inner(&htmj, "#out"), "1");
}

#[tokio::test]
async fn slower_response_wins_the_race() {
    let transport = Arc::new(
        MockTransport::new()
            .on(
                "GET",
                "/slow",
                MockResponse::json(200, json!({"who": "slow"})).with_delay(Duration::from_millis(60)),
            )
            .on("GET", "/fast", MockResponse::json(200, json!({"who": "fast"}))),
    );
    let htmj = engine(
        r##"<button id="b">go</button><div id="out"></div>
            <template hx-endpoint="/slow" hx-event="onclick" hx-event-target="#b" hx-target="#out">${who}</template>
            <template hx-endpoint="/fast" hx-event="onclick" hx-event-target="#b" hx-target="#out">${who}</template>"##,
        transport,
    );
    htmj.start().await;

    let outcome = htmj.dispatch_selector("#b", "click").await.unwrap();

    assert_eq!(outcome.triggered, 2);
    assert_eq!(inner(&htmj, "#out"), "slow");
}

#[tokio::test]
async fn repeated_trigger_renders_each_response() {
    let transport = Arc::new(
        MockTransport::new()
            .on("GET", "/tick", MockResponse::json(200, json!({"n": 1})))
            .on("GET", "/tick", MockResponse::json(200, json!({"n": 2}))),
    );
    let htmj = engine(
        r##"<button id="b">go</button><ol id="log"></ol>
            <template hx-endpoint="/tick" hx-event="onclick" hx-event-target="#b" hx-target="#log" hx-action="append"><li>${n}</li></template>"##,
        transport,
    );
    htmj.start().await;

    htmj.dispatch_selector("#b", "click").await.unwrap();
    htmj.dispatch_selector("#b", "click").await.unwrap();
    htmj.dispatch_selector("#b", "click").await.unwrap();

    assert_eq!(inner(&htmj, "#log"), "<li>1</li><li>2</li><li>2</li>");
}

#[tokio::test]
async fn base_url_and_prefix_come_from_config() {
    let transport = Arc::new(MockTransport::new().on(
        "GET",
        "http://api.test/v1/me",
        MockResponse::json(200, json!({"name": "Ann"})),
    ));
    let config = HtmjConfig::from_yaml_str("attr_prefix: \"data-x-\"\n")
        .unwrap()
        .with_base_url("http://api.test/v1/")
        .unwrap();
    let htmj = engine(
        r#"<p id="out"><template data-x-endpoint="me">${name}</template></p>"#,
        Arc::clone(&transport),
    )
    .with_config(config);

    htmj.start().await;

    assert_eq!(transport.last_request().unwrap().url, "http://api.test/v1/me");
    assert_eq!(inner(&htmj, "#out"), "Ann");
}

#[tokio::test]
async fn event_log_traces_one_pipeline() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/x", MockResponse::json(200, json!([{"a": 1}, {"a": 2}]))),
    );
    let htmj = engine(r#"<div><template hx-endpoint="/x">${a}</template></div>"#, transport);

    htmj.start().await;

    let kinds: Vec<&'static str> = htmj
        .event_log()
        .events()
        .iter()
        .map(|e| match e.kind {
            EventKind::BindingRegistered { .. } => "registered",
            EventKind::Triggered { .. } => "triggered",
            EventKind::FetchSucceeded { .. } => "fetched",
            EventKind::Rendered { .. } => "rendered",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["registered", "triggered", "fetched", "rendered"]);
}

#[tokio::test]
async fn event_log_stays_within_capacity() {
    let transport = Arc::new(
        MockTransport::new().on("GET", "/t", MockResponse::json(200, json!({"n": 1}))),
    );
    let htmj = engine(
        r##"<button id="b">go</button><p id="out"></p>
            <template hx-endpoint="/t" hx-event="onclick" hx-event-target="#b" hx-target="#out">${n}</template>"##,
        transport,
    )
    .with_event_log(EventLog::with_capacity(16));
    htmj.start().await;

    for _ in 0..100 {
        htmj.dispatch_selector("#b", "click").await.unwrap();
    }

    let log = htmj.event_log();
    assert_eq!(log.len(), 16);
    // registered + 100 x (triggered, fetched, rendered)
    assert_eq!(log.total_emitted(), 301);
    assert!(matches!(
        log.events().last().map(|e| &e.kind),
        Some(EventKind::Rendered { .. })
    ));
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn text_without_placeholders_is_unchanged(text in "[^$]{0,40}") {
        let item = json!({"a": "b"});
        let once = htmj::template::substitute(&text, &item).into_owned();
        prop_assert_eq!(&once, &text);
        let twice = htmj::template::substitute(&once, &item).into_owned();
        prop_assert_eq!(twice, once);
    }
}
