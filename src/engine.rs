//! Engine - scanner, binder and pipeline coordinator
//!
//! [`Htmj`] owns nothing but shared handles; every pipeline it starts gets
//! its own clones, so templates never share mutable state besides the
//! document itself.
//!
//! ```text
//! start()  → scan templates → resolve bindings → onload: run now
//!                                              → other: listen on event target
//! dispatch(node, event) → matching listeners → run pipelines concurrently
//!
//! pipeline: [sync] prevent default, collect payload, build request
//!           [async] fetch → error: handler | swallow
//!                         → data: render into target
//! ```
//!
//! The document lock is taken only for the synchronous steps and is never
//! held across an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::binding::{resolve_binding, BindingDescriptor};
use crate::config::HtmjConfig;
use crate::dom::{Document, NodeId, SharedDocument};
use crate::error::HtmjError;
use crate::event::{DispatchOutcome, Event, ListenerTable, Trigger};
use crate::event_log::{EventKind, EventLog};
use crate::fetch::{build_request, collect_payload, fetch_data, FetchResult};
use crate::handlers::HandlerRegistry;
use crate::render;
use crate::transport::Transport;

/// Result of the startup scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub bindings: Vec<Arc<BindingDescriptor>>,
    /// Bindings that ran at load
    pub immediate: usize,
    /// Bindings waiting for an event
    pub listening: usize,
}

/// Handles a pipeline needs, cloned per trigger
#[derive(Clone)]
struct PipelineContext {
    document: SharedDocument,
    transport: Arc<dyn Transport>,
    handlers: HandlerRegistry,
    config: Arc<HtmjConfig>,
    event_log: EventLog,
}

pub struct Htmj {
    ctx: PipelineContext,
    listeners: Mutex<ListenerTable>,
    started: AtomicBool,
}

impl Htmj {
    pub fn new(document: SharedDocument, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx: PipelineContext {
                document,
                transport,
                handlers: HandlerRegistry::new(),
                config: Arc::new(HtmjConfig::default()),
                event_log: EventLog::new(),
            },
            listeners: Mutex::new(ListenerTable::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_config(mut self, config: HtmjConfig) -> Self {
        self.ctx.config = Arc::new(config);
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.ctx.handlers = handlers;
        self
    }

    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.ctx.event_log = event_log;
        self
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.ctx.document)
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.ctx.handlers
    }

    pub fn event_log(&self) -> &EventLog {
        &self.ctx.event_log
    }

    pub fn config(&self) -> &HtmjConfig {
        &self.ctx.config
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Resolve the binding of every annotated template (no side effects)
    pub fn scan(&self) -> Vec<BindingDescriptor> {
        let doc = self.ctx.document.lock();
        scan_document(&doc, &self.ctx.config)
    }

    /// Document-ready signal: bind every template once
    ///
    /// `onload` pipelines start during binding and are awaited before this
    /// returns. Later calls bind nothing.
    #[instrument(skip(self))]
    pub async fn start(&self) -> ScanReport {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("already started, skipping scan");
            return ScanReport::default();
        }

        let bindings: Vec<Arc<BindingDescriptor>> =
            self.scan().into_iter().map(Arc::new).collect();
        {
            // Renders release what they remove; bound nodes must outlive that
            let mut doc = self.ctx.document.lock();
            for binding in &bindings {
                doc.pin(binding.template);
                doc.pin(binding.target);
                doc.pin(binding.event_target);
            }
        }
        let mut report = ScanReport::default();
        let mut immediate = Vec::new();

        for binding in &bindings {
            self.ctx.event_log.emit(EventKind::BindingRegistered {
                template: binding.template,
                endpoint: binding.endpoint.clone(),
                event: binding.event.clone(),
            });

            match Trigger::parse(&binding.event) {
                Trigger::Load => {
                    debug!(template = binding.template.index(), endpoint = %binding.endpoint, "running at load");
                    immediate.push(trigger(self.ctx.clone(), Arc::clone(binding), None));
                    report.immediate += 1;
                }
                Trigger::Dom(native) => {
                    debug!(
                        template = binding.template.index(),
                        event = %native,
                        "listening"
                    );
                    self.listeners
                        .lock()
                        .add(binding.event_target, native, Arc::clone(binding));
                    report.listening += 1;
                }
            }
        }

        join_all(immediate).await;
        report.bindings = bindings;
        report
    }

    /// Fire `event` (native name, e.g. `click`) at `node`
    ///
    /// Listeners on `node` and its ancestors run; their pipelines are awaited
    /// together, so overlapping requests race and the last to finish wins.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, node: NodeId, event: &str) -> DispatchOutcome {
        let bindings = {
            let doc = self.ctx.document.lock();
            self.listeners.lock().matching(&doc, node, event)
        };

        let mut dom_event = Event::new(event, node);
        let pipelines: Vec<_> = bindings
            .into_iter()
            .map(|binding| trigger(self.ctx.clone(), binding, Some(&mut dom_event)))
            .collect();
        let triggered = pipelines.len();
        join_all(pipelines).await;

        DispatchOutcome {
            triggered,
            default_prevented: dom_event.default_prevented(),
        }
    }

    /// Fire `event` at the first element matching `selector`
    pub async fn dispatch_selector(
        &self,
        selector: &str,
        event: &str,
    ) -> Result<DispatchOutcome, HtmjError> {
        let node = self
            .ctx
            .document
            .lock()
            .select_first(selector)?
            .ok_or_else(|| HtmjError::NoMatch {
                selector: selector.to_string(),
            })?;
        Ok(self.dispatch(node, event).await)
    }
}

/// Bindings of every `template[<prefix>endpoint]`, in document order
pub fn scan_document(doc: &Document, config: &HtmjConfig) -> Vec<BindingDescriptor> {
    let names = config.attribute_names();
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&node| {
            doc.tag_name(node) == Some("template") && doc.has_attribute(node, &names.endpoint)
        })
        .filter_map(|template| resolve_binding(doc, template, &names))
        .collect()
}

/// Start one pipeline run
///
/// The synchronous part (prevent default, payload, request) happens now;
/// the returned future performs the fetch and the render.
fn trigger(
    ctx: PipelineContext,
    binding: Arc<BindingDescriptor>,
    event: Option<&mut Event>,
) -> BoxFuture<'static, ()> {
    if let Some(event) = event {
        event.prevent_default();
    }

    let request = {
        let doc = ctx.document.lock();
        let payload = collect_payload(&doc, binding.data_sources.as_deref());
        build_request(
            &binding.endpoint,
            &binding.method,
            payload,
            ctx.config.base_url.as_ref(),
        )
    };

    ctx.event_log.emit(EventKind::Triggered {
        template: binding.template,
        method: request.method.clone(),
        url: request.url.clone(),
    });

    async move {
        let result = fetch_data(ctx.transport.as_ref(), &request).await;
        complete(&ctx, &binding, result);
    }
    .boxed()
}

/// Route a finished fetch: handler, silent drop, or render
fn complete(ctx: &PipelineContext, binding: &BindingDescriptor, result: FetchResult) {
    let template = binding.template;
    match result {
        FetchResult::Error(error) => {
            ctx.event_log.emit(EventKind::FetchFailed {
                template,
                error: error.clone(),
            });
            match &binding.error_handler {
                Some(name) => {
                    if ctx.handlers.invoke(name, &error) {
                        ctx.event_log.emit(EventKind::HandlerInvoked {
                            template,
                            handler: name.clone(),
                            error,
                        });
                    } else {
                        warn!(handler = %name, "error handler is not registered");
                        ctx.event_log.emit(EventKind::HandlerMissing {
                            template,
                            handler: name.clone(),
                        });
                    }
                }
                None => {
                    debug!(template = template.index(), "no error handler, nothing rendered");
                    ctx.event_log.emit(EventKind::ErrorSwallowed { template, error });
                }
            }
        }
        FetchResult::Data(data) => {
            ctx.event_log.emit(EventKind::FetchSucceeded {
                template,
                items: render::render_items(&data).len(),
            });
            let fragments = {
                let mut doc = ctx.document.lock();
                render::render(
                    &mut doc,
                    template,
                    &data,
                    binding.target,
                    binding.action,
                    &ctx.config.nested_array_attr,
                )
            };
            ctx.event_log.emit(EventKind::Rendered {
                template,
                action: binding.action,
                fragments,
            });
        }
    }
}
