//! Pipeline audit trail
//!
//! Every binding and trigger leaves a record here, which is what tests and
//! the CLI inspect to know what happened without scraping logs.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: binding, fetch and render level variants
//! - EventLog: thread-safe, append-only log holding the most recent events
//!
//! The log keeps at most [`DEFAULT_CAPACITY`] events unless built with
//! [`EventLog::with_capacity`]; older events are dropped first while ids keep
//! counting. A capacity of zero records nothing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::binding::Action;
use crate::dom::NodeId;

/// Events retained by [`EventLog::new`]
pub const DEFAULT_CAPACITY: usize = 1024;

/// Single event in the log
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // BINDING LEVEL
    // ═══════════════════════════════════════════
    BindingRegistered {
        template: NodeId,
        endpoint: String,
        event: String,
    },
    Triggered {
        template: NodeId,
        method: String,
        url: String,
    },

    // ═══════════════════════════════════════════
    // FETCH LEVEL
    // ═══════════════════════════════════════════
    FetchSucceeded {
        template: NodeId,
        items: usize,
    },
    FetchFailed {
        template: NodeId,
        error: String,
    },

    // ═══════════════════════════════════════════
    // OUTCOME LEVEL
    // ═══════════════════════════════════════════
    HandlerInvoked {
        template: NodeId,
        handler: String,
        error: String,
    },
    /// Named handler was not registered when the error arrived
    HandlerMissing {
        template: NodeId,
        handler: String,
    },
    /// Error with no handler declared: nothing rendered
    ErrorSwallowed {
        template: NodeId,
        error: String,
    },
    Rendered {
        template: NodeId,
        action: Action,
        fragments: usize,
    },
}

impl EventKind {
    pub fn template(&self) -> NodeId {
        match self {
            Self::BindingRegistered { template, .. }
            | Self::Triggered { template, .. }
            | Self::FetchSucceeded { template, .. }
            | Self::FetchFailed { template, .. }
            | Self::HandlerInvoked { template, .. }
            | Self::HandlerMissing { template, .. }
            | Self::ErrorSwallowed { template, .. }
            | Self::Rendered { template, .. } => *template,
        }
    }

    /// Whether this event ends a triggered pipeline
    pub fn is_outcome(&self) -> bool {
        matches!(
            self,
            Self::HandlerInvoked { .. }
                | Self::HandlerMissing { .. }
                | Self::ErrorSwallowed { .. }
                | Self::Rendered { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<VecDeque<Event>>>,
    capacity: usize,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Log retaining at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let preallocated = capacity.min(DEFAULT_CAPACITY);
        Self {
            events: Arc::new(RwLock::new(VecDeque::with_capacity(preallocated))),
            capacity,
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if self.capacity == 0 {
            return id;
        }
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        let mut events = self.events.write();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        id
    }

    /// Get retained events, oldest first (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events emitted so far, dropped ones included
    pub fn total_emitted(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Events of one template
    pub fn filter_template(&self, template: NodeId) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.template() == template)
            .collect()
    }

    /// Pipeline outcomes only (render, handler, swallow)
    pub fn outcomes(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_outcome())
            .collect()
    }

    /// Serialize to JSON for debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
