//! Event Binder types
//!
//! A binding's `event` attribute is either `onload` (run at bind time) or a
//! native event name carrying a two-character prefix (`onclick` → `click`).
//! Listeners are kept per node; dispatch bubbles from the target up through
//! its ancestors.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::binding::{BindingDescriptor, DEFAULT_EVENT};
use crate::dom::{Document, NodeId};

/// When a binding's pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Immediately, while binding
    Load,
    /// On this native event at the event target
    Dom(String),
}

impl Trigger {
    pub fn parse(event: &str) -> Self {
        if event == DEFAULT_EVENT {
            Self::Load
        } else {
            let native = event.char_indices().nth(2).map_or("", |(i, _)| &event[i..]);
            Self::Dom(native.to_string())
        }
    }
}

/// A dispatched DOM event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    target: NodeId,
    default_prevented: bool,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            default_prevented: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// What a dispatch did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Pipelines started by the event
    pub triggered: usize,
    pub default_prevented: bool,
}

#[derive(Debug, Clone)]
struct Listener {
    event: String,
    binding: Arc<BindingDescriptor>,
}

/// Registered listeners, by node
#[derive(Debug, Default)]
pub struct ListenerTable {
    by_node: FxHashMap<NodeId, Vec<Listener>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: NodeId, event: impl Into<String>, binding: Arc<BindingDescriptor>) {
        self.by_node.entry(node).or_default().push(Listener {
            event: event.into(),
            binding,
        });
    }

    /// Bindings listening for `event` on `target` or an ancestor
    ///
    /// Order: the target's own listeners first (registration order), then
    /// each ancestor's outward.
    pub fn matching(&self, doc: &Document, target: NodeId, event: &str) -> Vec<Arc<BindingDescriptor>> {
        doc.ancestors_inclusive(target)
            .into_iter()
            .filter_map(|node| self.by_node.get(&node))
            .flatten()
            .filter(|listener| listener.event == event)
            .map(|listener| Arc::clone(&listener.binding))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
