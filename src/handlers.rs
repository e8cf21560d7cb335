//! Named error handlers
//!
//! Templates name their error handler (`hx-error="showErr"`); the host
//! registers functions under those names. Lookup happens when an error is
//! routed, not when the template is scanned, so handlers may be registered
//! or replaced at any time.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// Handler receiving the failure message
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Shared name → handler map (cheap to clone)
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<String, ErrorHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler called `name`
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<ErrorHandler> {
        self.handlers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Call `name` with `message`; false when nothing is registered
    ///
    /// The handler runs after the map entry is released, so it may itself
    /// register or unregister handlers.
    pub fn invoke(&self, name: &str, message: &str) -> bool {
        match self.get(name) {
            Some(handler) => {
                handler(message);
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}
