//! htmj - declarative fetch-and-render bindings for HTML templates
//!
//! ```text
//! <template hx-endpoint="/api/data" hx-target="#out">Hello ${name}</template>
//! ```
//!
//! Load a page into a [`Document`], hand it to [`Htmj`] with a
//! [`Transport`], call [`Htmj::start`] once the page is ready and
//! [`Htmj::dispatch`] for user events.

pub mod binding;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_log;
pub mod fetch;
pub mod handlers;
pub mod path;
pub mod render;
pub mod template;
pub mod transport;

pub use binding::{Action, AttrValue, AttributeNames, BindingDescriptor};
pub use config::HtmjConfig;
pub use dom::{Document, NodeId, SharedDocument};
pub use engine::{Htmj, ScanReport};
pub use error::{FixSuggestion, HtmjError};
pub use event::{DispatchOutcome, Event, Trigger};
pub use event_log::{EventKind, EventLog};
pub use fetch::FetchResult;
pub use handlers::HandlerRegistry;
pub use transport::{FetchRequest, HttpTransport, MockResponse, MockTransport, Transport};
