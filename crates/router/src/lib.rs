//! Declarative routing of bus messages to HTTP requests and local commands.
//!
//! A [`RouterConfig`] lists topic filters, each with a handler that extracts
//! a value from the message (raw payload, jq query or Jinja template) and
//! maps values to actions. [`Router`] implements
//! [`BusHandler`](mqtt_cmd_messaging::BusHandler) for any bus.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Actions and the template library.
pub mod action;

/// Configuration model.
pub mod config;

/// Per-message template variables.
pub mod context;

/// Pattern matching of extracted values.
pub mod dispatch;

/// Error types.
pub mod error;

/// Value extraction.
pub mod extract;

/// Validated handler definitions.
pub mod handler;

/// jq queries.
pub mod query;

/// Routing table.
pub mod registry;

/// Jinja rendering.
pub mod render;

mod router;

#[cfg(test)]
mod test_support;

pub use action::{ActionEnv, ActionSpec, TemplateLibrary};
pub use config::{ExtractionFailurePolicy, RouterConfig};
pub use context::Context;
pub use error::{ActionError, ConfigError, ConfigIssue, Error, ExtractionError, Result};
pub use registry::Registry;
pub use router::{RouteReport, Router};
