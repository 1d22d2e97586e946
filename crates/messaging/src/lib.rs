//! Abstract interface for publish/subscribe message buses.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Buses deliver messages published on topics to subscribed handlers.
pub mod bus;

/// Bus handlers react to connections and inbound messages.
pub mod bus_handler;

/// Messages and their delivery metadata.
pub mod message;

/// Topics and wildcard topic filters.
pub mod topic;

pub use bus::{Bus, BusError};
pub use bus_handler::{BusHandler, BusHandlerError};
pub use message::{Message, Properties, QoS};
pub use topic::TopicFilter;
