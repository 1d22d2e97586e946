//! MQTT implementation of the messaging crate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Buses backed by an MQTT broker connection.
pub mod bus;

pub use bus::{Error, MqttBus, MqttBusOptions};
