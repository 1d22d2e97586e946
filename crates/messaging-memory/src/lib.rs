//! In-memory implementation of the messaging crate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Buses connected to an in-process broker.
pub mod bus;

pub use bus::{Error, MemoryBus, MemoryBusOptions};

use mqtt_cmd_messaging::Message;
use tokio::sync::broadcast;

const BROKER_CAPACITY: usize = 1024;

/// An in-process broker shared by every [`MemoryBus`] connected to it.
///
/// Each published message is fanned out to all connected buses, which then
/// check it against their own subscriptions.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    sender: broadcast::Sender<Message>,
}

impl MemoryBroker {
    /// Creates a broker with no connected buses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(BROKER_CAPACITY).0,
        }
    }

    fn publish(&self, message: Message) {
        // No connected bus is not an error: MQTT drops unrouted messages too.
        let _ = self.sender.send(message);
    }

    fn receiver(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}
