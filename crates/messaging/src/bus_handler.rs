use crate::bus::Bus;
use crate::message::Message;

use std::error::Error;

use async_trait::async_trait;

/// Marker trait for bus handler errors
pub trait BusHandlerError: Error + Send + Sync + 'static {}

/// Receives connection and message events from a [`Bus`].
#[async_trait]
pub trait BusHandler<B>
where
    Self: Clone + Send + Sync + 'static,
    B: Bus,
{
    /// The error type for the handler.
    type Error: BusHandlerError;

    /// Called after every successful connection, including reconnections.
    async fn on_connect(&self, bus: &B) -> Result<(), Self::Error>;

    /// Called once per inbound message.
    async fn on_message(&self, bus: &B, message: Message) -> Result<(), Self::Error>;
}
