use crate::bus_handler::BusHandler;
use crate::message::QoS;
use crate::topic::TopicFilter;

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Marker trait for bus errors
pub trait BusError: Error + Send + Sync + 'static {}

/// Marker trait for bus options
pub trait BusOptions: Clone + Debug + Send + Sync + 'static {}

/// A connection to a publish/subscribe message bus.
///
/// Implementations call [`BusHandler::on_connect`] after every successful
/// (re)connection and [`BusHandler::on_message`] once per inbound message on
/// a subscribed filter. Inbound messages may be handled concurrently.
#[async_trait]
pub trait Bus
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the bus.
    type Error: BusError;

    /// The options used to connect.
    type Options: BusOptions;

    /// Connects to the bus and starts delivering events to `handler`.
    async fn connect<H>(options: Self::Options, handler: H) -> Result<Self, Self::Error>
    where
        H: BusHandler<Self>;

    /// The client identifier used for this connection.
    fn client_id(&self) -> &str;

    /// Subscribes to every topic accepted by `filter`.
    async fn subscribe(&self, filter: &TopicFilter) -> Result<(), Self::Error>;

    /// Publishes a payload on a concrete topic.
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), Self::Error>;

    /// Closes the connection. No further events are delivered afterwards.
    async fn disconnect(&self) -> Result<(), Self::Error>;
}
