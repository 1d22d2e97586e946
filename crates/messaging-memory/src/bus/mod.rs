mod error;

use crate::MemoryBroker;
pub use error::Error;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mqtt_cmd_messaging::bus::BusOptions;
use mqtt_cmd_messaging::topic::validate_topic;
use mqtt_cmd_messaging::{Bus, BusHandler, Message, QoS, TopicFilter};
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Options for connecting to a [`MemoryBroker`].
#[derive(Clone, Debug)]
pub struct MemoryBusOptions {
    /// The broker to connect to.
    pub broker: MemoryBroker,

    /// The client identifier reported by the bus.
    pub client_id: String,
}
impl BusOptions for MemoryBusOptions {}

/// A connection to an in-process broker.
#[derive(Clone, Debug)]
pub struct MemoryBus {
    broker: MemoryBroker,
    client_id: String,
    filters: Arc<RwLock<Vec<TopicFilter>>>,
    shutdown: CancellationToken,
}

impl MemoryBus {
    async fn is_subscribed(&self, topic: &str) -> bool {
        self.filters
            .read()
            .await
            .iter()
            .any(|filter| filter.matches(topic))
    }
}

#[async_trait]
impl Bus for MemoryBus {
    type Error = Error;
    type Options = MemoryBusOptions;

    async fn connect<H>(options: Self::Options, handler: H) -> Result<Self, Self::Error>
    where
        H: BusHandler<Self>,
    {
        // Subscribe to the broker before anything else so no message published
        // after `connect` returns can be missed.
        let mut receiver = options.broker.receiver();

        let bus = Self {
            broker: options.broker,
            client_id: options.client_id,
            filters: Arc::new(RwLock::new(Vec::new())),
            shutdown: CancellationToken::new(),
        };

        handler
            .on_connect(&bus)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        let loop_bus = bus.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = loop_bus.shutdown.cancelled() => {
                        break;
                    }
                    message = receiver.recv() => {
                        match message {
                            Ok(message) => {
                                if !loop_bus.is_subscribed(&message.topic).await {
                                    continue;
                                }
                                let handler = handler.clone();
                                let bus = loop_bus.clone();
                                tokio::spawn(async move {
                                    let topic = message.topic.clone();
                                    if let Err(e) = handler.on_message(&bus, message).await {
                                        warn!(%topic, "message handler failed: {e}");
                                    }
                                });
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("memory bus lagged, {skipped} messages dropped");
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                }
            }
            debug!(client_id = %loop_bus.client_id, "memory bus loop stopped");
        });

        Ok(bus)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn subscribe(&self, filter: &TopicFilter) -> Result<(), Self::Error> {
        let mut filters = self.filters.write().await;
        if !filters.contains(filter) {
            filters.push(filter.clone());
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), Self::Error> {
        validate_topic(topic)?;
        self.broker.publish(Message::new(topic, payload, qos));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        self.shutdown.cancel();
        Ok(())
    }
}
