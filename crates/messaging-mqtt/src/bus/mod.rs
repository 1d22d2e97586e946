mod error;

pub use error::Error;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mqtt_cmd_messaging::bus::BusOptions;
use mqtt_cmd_messaging::topic::validate_topic;
use mqtt_cmd_messaging::{Bus, BusHandler, Message, QoS, TopicFilter};
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REQUEST_CAPACITY: usize = 64;

/// Options for connecting to an MQTT broker.
#[derive(Clone, Debug)]
pub struct MqttBusOptions {
    /// Broker host name or address.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// Keep-alive interval.
    pub keep_alive: Duration,

    /// Username and password, if the broker requires them.
    pub credentials: Option<(String, String)>,

    /// How long to wait before reconnecting after a connection error.
    pub reconnect_delay: Duration,
}
impl BusOptions for MqttBusOptions {}

impl MqttBusOptions {
    /// Creates options with a 60 second keep-alive and no credentials.
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(60),
            credentials: None,
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the username and password.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// A connection to an MQTT 3.1.1 broker.
///
/// The event loop reconnects on its own after errors; the handler's
/// `on_connect` runs again after every successful reconnection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    client_id: String,
    shutdown: CancellationToken,
}

impl fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttBus")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

const fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

const fn from_mqtt_qos(qos: rumqttc::QoS) -> QoS {
    match qos {
        rumqttc::QoS::AtMostOnce => QoS::AtMostOnce,
        rumqttc::QoS::AtLeastOnce => QoS::AtLeastOnce,
        rumqttc::QoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[async_trait]
impl Bus for MqttBus {
    type Error = Error;
    type Options = MqttBusOptions;

    async fn connect<H>(options: Self::Options, handler: H) -> Result<Self, Self::Error>
    where
        H: BusHandler<Self>,
    {
        let mut mqtt_options = MqttOptions::new(&options.client_id, &options.host, options.port);
        mqtt_options.set_keep_alive(options.keep_alive);
        if let Some((username, password)) = &options.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        let bus = Self {
            client,
            client_id: options.client_id.clone(),
            shutdown: CancellationToken::new(),
        };

        let loop_bus = bus.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("connected to broker {}:{}", options.host, options.port);
                            // Subscribing goes through the event loop, so it must
                            // not be awaited from inside it.
                            let handler = handler.clone();
                            let bus = loop_bus.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handler.on_connect(&bus).await {
                                    warn!("connect handler failed: {e}");
                                }
                            });
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let message = Message::new(
                                publish.topic,
                                publish.payload,
                                from_mqtt_qos(publish.qos),
                            );
                            let handler = handler.clone();
                            let bus = loop_bus.clone();
                            tokio::spawn(async move {
                                let topic = message.topic.clone();
                                if let Err(e) = handler.on_message(&bus, message).await {
                                    warn!(%topic, "message handler failed: {e}");
                                }
                            });
                        }
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                            debug!("disconnect sent");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if loop_bus.shutdown.is_cancelled() {
                                break;
                            }
                            warn!(
                                "mqtt connection error: {e}; reconnecting in {:?}",
                                options.reconnect_delay
                            );
                            tokio::select! {
                                () = tokio::time::sleep(options.reconnect_delay) => {}
                                () = loop_bus.shutdown.cancelled() => break,
                            }
                        }
                    },
                    () = loop_bus.shutdown.cancelled() => {
                        break;
                    }
                }
            }
            info!(client_id = %loop_bus.client_id, "mqtt event loop stopped");
        });

        Ok(bus)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn subscribe(&self, filter: &TopicFilter) -> Result<(), Self::Error> {
        self.client
            .subscribe(filter.as_str(), rumqttc::QoS::AtMostOnce)
            .await?;
        debug!("subscribed to {filter}");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), Self::Error> {
        validate_topic(topic)?;
        self.client
            .publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        let result = self.client.disconnect().await;
        self.shutdown.cancel();
        result.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_conversion() {
        for qos in [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce] {
            assert_eq!(from_mqtt_qos(to_mqtt_qos(qos)), qos);
        }
    }

    #[test]
    fn test_options_builder() {
        let options = MqttBusOptions::new("broker", 1884, "router")
            .with_keep_alive(Duration::from_secs(30))
            .with_credentials("user", "secret");

        assert_eq!(options.keep_alive, Duration::from_secs(30));
        assert_eq!(
            options.credentials,
            Some(("user".to_string(), "secret".to_string()))
        );
    }
}
