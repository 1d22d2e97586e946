use mqtt_cmd_messaging::BusError;
use mqtt_cmd_messaging::topic::Error as TopicError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be queued to the MQTT event loop.
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The topic cannot be published to.
    #[error(transparent)]
    Topic(#[from] TopicError),
}

impl BusError for Error {}
