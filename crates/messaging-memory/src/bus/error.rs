use mqtt_cmd_messaging::BusError;
use mqtt_cmd_messaging::topic::Error as TopicError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The handler failed while processing the connection.
    #[error("handler failed on connect: {0}")]
    Connect(String),

    /// The topic cannot be published to.
    #[error(transparent)]
    Topic(#[from] TopicError),
}

impl BusError for Error {}
