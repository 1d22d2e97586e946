use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message properties (MQTT 5 user properties and similar metadata).
pub type Properties = HashMap<String, String>;

/// Delivery guarantee requested for a message.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce,

    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce,

    /// Assured single delivery.
    ExactlyOnce,
}

/// The QoS level is not 0, 1 or 2.
#[derive(Clone, Copy, Debug, Error)]
#[error("invalid QoS level {0}")]
pub struct InvalidQoS(pub u8);

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = InvalidQoS;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(InvalidQoS(other)),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// An inbound or outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The concrete topic the message was published on.
    pub topic: String,

    /// The raw payload.
    pub payload: Bytes,

    /// The delivery QoS.
    pub qos: QoS,

    /// Additional metadata delivered with the message.
    pub properties: Properties,
}

impl Message {
    /// Creates a message without properties.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            properties: Properties::new(),
        }
    }

    /// Attaches properties to the message.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Decodes the payload as UTF-8, replacing invalid sequences with U+FFFD.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
