use serde_json::{Map, Value};

use super::error::{Result, SocketError};

/// A single frame as carried by the transport, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Field names used to tag structured messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKeys {
    pub type_key: String,
    pub payload_key: String,
}

/// An outgoing message, classified by the API entry point that produced it.
///
/// The original form is what gets queued while the connection is down;
/// encoding into a [`Payload`] happens only when the message is actually
/// handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Sent verbatim as a binary frame
    Binary(Vec<u8>),
    /// Sent verbatim as a text frame
    Text(String),
    /// Serialized to JSON text; `Value::Null` sends an empty text frame
    Json(Value),
    /// Rendered as `{type_key: message_type, payload_key: payload}`
    Structured { message_type: String, payload: Value },
}

impl OutboundMessage {
    /// Builds a structured message, rejecting an empty type.
    pub fn structured(message_type: impl Into<String>, payload: Value) -> Result<Self> {
        let message_type = message_type.into();
        if message_type.trim().is_empty() {
            return Err(SocketError::invalid_argument(
                "message type must be a non-empty string",
            ));
        }

        Ok(Self::Structured {
            message_type,
            payload,
        })
    }

    /// Encodes the message into the frame that goes on the wire.
    pub fn encode(&self, keys: &MessageKeys) -> Payload {
        match self {
            Self::Binary(data) => Payload::Binary(data.clone()),
            Self::Text(text) => Payload::Text(text.clone()),
            Self::Json(Value::Null) => Payload::Text(String::new()),
            Self::Json(value) => Payload::Text(value.to_string()),
            Self::Structured {
                message_type,
                payload,
            } => {
                let mut object = Map::new();
                object.insert(keys.type_key.clone(), Value::String(message_type.clone()));
                object.insert(keys.payload_key.clone(), payload.clone());
                Payload::Text(Value::Object(object).to_string())
            }
        }
    }
}

impl From<Payload> for OutboundMessage {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Self::Text(text),
            Payload::Binary(data) => Self::Binary(data),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for OutboundMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Close notification details as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }
}

/// Transport-level failure surfaced through the `error` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
