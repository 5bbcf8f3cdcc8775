use serde_json::Value;

use crate::types::constants::socket_events;
use crate::types::{CloseInfo, Payload, TransportFailure};

/// Application-facing events emitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A connection attempt is starting. Carries the close that caused it
    /// when this is a reconnect.
    Connecting(Option<CloseInfo>),

    /// The transport is open
    Open {
        protocol: Option<String>,
        reconnect_attempt: bool,
    },

    /// Any inbound frame, verbatim
    Message(Payload),

    /// Transport reported an error
    Error(TransportFailure),

    /// The connection closed with a normal code and will not reconnect
    Close(CloseInfo),

    /// Inbound structured message, named by its type field
    Typed { name: String, payload: Value },
}

impl SocketEvent {
    /// Name the event is dispatched under.
    pub fn name(&self) -> &str {
        match self {
            Self::Connecting(_) => socket_events::CONNECTING,
            Self::Open { .. } => socket_events::OPEN,
            Self::Message(_) => socket_events::MESSAGE,
            Self::Error(_) => socket_events::ERROR,
            Self::Close(_) => socket_events::CLOSE,
            Self::Typed { name, .. } => name,
        }
    }

    /// Payload of a typed event.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Typed { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

impl std::fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
