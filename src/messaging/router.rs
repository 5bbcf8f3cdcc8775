use serde_json::Value;

use super::SocketEvent;
use crate::client::BinaryType;
use crate::types::{MessageKeys, Payload};

/// Turns inbound frames into application events.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    keys: MessageKeys,
    binary_type: BinaryType,
}

impl MessageRouter {
    pub fn new(keys: MessageKeys, binary_type: BinaryType) -> Self {
        Self { keys, binary_type }
    }

    /// Routes one inbound frame.
    ///
    /// The raw frame is always emitted first as `message`. When the frame
    /// parses as a JSON object with a non-empty string under the type key, a
    /// second event named by that type carries the payload field.
    /// Anything that does not parse is plain traffic and produces no error.
    pub fn route(&self, payload: Payload) -> Vec<SocketEvent> {
        let typed = self.typed_event(&payload);

        let mut events = Vec::with_capacity(2);
        events.push(SocketEvent::Message(payload));
        events.extend(typed);
        events
    }

    fn typed_event(&self, payload: &Payload) -> Option<SocketEvent> {
        let text = match (payload, self.binary_type) {
            (Payload::Text(text), _) => text.as_str(),
            (Payload::Binary(data), BinaryType::Utf8) => std::str::from_utf8(data).ok()?,
            (Payload::Binary(_), BinaryType::Bytes) => return None,
        };

        let Value::Object(mut object) = serde_json::from_str::<Value>(text).ok()? else {
            return None;
        };

        let name = match object.get(&self.keys.type_key) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => return None,
        };
        let payload = object
            .remove(&self.keys.payload_key)
            .unwrap_or(Value::Null);

        tracing::debug!("Routing structured message of type {}", name);
        Some(SocketEvent::Typed { name, payload })
    }
}
