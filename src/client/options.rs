use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::endpoint::Endpoint;
use crate::types::constants::*;
use crate::types::{MessageKeys, Result, SocketError};

/// How inbound binary frames are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    /// Delivered verbatim as `message` events only
    #[default]
    #[serde(alias = "blob", alias = "arraybuffer")]
    Bytes,
    /// Decoded as UTF-8 so structured binary messages are routed too
    Utf8,
}

/// Configuration for [`WebSocketClient`](crate::WebSocketClient).
///
/// Deserializing from a loose key/value object rejects unknown keys, so a
/// typo in an option name fails construction instead of being ignored.
/// Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Open during construction. Default: `true`.
    pub automatic_open: bool,
    /// Replaces the endpoint path.
    pub path: Option<String>,
    /// Merged into the endpoint query, overriding existing keys.
    pub query: BTreeMap<String, String>,
    /// Sub-protocols offered during the handshake.
    pub protocols: Vec<String>,
    pub binary_type: BinaryType,
    /// Base reconnect delay. Default: 1000.
    pub reconnect_interval: u64,
    /// Backoff multiplier. Default: 1.5.
    pub reconnect_decay: f64,
    /// Backoff ceiling. Default: 30000.
    pub max_reconnect_interval: u64,
    /// Maximum consecutive reconnect attempts. `None` retries forever;
    /// `Some(0)` never retries, so only the first attempt is made.
    pub max_reconnect_attempts: Option<u32>,
    /// How long an attempt may take to open. Default: 2000.
    pub open_timeout_interval: u64,
    /// Heartbeat interval; `None` disables the heartbeat. Accepts `false`
    /// when deserialized. Default: 50000.
    #[serde(deserialize_with = "deserialize_ping_interval")]
    pub ping_interval: Option<u64>,
    /// Heartbeat payload, sent as a text frame. Default: `"ping"`.
    pub ping_data: String,
    pub type_key: String,
    pub payload_key: String,
    /// Close codes after which no reconnect is attempted. Default: `[1000]`.
    #[serde(rename = "normalCloseCode")]
    pub normal_close_codes: Vec<u16>,
    /// Time-to-live of queued messages; zero or negative keeps them forever.
    /// Default: 300000.
    pub message_queue_timeout: i64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            automatic_open: true,
            path: None,
            query: BTreeMap::new(),
            protocols: Vec::new(),
            binary_type: BinaryType::default(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reconnect_decay: DEFAULT_RECONNECT_DECAY,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            max_reconnect_attempts: None,
            open_timeout_interval: DEFAULT_OPEN_TIMEOUT,
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            ping_data: DEFAULT_PING_DATA.to_string(),
            type_key: DEFAULT_TYPE_KEY.to_string(),
            payload_key: DEFAULT_PAYLOAD_KEY.to_string(),
            normal_close_codes: vec![WS_CLOSE_NORMAL],
            message_queue_timeout: DEFAULT_MESSAGE_QUEUE_TIMEOUT,
        }
    }
}

fn deserialize_ping_interval<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PingSetting {
        Enabled(bool),
        Millis(u64),
    }

    Ok(match Option::<PingSetting>::deserialize(deserializer)? {
        None | Some(PingSetting::Enabled(false)) => None,
        Some(PingSetting::Enabled(true)) => Some(DEFAULT_PING_INTERVAL),
        Some(PingSetting::Millis(ms)) => Some(ms),
    })
}

impl ClientOptions {
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Builds options from a loose JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::InvalidArgument`] for unknown keys, values of
    /// the wrong type, or values rejected by [`validate`](Self::validate).
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(SocketError::invalid_argument(
                "options must be a JSON object",
            ));
        }
        let options: Self = serde_json::from_value(value)
            .map_err(|e| SocketError::invalid_argument(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Checks value ranges that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval == 0 {
            return Err(SocketError::invalid_argument(
                "reconnectInterval must be greater than zero",
            ));
        }
        if !self.reconnect_decay.is_finite() || self.reconnect_decay < 1.0 {
            return Err(SocketError::invalid_argument(
                "reconnectDecay must be a finite number >= 1.0",
            ));
        }
        if self.max_reconnect_interval < self.reconnect_interval {
            return Err(SocketError::invalid_argument(
                "maxReconnectInterval must not be smaller than reconnectInterval",
            ));
        }
        if self.open_timeout_interval == 0 {
            return Err(SocketError::invalid_argument(
                "openTimeoutInterval must be greater than zero",
            ));
        }
        if self.ping_interval == Some(0) {
            return Err(SocketError::invalid_argument(
                "pingInterval must be greater than zero, or false to disable",
            ));
        }
        if self.type_key.is_empty() || self.payload_key.is_empty() {
            return Err(SocketError::invalid_argument(
                "typeKey and payloadKey must not be empty",
            ));
        }
        if self.type_key == self.payload_key {
            return Err(SocketError::invalid_argument(
                "typeKey and payloadKey must differ",
            ));
        }
        Ok(())
    }

    /// Parses `endpoint` and applies the path and query overrides.
    pub fn resolve_endpoint(&self, endpoint: &str) -> Result<String> {
        let mut resolved = Endpoint::parse(endpoint)?;
        if let Some(path) = &self.path {
            resolved.set_path(path);
        }
        resolved.merge_query(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(resolved.build())
    }

    pub fn message_keys(&self) -> MessageKeys {
        MessageKeys {
            type_key: self.type_key.clone(),
            payload_key: self.payload_key.clone(),
        }
    }

    pub fn is_normal_close(&self, code: u16) -> bool {
        self.normal_close_codes.contains(&code)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_interval)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval.map(Duration::from_millis)
    }
}

/// Fluent construction of [`ClientOptions`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    pub fn automatic_open(mut self, enabled: bool) -> Self {
        self.options.automatic_open = enabled;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.options.path = Some(path.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.insert(key.into(), value.into());
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.protocols.push(protocol.into());
        self
    }

    pub fn binary_type(mut self, binary_type: BinaryType) -> Self {
        self.options.binary_type = binary_type;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.options.reconnect_interval = duration_to_millis(interval);
        self
    }

    pub fn reconnect_decay(mut self, decay: f64) -> Self {
        self.options.reconnect_decay = decay;
        self
    }

    pub fn max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.options.max_reconnect_interval = duration_to_millis(interval);
        self
    }

    /// Caps consecutive reconnects. `0` disables reconnecting entirely.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.options.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.options.open_timeout_interval = duration_to_millis(timeout);
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.options.ping_interval = Some(duration_to_millis(interval));
        self
    }

    pub fn disable_heartbeat(mut self) -> Self {
        self.options.ping_interval = None;
        self
    }

    pub fn ping_data(mut self, data: impl Into<String>) -> Self {
        self.options.ping_data = data.into();
        self
    }

    pub fn message_keys(mut self, type_key: impl Into<String>, payload_key: impl Into<String>) -> Self {
        self.options.type_key = type_key.into();
        self.options.payload_key = payload_key.into();
        self
    }

    pub fn normal_close_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.options.normal_close_codes = codes.into_iter().collect();
        self
    }

    /// `None` keeps queued messages until they can be sent.
    pub fn message_queue_timeout(mut self, ttl: Option<Duration>) -> Self {
        self.options.message_queue_timeout = match ttl {
            Some(ttl) => i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            None => 0,
        };
        self
    }

    /// # Errors
    ///
    /// Returns [`SocketError::InvalidArgument`] if a value is out of range.
    pub fn build(self) -> Result<ClientOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
