/// Lifecycle event names (magic strings layer)
pub mod socket_events {
    pub const CONNECTING: &str = "connecting";
    pub const OPEN: &str = "open";
    pub const MESSAGE: &str = "message";
    pub const ERROR: &str = "error";
    pub const CLOSE: &str = "close";
}

/// Default base reconnect interval (milliseconds)
pub const DEFAULT_RECONNECT_INTERVAL: u64 = 1000;

/// Default backoff multiplier
pub const DEFAULT_RECONNECT_DECAY: f64 = 1.5;

/// Default backoff ceiling (milliseconds)
pub const DEFAULT_MAX_RECONNECT_INTERVAL: u64 = 30_000;

/// Default open timeout (milliseconds)
pub const DEFAULT_OPEN_TIMEOUT: u64 = 2000;

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_PING_INTERVAL: u64 = 50_000;

/// Default heartbeat payload
pub const DEFAULT_PING_DATA: &str = "ping";

/// Default structured message field names
pub const DEFAULT_TYPE_KEY: &str = "type";
pub const DEFAULT_PAYLOAD_KEY: &str = "payload";

/// Default queued message time-to-live (milliseconds)
pub const DEFAULT_MESSAGE_QUEUE_TIMEOUT: i64 = 300_000;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_NO_STATUS: u16 = 1005;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;

/// Range of application close codes accepted by `close()`
pub const WS_CLOSE_APPLICATION_MIN: u16 = 3000;
pub const WS_CLOSE_APPLICATION_MAX: u16 = 4999;
