use crate::websocket::TransportId;

/// Lifecycle phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Before the first attempt, during any attempt, and while waiting to retry
    Connecting,
    Open,
    /// Close requested, waiting for the transport to confirm
    Closing,
    /// Terminal until `open()` is called again
    Closed,
}

/// Opaque token identifying one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub(crate) u64);

/// Consolidated mutable state owned by the lifecycle manager.
#[derive(Debug)]
pub struct ConnectionState {
    pub phase: ReadyState,

    /// Live transport, if any
    pub transport: Option<TransportId>,

    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempts: u32,

    /// Whether the in-flight attempt is a reconnect
    pub reconnecting: bool,

    /// Set when the attempt cap was exceeded and retries stopped
    pub gave_up: bool,

    /// Sub-protocol negotiated by the current transport
    pub protocol: Option<String>,

    pub open_timeout: Option<TimerToken>,
    pub heartbeat: Option<TimerToken>,
    pub reconnect: Option<TimerToken>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: ReadyState::Connecting,
            transport: None,
            reconnect_attempts: 0,
            reconnecting: false,
            gave_up: false,
            protocol: None,
            open_timeout: None,
            heartbeat: None,
            reconnect: None,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the connection, published after every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub ready_state: ReadyState,
    pub reconnect_attempts: u32,
    pub protocol: Option<String>,
    pub queued_messages: usize,
    /// The reconnect cap was exceeded; no further attempts will be made
    /// until `open()` is called.
    pub gave_up: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            ready_state: ReadyState::Connecting,
            reconnect_attempts: 0,
            protocol: None,
            queued_messages: 0,
            gave_up: false,
        }
    }
}
