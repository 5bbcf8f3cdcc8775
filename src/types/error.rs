use thiserror::Error;

/// Errors returned by the resilient WebSocket client.
///
/// Transport failures are not part of this type's normal flow: they are
/// reported through the `error` event and drive reconnection through the
/// subsequent close notification.
#[derive(Error, Debug)]
pub enum SocketError {
    /// Bad configuration key or value, empty message type, invalid close code
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Endpoint does not match `scheme://host[:port][/path][?query][#fragment]`
    #[error("Malformed endpoint: {0}")]
    MalformedEndpoint(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket protocol error raised by the tungstenite transport
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection task is no longer running
    #[error("Client stopped")]
    ClientStopped,
}

impl SocketError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Convenience type alias for `Result<T, SocketError>`.
pub type Result<T> = std::result::Result<T, SocketError>;
