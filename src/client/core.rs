use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};

use super::driver::{Driver, DriverMessage};
use super::machine::{ConnectionMachine, Input};
use super::options::ClientOptions;
use super::state::{ReadyState, StatusSnapshot};
use crate::messaging::{EventDispatcher, ListenerId, SocketEvent};
use crate::types::{
    OutboundMessage, Result, SocketError, WS_CLOSE_APPLICATION_MAX, WS_CLOSE_APPLICATION_MIN,
    WS_CLOSE_NORMAL,
};
use crate::websocket::{Connector, TungsteniteConnector};

/// Longest close reason a close frame can carry, in bytes
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// A WebSocket connection that keeps itself alive.
///
/// `WebSocketClient` reconnects with exponential backoff whenever the
/// connection drops with a code outside the configured normal set, probes
/// the connection with a heartbeat while it is open, and queues messages
/// sent while disconnected until the next successful open.
///
/// Cloning is cheap and every clone controls the same connection. Dropping
/// the last clone closes the connection and stops all background work.
///
/// # Example
///
/// ```no_run
/// use resilient_ws::{ClientOptions, SocketEvent, WebSocketClient};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = WebSocketClient::new("wss://example.com/socket", ClientOptions::default())?;
///
/// client.on("chat", |event: &SocketEvent| {
///     println!("chat: {:?}", event.payload());
/// });
///
/// // Queued until the connection is open
/// client.send("chat", &json!({"text": "hello"}))?;
///
/// client.disconnect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocketClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    url: String,
    options: ClientOptions,
    tx: mpsc::UnboundedSender<DriverMessage>,
    status: watch::Receiver<StatusSnapshot>,
    dispatcher: Arc<EventDispatcher<SocketEvent>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let _ = self.tx.send(DriverMessage::Shutdown);
    }
}

impl WebSocketClient {
    /// Creates a client for `endpoint` using the tokio-tungstenite transport.
    ///
    /// With `automatic_open` set (the default) the first connection attempt
    /// starts right away; otherwise call [`open()`](Self::open).
    ///
    /// # Errors
    ///
    /// - [`SocketError::InvalidArgument`] if an option is out of range
    /// - [`SocketError::MalformedEndpoint`] if `endpoint` is not a
    ///   `scheme://host[:port][/path][?query]` URI
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(endpoint: impl AsRef<str>, options: ClientOptions) -> Result<Self> {
        Self::with_connector(endpoint, options, TungsteniteConnector)
    }

    /// Creates a client from a loose JSON object of options.
    ///
    /// Unknown keys are rejected before any connection attempt is made.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use resilient_ws::WebSocketClient;
    /// use serde_json::json;
    ///
    /// # async fn example() -> resilient_ws::Result<()> {
    /// let client = WebSocketClient::from_json(
    ///     "wss://example.com/socket",
    ///     json!({ "reconnectInterval": 500, "pingInterval": false }),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json(endpoint: impl AsRef<str>, options: serde_json::Value) -> Result<Self> {
        Self::new(endpoint, ClientOptions::from_json(options)?)
    }

    /// Creates a client that opens its transports through `connector`.
    pub fn with_connector<C>(
        endpoint: impl AsRef<str>,
        options: ClientOptions,
        connector: C,
    ) -> Result<Self>
    where
        C: Connector,
    {
        options.validate()?;
        let url = options.resolve_endpoint(endpoint.as_ref())?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        let dispatcher = Arc::new(EventDispatcher::new());

        let machine = ConnectionMachine::new(url.clone(), &options);
        Driver::new(
            machine,
            Arc::new(connector),
            Arc::clone(&dispatcher),
            tx.clone(),
            rx,
            status_tx,
        )
        .spawn();

        let client = Self {
            inner: Arc::new(ClientInner {
                url,
                options,
                tx,
                status: status_rx,
                dispatcher,
            }),
        };

        if client.inner.options.automatic_open {
            client.open()?;
        }
        Ok(client)
    }

    /// Starts a fresh connection attempt.
    ///
    /// Does nothing while the connection is open, closing, or an attempt is
    /// already in flight. Otherwise any pending reconnect is cancelled and
    /// the reconnect counter starts over.
    pub fn open(&self) -> Result<()> {
        self.submit(Input::Open)
    }

    /// Closes the connection with `code` and `reason`.
    ///
    /// Closing with a code in the normal set (by default only `1000`) ends
    /// in [`ReadyState::Closed`]; any other code goes through the reconnect
    /// path as if the server had closed with it. Without a live transport
    /// only a normal close has an effect, stopping a pending reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::InvalidArgument`] unless `code` is `1000` or in
    /// `3000..=4999`, or if `reason` is longer than 123 bytes.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
        if code != WS_CLOSE_NORMAL
            && !(WS_CLOSE_APPLICATION_MIN..=WS_CLOSE_APPLICATION_MAX).contains(&code)
        {
            return Err(SocketError::invalid_argument(format!(
                "close code {code} must be 1000 or in 3000..=4999"
            )));
        }
        let reason = reason.into();
        if reason.len() > MAX_CLOSE_REASON_BYTES {
            return Err(SocketError::invalid_argument(
                "close reason must not exceed 123 bytes",
            ));
        }
        self.submit(Input::Close { code, reason })
    }

    /// Closes the connection normally. Same as `close(1000, "")`.
    pub fn disconnect(&self) -> Result<()> {
        self.close(WS_CLOSE_NORMAL, "")
    }

    /// Sends a structured message `{type: message_type, payload: payload}`
    /// using the configured key names.
    ///
    /// While the connection is not open the message is queued and sent on
    /// the next successful open, unless it outlives the queue timeout.
    ///
    /// # Errors
    ///
    /// - [`SocketError::InvalidArgument`] if `message_type` is blank
    /// - [`SocketError::Serialization`] if `payload` cannot be serialized
    pub fn send<T>(&self, message_type: &str, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)?;
        self.send_raw(OutboundMessage::structured(message_type, payload)?)
    }

    /// Sends a structured message with an empty object payload.
    pub fn send_default(&self, message_type: &str) -> Result<()> {
        self.send(message_type, &json!({}))
    }

    /// Sends a frame as-is (text, binary, or a JSON value), queueing it
    /// while the connection is not open.
    pub fn send_raw(&self, message: impl Into<OutboundMessage>) -> Result<()> {
        self.submit(Input::Send(message.into()))
    }

    /// Registers `listener` for `event`.
    ///
    /// Lifecycle events are `connecting`, `open`, `message`, `error` and
    /// `close`. Any other name receives inbound structured messages of that
    /// type. Listeners run on the connection task and must not block.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on(event, listener)
    }

    /// Removes one listener, or every listener for `event` when `id` is `None`.
    pub fn off(&self, event: &str, id: Option<ListenerId>) {
        self.inner.dispatcher.off(event, id);
    }

    pub fn off_all(&self) {
        self.inner.dispatcher.clear();
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.status.borrow().ready_state
    }

    /// Sub-protocol negotiated by the current connection.
    pub fn protocol(&self) -> Option<String> {
        self.inner.status.borrow().protocol.clone()
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.status.borrow().reconnect_attempts
    }

    /// Messages waiting for the connection to open.
    pub fn queued_messages(&self) -> usize {
        self.inner.status.borrow().queued_messages
    }

    pub fn status(&self) -> StatusSnapshot {
        self.inner.status.borrow().clone()
    }

    /// Watch channel updated after every state change.
    pub fn state_receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.status.clone()
    }

    /// Waits until the connection reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ClientStopped`] if the connection task exits
    /// first.
    pub async fn wait_for_state(&self, state: ReadyState) -> Result<()> {
        let mut status = self.state_receiver();
        status
            .wait_for(|snapshot| snapshot.ready_state == state)
            .await
            .map_err(|_| SocketError::ClientStopped)?;
        Ok(())
    }

    /// Resolved endpoint, with path and query overrides applied.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    fn submit(&self, input: Input) -> Result<()> {
        self.inner
            .tx
            .send(DriverMessage::Input(input))
            .map_err(|_| SocketError::ClientStopped)
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("url", &self.inner.url)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}
