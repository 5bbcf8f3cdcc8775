//! # resilient-ws
//!
//! A WebSocket client that survives network interruptions: it reconnects
//! with exponential backoff, keeps the connection alive with a heartbeat,
//! and queues messages sent while disconnected until the next open.
//!
//! ## Example
//!
//! ```no_run
//! use resilient_ws::{ClientOptions, SocketEvent, WebSocketClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebSocketClient::new(
//!         "wss://example.com/socket",
//!         ClientOptions::builder()
//!             .max_reconnect_attempts(10)
//!             .build()?,
//!     )?;
//!
//!     client.on("open", |event: &SocketEvent| println!("{event}"));
//!     client.on("chat", |event: &SocketEvent| println!("{:?}", event.payload()));
//!
//!     client.send("chat", &json!({"text": "hi"}))?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoint;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use client::{
    BinaryType, ClientOptions, ClientOptionsBuilder, ReadyState, StatusSnapshot, WebSocketClient,
};
pub use endpoint::Endpoint;
pub use messaging::{ListenerId, SocketEvent};
pub use types::{CloseInfo, OutboundMessage, Payload, Result, SocketError, TransportFailure};
pub use websocket::{Connector, TransportHandle, TungsteniteConnector};
