//! Transport seam.
//!
//! The lifecycle manager never talks to a socket directly. It asks a
//! [`Connector`] for a new [`TransportHandle`] on every attempt and receives
//! that transport's notifications through the [`TransportSink`] it handed
//! over, tagged with the id of the attempt that produced them.

pub mod tungstenite;

use std::fmt;
use std::sync::Arc;

use crate::client::ReadyState;
use crate::types::{CloseInfo, Payload, TransportFailure};

pub use self::tungstenite::TungsteniteConnector;

/// Identifies one transport instance (one open attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(pub u64);

/// What a transport needs to start connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub protocols: Vec<String>,
}

/// Notifications a transport reports, each exactly once per occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened { protocol: Option<String> },
    Message(Payload),
    Error(TransportFailure),
    /// Frames accepted by `send` that were never written, oldest first.
    /// Reported just before `Closed`.
    Unsent(Vec<Payload>),
    /// Always the last notification of a transport
    Closed(CloseInfo),
}

type Deliver = Arc<dyn Fn(TransportId, TransportEvent) + Send + Sync + 'static>;

/// Where a transport reports its notifications.
#[derive(Clone)]
pub struct TransportSink {
    id: TransportId,
    deliver: Deliver,
}

impl TransportSink {
    pub fn new<F>(id: TransportId, deliver: F) -> Self
    where
        F: Fn(TransportId, TransportEvent) + Send + Sync + 'static,
    {
        Self {
            id,
            deliver: Arc::new(deliver),
        }
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.deliver)(self.id, event);
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink").field("id", &self.id).finish()
    }
}

/// A live transport owned by the lifecycle manager.
///
/// Calls must not block: implementations hand work to their own task.
pub trait TransportHandle: Send {
    /// Queues a frame for sending. A frame the transport cannot accept is
    /// handed back so that it can be re-queued.
    fn send(&mut self, payload: Payload) -> Result<(), Payload>;

    /// Requests the transport to close. The transport answers with a
    /// `Closed` notification.
    fn close(&mut self, code: u16, reason: &str);

    fn ready_state(&self) -> ReadyState;
}

/// Creates transports.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, request: ConnectRequest, sink: TransportSink) -> Box<dyn TransportHandle>;
}
