#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use resilient_ws::websocket::{
    ConnectRequest, Connector, TransportEvent, TransportHandle, TransportSink,
};
use resilient_ws::{
    CloseInfo, Payload, ReadyState, SocketEvent, TransportFailure, WebSocketClient,
};

/// Lets the driver task and any fired timers run to quiescence.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// Connector whose transports are scripted by the test.
#[derive(Clone, Default)]
pub struct MockConnector {
    transports: Arc<Mutex<Vec<MockTransport>>>,
}

impl MockConnector {
    /// Number of transports created so far.
    pub fn attempts(&self) -> usize {
        self.transports.lock().len()
    }

    pub fn transport(&self, index: usize) -> MockTransport {
        self.transports
            .lock()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no transport #{index} was created"))
    }
}

impl Connector for MockConnector {
    fn connect(&self, request: ConnectRequest, sink: TransportSink) -> Box<dyn TransportHandle> {
        let shared = Arc::new(Mutex::new(Shared {
            ready: ReadyState::Connecting,
            sent: Vec::new(),
            closes: Vec::new(),
        }));
        self.transports.lock().push(MockTransport {
            request,
            sink: sink.clone(),
            shared: Arc::clone(&shared),
        });
        Box::new(MockHandle { sink, shared })
    }
}

struct Shared {
    ready: ReadyState,
    sent: Vec<Payload>,
    closes: Vec<(u16, String)>,
}

/// Test-side view of one transport.
#[derive(Clone)]
pub struct MockTransport {
    request: ConnectRequest,
    sink: TransportSink,
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub fn request(&self) -> ConnectRequest {
        self.request.clone()
    }

    pub fn open(&self, protocol: Option<&str>) {
        self.shared.lock().ready = ReadyState::Open;
        self.sink.emit(TransportEvent::Opened {
            protocol: protocol.map(str::to_string),
        });
    }

    pub fn message(&self, text: &str) {
        self.sink
            .emit(TransportEvent::Message(Payload::Text(text.to_string())));
    }

    /// Hands accepted but unwritten frames back to the client.
    pub fn unsent(&self, frames: &[&str]) {
        self.sink.emit(TransportEvent::Unsent(
            frames
                .iter()
                .map(|frame| Payload::Text(frame.to_string()))
                .collect(),
        ));
    }

    /// Server-initiated close.
    pub fn closed(&self, code: u16, reason: &str) {
        self.shared.lock().ready = ReadyState::Closed;
        self.sink.emit(TransportEvent::Closed(CloseInfo::new(
            code,
            reason,
            code != 1006,
        )));
    }

    /// Connection failure, reported the way a real transport does.
    pub fn fail(&self, message: &str) {
        self.shared.lock().ready = ReadyState::Closed;
        self.sink
            .emit(TransportEvent::Error(TransportFailure::new(message)));
        self.sink
            .emit(TransportEvent::Closed(CloseInfo::new(1006, "", false)));
    }

    /// Frames the client handed to this transport.
    pub fn sent(&self) -> Vec<Payload> {
        self.shared.lock().sent.clone()
    }

    /// Close requests the client made on this transport.
    pub fn closes(&self) -> Vec<(u16, String)> {
        self.shared.lock().closes.clone()
    }
}

struct MockHandle {
    sink: TransportSink,
    shared: Arc<Mutex<Shared>>,
}

impl TransportHandle for MockHandle {
    fn send(&mut self, payload: Payload) -> Result<(), Payload> {
        let mut shared = self.shared.lock();
        if shared.ready != ReadyState::Open {
            return Err(payload);
        }
        shared.sent.push(payload);
        Ok(())
    }

    /// Records the request and acknowledges it immediately.
    fn close(&mut self, code: u16, reason: &str) {
        let already_closed = {
            let mut shared = self.shared.lock();
            shared.closes.push((code, reason.to_string()));
            std::mem::replace(&mut shared.ready, ReadyState::Closed) == ReadyState::Closed
        };
        if !already_closed {
            self.sink.emit(TransportEvent::Closed(CloseInfo::new(
                code,
                reason,
                code != 1006,
            )));
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.lock().ready
    }
}

/// Collects every event a client emits.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<SocketEvent>>>,
}

impl Recorder {
    /// Listens to all lifecycle events plus the given structured types.
    pub fn attach(client: &WebSocketClient, types: &[&str]) -> Self {
        let recorder = Self::default();
        let lifecycle = ["connecting", "open", "message", "error", "close"];
        for name in lifecycle.iter().chain(types) {
            let events = Arc::clone(&recorder.events);
            client.on(name, move |event: &SocketEvent| {
                events.lock().push(event.clone());
            });
        }
        recorder
    }

    pub fn events(&self) -> Vec<SocketEvent> {
        self.events.lock().clone()
    }
}
