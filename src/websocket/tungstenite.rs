//! `tokio-tungstenite` transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::SendError};
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use super::{ConnectRequest, Connector, TransportEvent, TransportHandle, TransportSink};
use crate::client::ReadyState;
use crate::types::constants::{
    WS_CLOSE_ABNORMAL, WS_CLOSE_APPLICATION_MAX, WS_CLOSE_APPLICATION_MIN, WS_CLOSE_NORMAL,
    WS_CLOSE_NO_STATUS,
};
use crate::types::{CloseInfo, Payload, Result, TransportFailure};

/// How long to wait for the peer to answer our close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects with `tokio-tungstenite`, one spawned task per transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, request: ConnectRequest, sink: TransportSink) -> Box<dyn TransportHandle> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let ready = Arc::new(SharedReadyState::new());

        tokio::spawn(run_transport(request, sink, commands_rx, Arc::clone(&ready)));

        Box::new(TungsteniteHandle {
            commands: commands_tx,
            ready,
        })
    }
}

#[derive(Debug)]
enum TransportCommand {
    Send(Payload),
    Close { code: u16, reason: String },
}

struct TungsteniteHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
    ready: Arc<SharedReadyState>,
}

impl TransportHandle for TungsteniteHandle {
    fn send(&mut self, payload: Payload) -> std::result::Result<(), Payload> {
        if self.ready.load() != ReadyState::Open {
            return Err(payload);
        }
        match self.commands.send(TransportCommand::Send(payload)) {
            Ok(()) => Ok(()),
            Err(SendError(TransportCommand::Send(payload))) => Err(payload),
            Err(SendError(TransportCommand::Close { .. })) => Ok(()),
        }
    }

    fn close(&mut self, code: u16, reason: &str) {
        if self
            .commands
            .send(TransportCommand::Close {
                code,
                reason: reason.to_string(),
            })
            .is_err()
        {
            tracing::debug!("Transport task already finished, ignoring close request");
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.ready.load()
    }
}

struct SharedReadyState(AtomicU8);

impl SharedReadyState {
    fn new() -> Self {
        Self(AtomicU8::new(Self::encode(ReadyState::Connecting)))
    }

    fn encode(state: ReadyState) -> u8 {
        match state {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closing => 2,
            ReadyState::Closed => 3,
        }
    }

    fn store(&self, state: ReadyState) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn load(&self) -> ReadyState {
        match self.0.load(Ordering::Acquire) {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

fn build_request(request: &ConnectRequest) -> Result<Request> {
    let mut client_request = request.url.as_str().into_client_request()?;
    if !request.protocols.is_empty() {
        let value = HeaderValue::from_str(&request.protocols.join(", ")).map_err(|e| {
            crate::types::SocketError::invalid_argument(format!("invalid sub-protocol list: {e}"))
        })?;
        client_request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, value);
    }
    Ok(client_request)
}

/// Codes a close frame may carry on the wire.
fn is_sendable_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014)
        || (WS_CLOSE_APPLICATION_MIN..=WS_CLOSE_APPLICATION_MAX).contains(&code)
}

fn close_message(code: u16, reason: &str) -> Message {
    if is_sendable_close_code(code) {
        Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        }))
    } else {
        Message::Close(None)
    }
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::text(text),
        Payload::Binary(data) => Message::binary(data),
    }
}

fn fail(sink: &TransportSink, ready: &SharedReadyState, message: String) {
    tracing::error!("WebSocket transport failed: {}", message);
    ready.store(ReadyState::Closed);
    sink.emit(TransportEvent::Error(TransportFailure::new(message)));
    sink.emit(TransportEvent::Closed(CloseInfo::new(
        WS_CLOSE_ABNORMAL,
        "",
        false,
    )));
}

async fn run_transport(
    request: ConnectRequest,
    sink: TransportSink,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    ready: Arc<SharedReadyState>,
) {
    let client_request = match build_request(&request) {
        Ok(client_request) => client_request,
        Err(e) => {
            fail(&sink, &ready, e.to_string());
            return;
        }
    };

    tracing::debug!("Opening WebSocket transport {:?} to {}", sink.id(), request.url);
    let connect = connect_async(client_request);
    tokio::pin!(connect);
    let mut early = Vec::new();

    let (stream, response) = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(connected) => break connected,
                Err(e) => {
                    return_unsent(&sink, early, &mut commands);
                    fail(&sink, &ready, e.to_string());
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(TransportCommand::Send(payload)) => {
                    tracing::warn!("Frame submitted before the transport opened, returning it");
                    early.push(payload);
                }
                Some(TransportCommand::Close { code, reason }) => {
                    tracing::debug!("Transport closed before the handshake completed");
                    ready.store(ReadyState::Closed);
                    return_unsent(&sink, early, &mut commands);
                    sink.emit(TransportEvent::Closed(CloseInfo::new(code, reason, false)));
                    return;
                }
                None => {
                    ready.store(ReadyState::Closed);
                    return_unsent(&sink, early, &mut commands);
                    sink.emit(TransportEvent::Closed(CloseInfo::new(
                        WS_CLOSE_ABNORMAL,
                        "",
                        false,
                    )));
                    return;
                }
            },
        }
    };

    if !early.is_empty() {
        sink.emit(TransportEvent::Unsent(early));
    }

    let protocol = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ready.store(ReadyState::Open);
    sink.emit(TransportEvent::Opened { protocol });

    let (mut write, mut read) = stream.split();
    let mut commands_open = true;
    let mut requested: Option<(u16, String)> = None;
    let mut close_deadline: Option<Instant> = None;
    let mut received: Option<CloseInfo> = None;

    let close_info = loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(TransportEvent::Message(Payload::Text(text.as_str().to_string())));
                }
                Some(Ok(Message::Binary(data))) => {
                    sink.emit(TransportEvent::Message(Payload::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Peer sent close frame: {:?}", frame);
                    ready.store(ReadyState::Closing);
                    received = Some(match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.as_str().to_string(), true),
                        None => CloseInfo::new(WS_CLOSE_NO_STATUS, "", true),
                    });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    if received.is_none() && requested.is_none() {
                        sink.emit(TransportEvent::Error(TransportFailure::new(e.to_string())));
                        break CloseInfo::new(WS_CLOSE_ABNORMAL, "", false);
                    }
                    tracing::debug!("Read error during close handshake: {}", e);
                    break closing_info(requested.take(), received.take());
                }
                None => break closing_info(requested.take(), received.take()),
            },
            command = commands.recv(), if commands_open => match command {
                Some(TransportCommand::Send(payload)) => {
                    if let Err(e) = write.send(to_message(payload)).await {
                        sink.emit(TransportEvent::Error(TransportFailure::new(e.to_string())));
                        break CloseInfo::new(WS_CLOSE_ABNORMAL, "", false);
                    }
                }
                Some(TransportCommand::Close { code, reason }) => {
                    start_close(&mut write, &ready, code, &reason).await;
                    requested = Some((code, reason));
                    close_deadline = Some(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                }
                None => {
                    commands_open = false;
                    if requested.is_none() {
                        start_close(&mut write, &ready, WS_CLOSE_NORMAL, "").await;
                        requested = Some((WS_CLOSE_NORMAL, String::new()));
                        close_deadline = Some(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                    }
                }
            },
            () = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                tracing::warn!("Close handshake timed out");
                let (code, reason) = requested.take().unwrap_or((WS_CLOSE_ABNORMAL, String::new()));
                break CloseInfo::new(code, reason, false);
            }
        }
    };

    ready.store(ReadyState::Closed);
    return_unsent(&sink, Vec::new(), &mut commands);
    sink.emit(TransportEvent::Closed(close_info));
}

/// Hands every frame still waiting in `commands` back to the owner, after
/// the `pending` ones. Later sends are refused once the receiver is closed.
fn return_unsent(
    sink: &TransportSink,
    mut pending: Vec<Payload>,
    commands: &mut mpsc::UnboundedReceiver<TransportCommand>,
) {
    commands.close();
    while let Ok(command) = commands.try_recv() {
        if let TransportCommand::Send(payload) = command {
            pending.push(payload);
        }
    }
    if !pending.is_empty() {
        tracing::debug!("Returning {} unsent frames", pending.len());
        sink.emit(TransportEvent::Unsent(pending));
    }
}

async fn start_close<S>(write: &mut S, ready: &SharedReadyState, code: u16, reason: &str)
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    ready.store(ReadyState::Closing);
    if let Err(e) = write.send(close_message(code, reason)).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}

/// A close we asked for is reported with our code; otherwise the peer's.
fn closing_info(requested: Option<(u16, String)>, received: Option<CloseInfo>) -> CloseInfo {
    match (requested, received) {
        (Some((code, reason)), _) => CloseInfo::new(code, reason, true),
        (None, Some(received)) => received,
        (None, None) => CloseInfo::new(WS_CLOSE_ABNORMAL, "", false),
    }
}
