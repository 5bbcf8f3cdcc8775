//! Connection lifecycle as a pure transition function.
//!
//! [`ConnectionMachine::handle`] consumes one [`Input`] at a time and returns
//! the [`Effect`]s the driver has to carry out. It never touches a socket,
//! spawns a task or reads the clock itself.

use std::time::Duration;

use tokio::time::Instant;

use super::options::ClientOptions;
use super::state::{ConnectionState, ReadyState, StatusSnapshot, TimerToken};
use crate::infrastructure::{Backoff, HeartbeatMonitor, OutboundQueue, TimerKind};
use crate::messaging::{MessageRouter, SocketEvent};
use crate::types::{CloseInfo, MessageKeys, OutboundMessage, Payload, WS_CLOSE_ABNORMAL};
use crate::websocket::{ConnectRequest, TransportEvent, TransportId};

/// Everything that can change the connection state.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Open,
    Close { code: u16, reason: String },
    Send(OutboundMessage),
    Transport {
        id: TransportId,
        event: TransportEvent,
    },
    /// A frame the transport refused to accept
    Undelivered { id: TransportId, payload: Payload },
    TimerFired { kind: TimerKind, token: TimerToken },
}

/// Instructions for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect {
        id: TransportId,
        request: ConnectRequest,
    },
    Transmit {
        id: TransportId,
        payload: Payload,
    },
    CloseTransport {
        id: TransportId,
        code: u16,
        reason: String,
    },
    /// Drop the handle; its transport already reported `Closed`
    Release { id: TransportId },
    ArmTimer {
        kind: TimerKind,
        token: TimerToken,
        delay: Duration,
    },
    CancelTimer(TimerKind),
    Emit(SocketEvent),
}

pub struct ConnectionMachine {
    state: ConnectionState,
    queue: OutboundQueue,
    backoff: Backoff,
    heartbeat: HeartbeatMonitor,
    router: MessageRouter,
    keys: MessageKeys,
    options: ClientOptions,
    request: ConnectRequest,
    next_transport: u64,
    next_token: u64,
}

impl ConnectionMachine {
    pub fn new(url: String, options: &ClientOptions) -> Self {
        let keys = options.message_keys();
        Self {
            state: ConnectionState::new(),
            queue: OutboundQueue::new(options.message_queue_timeout),
            backoff: Backoff::new(
                options.reconnect_interval(),
                options.reconnect_decay,
                options.max_reconnect_interval(),
            ),
            heartbeat: HeartbeatMonitor::new(options.ping_interval(), options.ping_data.clone()),
            router: MessageRouter::new(keys.clone(), options.binary_type),
            keys,
            options: options.clone(),
            request: ConnectRequest {
                url,
                protocols: options.protocols.clone(),
            },
            next_transport: 0,
            next_token: 0,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            ready_state: self.state.phase,
            reconnect_attempts: self.state.reconnect_attempts,
            protocol: self.state.protocol.clone(),
            queued_messages: self.queue.len(),
            gave_up: self.state.gave_up,
        }
    }

    /// Applies one input and returns the resulting effects in execution order.
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            Input::Open => self.open(&mut effects),
            Input::Close { code, reason } => self.close(code, reason, &mut effects),
            Input::Send(message) => self.send(message, now, &mut effects),
            Input::Transport { id, event } => self.transport_event(id, event, now, &mut effects),
            Input::Undelivered { id, payload } => {
                tracing::warn!("Transport {:?} refused a frame, re-queueing it", id);
                self.queue.push(OutboundMessage::from(payload), now);
            }
            Input::TimerFired { kind, token } => self.timer_fired(kind, token, &mut effects),
        }
        effects
    }

    fn open(&mut self, effects: &mut Vec<Effect>) {
        match self.state.phase {
            ReadyState::Open | ReadyState::Closing => {
                tracing::debug!("open() ignored while {:?}", self.state.phase);
                return;
            }
            _ if self.state.transport.is_some() => {
                tracing::debug!("open() ignored, an attempt is already in flight");
                return;
            }
            _ => {}
        }

        self.cancel_reconnect(effects);
        self.state.reconnect_attempts = 0;
        self.state.gave_up = false;
        self.state.phase = ReadyState::Connecting;
        effects.push(Effect::Emit(SocketEvent::Connecting(None)));
        self.start_attempt(false, effects);
    }

    fn close(&mut self, code: u16, reason: String, effects: &mut Vec<Effect>) {
        match self.state.phase {
            ReadyState::Closed | ReadyState::Closing => {
                tracing::debug!("close() ignored while {:?}", self.state.phase);
            }
            _ => match self.state.transport {
                Some(id) => {
                    tracing::info!("Closing connection with code {}", code);
                    self.state.phase = ReadyState::Closing;
                    self.cancel_open_timeout(effects);
                    self.cancel_heartbeat(effects);
                    effects.push(Effect::CloseTransport { id, code, reason });
                }
                // nothing to hand the close to: only a normal close has an
                // effect, ending a pending backoff
                None if self.options.is_normal_close(code) => {
                    self.cancel_reconnect(effects);
                    self.connection_closed(CloseInfo::new(code, reason, true), effects);
                }
                None => {
                    tracing::debug!("close({}) ignored, no transport to close", code);
                }
            },
        }
    }

    fn send(&mut self, message: OutboundMessage, now: Instant, effects: &mut Vec<Effect>) {
        match self.state.transport {
            Some(id) if self.state.phase == ReadyState::Open => {
                effects.push(Effect::Transmit {
                    id,
                    payload: message.encode(&self.keys),
                });
            }
            _ => {
                self.queue.push(message, now);
                tracing::debug!("Connection not open, queued message ({} pending)", self.queue.len());
            }
        }
    }

    fn transport_event(
        &mut self,
        id: TransportId,
        event: TransportEvent,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if self.state.transport != Some(id) {
            tracing::debug!("Ignoring event from stale transport {:?}", id);
            return;
        }

        match event {
            TransportEvent::Opened { protocol } => self.transport_opened(id, protocol, now, effects),
            TransportEvent::Message(payload) => {
                tracing::debug!("Received {} byte frame", payload.len());
                effects.extend(self.router.route(payload).into_iter().map(Effect::Emit));
            }
            TransportEvent::Unsent(payloads) => {
                tracing::warn!(
                    "Transport {:?} returned {} unsent frames, re-queueing them",
                    id,
                    payloads.len()
                );
                self.queue
                    .requeue(payloads.into_iter().map(OutboundMessage::from), now);
            }
            TransportEvent::Error(failure) => {
                tracing::error!("Transport error: {}", failure);
                effects.push(Effect::Emit(SocketEvent::Error(failure)));
            }
            TransportEvent::Closed(info) => {
                tracing::info!(
                    "Transport closed (code {}, reason {:?}, clean: {})",
                    info.code,
                    info.reason,
                    info.was_clean
                );
                self.connection_closed(info, effects);
            }
        }
    }

    fn transport_opened(
        &mut self,
        id: TransportId,
        protocol: Option<String>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if self.state.phase != ReadyState::Connecting {
            tracing::debug!("Ignoring open while {:?}", self.state.phase);
            return;
        }

        self.cancel_open_timeout(effects);
        let reconnect_attempt = self.state.reconnecting;
        self.state.phase = ReadyState::Open;
        self.state.reconnect_attempts = 0;
        self.state.reconnecting = false;
        self.state.gave_up = false;
        self.state.protocol = protocol.clone();
        tracing::info!("Connected to {}", self.request.url);
        effects.push(Effect::Emit(SocketEvent::Open {
            protocol,
            reconnect_attempt,
        }));

        if let Some(delay) = self.heartbeat.start() {
            let token = self.next_token();
            self.state.heartbeat = Some(token);
            effects.push(Effect::ArmTimer {
                kind: TimerKind::Heartbeat,
                token,
                delay,
            });
        }

        let drained = self.queue.drain(now);
        if drained.expired > 0 {
            tracing::warn!("Dropped {} expired queued messages", drained.expired);
        }
        if !drained.ready.is_empty() {
            tracing::debug!("Flushing {} queued messages", drained.ready.len());
        }
        for message in drained.ready {
            effects.push(Effect::Transmit {
                id,
                payload: message.encode(&self.keys),
            });
        }
    }

    fn connection_closed(&mut self, info: CloseInfo, effects: &mut Vec<Effect>) {
        self.cancel_open_timeout(effects);
        self.cancel_heartbeat(effects);
        if let Some(id) = self.state.transport.take() {
            effects.push(Effect::Release { id });
        }
        self.state.protocol = None;
        self.state.reconnecting = false;

        if self.options.is_normal_close(info.code) {
            self.state.phase = ReadyState::Closed;
            self.cancel_reconnect(effects);
            tracing::info!("Connection closed");
            effects.push(Effect::Emit(SocketEvent::Close(info)));
        } else {
            self.state.phase = ReadyState::Connecting;
            effects.push(Effect::Emit(SocketEvent::Connecting(Some(info))));
            self.schedule_reconnect(effects);
        }
    }

    fn schedule_reconnect(&mut self, effects: &mut Vec<Effect>) {
        let attempts = self.state.reconnect_attempts;
        if self.options.max_reconnect_attempts.is_some_and(|max| attempts >= max) {
            self.state.gave_up = true;
            tracing::warn!(
                "Giving up after {} reconnect attempts, call open() to try again",
                attempts
            );
            return;
        }

        let delay = self.backoff.delay(attempts);
        let token = self.next_token();
        self.state.reconnect = Some(token);
        tracing::info!("Reconnecting in {:?} (attempt {})", delay, attempts + 1);
        effects.push(Effect::ArmTimer {
            kind: TimerKind::Reconnect,
            token,
            delay,
        });
    }

    fn timer_fired(&mut self, kind: TimerKind, token: TimerToken, effects: &mut Vec<Effect>) {
        let slot = match kind {
            TimerKind::OpenTimeout => &mut self.state.open_timeout,
            TimerKind::Heartbeat => &mut self.state.heartbeat,
            TimerKind::Reconnect => &mut self.state.reconnect,
        };
        if *slot != Some(token) {
            tracing::debug!("Ignoring stale {:?} timer", kind);
            return;
        }
        *slot = None;

        match kind {
            TimerKind::OpenTimeout => {
                if let (ReadyState::Connecting, Some(id)) = (self.state.phase, self.state.transport) {
                    tracing::warn!("Open timed out after {:?}", self.options.open_timeout());
                    effects.push(Effect::CloseTransport {
                        id,
                        code: WS_CLOSE_ABNORMAL,
                        reason: "open timeout".to_string(),
                    });
                }
            }
            TimerKind::Heartbeat => {
                let open = self.state.phase == ReadyState::Open;
                if let (Some((probe, delay)), Some(id)) =
                    (self.heartbeat.tick(open), self.state.transport)
                {
                    effects.push(Effect::Transmit {
                        id,
                        payload: probe.encode(&self.keys),
                    });
                    let token = self.next_token();
                    self.state.heartbeat = Some(token);
                    effects.push(Effect::ArmTimer {
                        kind: TimerKind::Heartbeat,
                        token,
                        delay,
                    });
                }
            }
            TimerKind::Reconnect => {
                if self.state.phase != ReadyState::Connecting || self.state.transport.is_some() {
                    return;
                }
                self.state.reconnect_attempts += 1;
                self.start_attempt(true, effects);
            }
        }
    }

    fn start_attempt(&mut self, reconnecting: bool, effects: &mut Vec<Effect>) {
        let id = TransportId(self.next_transport);
        self.next_transport += 1;
        self.state.transport = Some(id);
        self.state.reconnecting = reconnecting;
        self.state.phase = ReadyState::Connecting;
        tracing::info!("Connecting to {} ({:?})", self.request.url, id);

        effects.push(Effect::Connect {
            id,
            request: self.request.clone(),
        });
        let token = self.next_token();
        self.state.open_timeout = Some(token);
        effects.push(Effect::ArmTimer {
            kind: TimerKind::OpenTimeout,
            token,
            delay: self.options.open_timeout(),
        });
    }

    fn cancel_open_timeout(&mut self, effects: &mut Vec<Effect>) {
        if self.state.open_timeout.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::OpenTimeout));
        }
    }

    fn cancel_heartbeat(&mut self, effects: &mut Vec<Effect>) {
        if self.state.heartbeat.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::Heartbeat));
        }
    }

    fn cancel_reconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.state.reconnect.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::Reconnect));
        }
    }

    fn next_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }
}
