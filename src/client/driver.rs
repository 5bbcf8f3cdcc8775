use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::machine::{ConnectionMachine, Effect, Input};
use super::state::StatusSnapshot;
use crate::infrastructure::TimerSlots;
use crate::messaging::{EventDispatcher, SocketEvent};
use crate::types::{Payload, WS_CLOSE_NORMAL};
use crate::websocket::{Connector, TransportHandle, TransportId, TransportSink};

/// Messages processed by the driver task.
#[derive(Debug)]
pub(crate) enum DriverMessage {
    Input(Input),
    /// The last client handle was dropped
    Shutdown,
}

/// Actor that owns the state machine, the live transport and the timers.
///
/// Every input is applied to completion before the next one is received,
/// so nothing here needs a lock.
pub(crate) struct Driver {
    machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    transport: Option<(TransportId, Box<dyn TransportHandle>)>,
    timers: TimerSlots,
    dispatcher: Arc<EventDispatcher<SocketEvent>>,
    tx: mpsc::UnboundedSender<DriverMessage>,
    rx: mpsc::UnboundedReceiver<DriverMessage>,
    status: watch::Sender<StatusSnapshot>,
}

impl Driver {
    pub(crate) fn new(
        machine: ConnectionMachine,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<EventDispatcher<SocketEvent>>,
        tx: mpsc::UnboundedSender<DriverMessage>,
        rx: mpsc::UnboundedReceiver<DriverMessage>,
        status: watch::Sender<StatusSnapshot>,
    ) -> Self {
        Self {
            machine,
            connector,
            transport: None,
            timers: TimerSlots::new(),
            dispatcher,
            tx,
            rx,
            status,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                DriverMessage::Input(input) => self.apply(input),
                DriverMessage::Shutdown => break,
            }
        }
        self.shutdown();
    }

    fn apply(&mut self, input: Input) {
        let effects = self.machine.handle(input, Instant::now());
        // Publish first so listeners observe the state they are notified about
        self.status.send_replace(self.machine.snapshot());
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { id, request } => {
                let tx = self.tx.clone();
                let sink = TransportSink::new(id, move |id, event| {
                    let _ = tx.send(DriverMessage::Input(Input::Transport { id, event }));
                });
                let handle = self.connector.connect(request, sink);
                if let Some((previous, mut handle)) = self.transport.replace((id, handle)) {
                    tracing::warn!("Replacing live transport {:?}", previous);
                    handle.close(WS_CLOSE_NORMAL, "superseded");
                }
            }
            Effect::Transmit { id, payload } => {
                let refused = match self.transport.as_mut() {
                    Some((current, handle)) if *current == id => handle.send(payload).err(),
                    _ => Some(payload),
                };
                if let Some(payload) = refused {
                    self.requeue(id, payload);
                }
            }
            Effect::CloseTransport { id, code, reason } => match self.transport.as_mut() {
                Some((current, handle)) if *current == id => handle.close(code, &reason),
                _ => tracing::debug!("Close requested for released transport {:?}", id),
            },
            Effect::Release { id } => {
                if self.transport.as_ref().is_some_and(|(current, _)| *current == id) {
                    self.transport = None;
                }
            }
            Effect::ArmTimer { kind, token, delay } => {
                let tx = self.tx.clone();
                tracing::debug!("Arming {:?} timer for {:?}", kind, delay);
                self.timers.arm(kind, delay, async move {
                    let _ = tx.send(DriverMessage::Input(Input::TimerFired { kind, token }));
                });
            }
            Effect::CancelTimer(kind) => self.timers.cancel(kind),
            Effect::Emit(event) => {
                self.dispatcher.emit(event.name(), &event);
            }
        }
    }

    /// Feeds a refused frame back in as a new input, after the current one.
    fn requeue(&self, id: TransportId, payload: Payload) {
        let _ = self
            .tx
            .send(DriverMessage::Input(Input::Undelivered { id, payload }));
    }

    fn shutdown(&mut self) {
        tracing::info!("Client dropped, shutting down connection");
        self.timers.cancel_all();
        if let Some((_, mut handle)) = self.transport.take() {
            handle.close(WS_CLOSE_NORMAL, "client dropped");
        }
    }
}
