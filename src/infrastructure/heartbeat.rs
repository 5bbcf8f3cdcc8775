use std::time::Duration;

use crate::types::OutboundMessage;

/// Keep-alive probe schedule.
///
/// Probe-only: a probe is sent every `interval` while the connection is
/// open, and dead connections are detected through the transport's own
/// error/close signalling after a failed write, not through a reply timeout.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Option<Duration>,
    probe: String,
}

impl HeartbeatMonitor {
    /// `interval = None` disables the heartbeat entirely.
    pub fn new(interval: Option<Duration>, probe: impl Into<String>) -> Self {
        Self {
            interval,
            probe: probe.into(),
        }
    }

    /// Delay until the first probe after the connection opens.
    pub fn start(&self) -> Option<Duration> {
        self.interval
    }

    /// Handles a tick. Returns the probe to send and the delay until the next
    /// tick, or `None` when the connection is no longer open and the monitor
    /// should stay stopped.
    pub fn tick(&self, connection_open: bool) -> Option<(OutboundMessage, Duration)> {
        let interval = self.interval?;
        if !connection_open {
            return None;
        }
        tracing::debug!("Sending heartbeat probe");
        Some((OutboundMessage::Text(self.probe.clone()), interval))
    }
}
