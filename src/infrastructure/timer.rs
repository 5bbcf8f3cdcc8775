use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Exponential reconnect backoff.
///
/// The delay before reconnect attempt `n` is
/// `min(max_interval, base_interval * decay^n)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_interval: Duration,
    decay: f64,
    max_interval: Duration,
}

impl Backoff {
    pub fn new(base_interval: Duration, decay: f64, max_interval: Duration) -> Self {
        Self {
            base_interval,
            decay,
            max_interval,
        }
    }

    /// Delay to wait before the attempt that follows `attempt` failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        let max_ms = self.max_interval.as_millis() as f64;
        let scaled = self.base_interval.as_millis() as f64 * self.decay.powf(f64::from(attempt));
        let capped = if scaled.is_finite() {
            scaled.min(max_ms)
        } else {
            max_ms
        };
        Duration::from_millis(capped.round() as u64)
    }
}

/// The three timers the lifecycle manager may have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    OpenTimeout,
    Heartbeat,
    Reconnect,
}

impl TimerKind {
    const ALL: [TimerKind; 3] = [Self::OpenTimeout, Self::Heartbeat, Self::Reconnect];

    fn index(self) -> usize {
        match self {
            Self::OpenTimeout => 0,
            Self::Heartbeat => 1,
            Self::Reconnect => 2,
        }
    }
}

/// Holds at most one pending task per [`TimerKind`].
///
/// Arming a slot aborts whatever was pending in it first. Dropping the
/// slots aborts everything.
#[derive(Debug, Default)]
pub struct TimerSlots {
    handles: [Option<JoinHandle<()>>; 3],
}

impl TimerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_fire` after `delay` unless cancelled first.
    pub fn arm<F>(&mut self, kind: TimerKind, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(kind);
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            on_fire.await;
        });
        self.handles[kind.index()] = Some(handle);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles[kind.index()].take() {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    #[cfg(test)]
    fn is_armed(&self, kind: TimerKind) -> bool {
        self.handles[kind.index()]
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimerSlots {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
