use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::OutboundMessage;

#[derive(Debug, Clone)]
struct QueuedMessage {
    enqueued_at: Instant,
    message: OutboundMessage,
}

/// Result of draining the queue.
#[derive(Debug, Default)]
pub struct Drained {
    /// Messages still within their time-to-live, oldest first
    pub ready: Vec<OutboundMessage>,
    /// Number of messages discarded because they outlived the TTL
    pub expired: usize,
}

/// FIFO of messages sent while the connection was not open.
///
/// Each entry's age is checked on its own at drain time, so an expired
/// entry never blocks fresher entries behind it.
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedMessage>,
    ttl: Option<Duration>,
}

impl OutboundQueue {
    /// `ttl_ms <= 0` disables expiry.
    pub fn new(ttl_ms: i64) -> Self {
        let ttl = u64::try_from(ttl_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        Self {
            entries: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, message: OutboundMessage, now: Instant) {
        self.entries.push_back(QueuedMessage {
            enqueued_at: now,
            message,
        });
    }

    /// Puts frames a transport accepted but never wrote back at the head of
    /// the queue, keeping their relative order.
    pub fn requeue<I>(&mut self, messages: I, now: Instant)
    where
        I: IntoIterator<Item = OutboundMessage>,
        I::IntoIter: DoubleEndedIterator,
    {
        for message in messages.into_iter().rev() {
            self.entries.push_front(QueuedMessage {
                enqueued_at: now,
                message,
            });
        }
    }

    /// Empties the queue in one pass, keeping entries with
    /// `now - enqueued_at <= ttl`.
    pub fn drain(&mut self, now: Instant) -> Drained {
        let mut drained = Drained::default();
        for entry in self.entries.drain(..) {
            let fresh = match self.ttl {
                None => true,
                Some(ttl) => now.saturating_duration_since(entry.enqueued_at) <= ttl,
            };
            if fresh {
                drained.ready.push(entry.message);
            } else {
                drained.expired += 1;
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
