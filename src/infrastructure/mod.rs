// Infrastructure module - timers, keep-alive and buffering used by the lifecycle manager
pub mod heartbeat;
pub mod queue;
pub mod timer;

pub use heartbeat::HeartbeatMonitor;
pub use queue::{Drained, OutboundQueue};
pub use timer::{Backoff, TimerKind, TimerSlots};
