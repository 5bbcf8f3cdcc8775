// Module declarations
mod core;
mod driver;
pub mod machine;
mod options;
mod state;

// Public API exports
pub use self::core::WebSocketClient;
pub use machine::{ConnectionMachine, Effect, Input};
pub use options::{BinaryType, ClientOptions, ClientOptionsBuilder};
pub use state::{ConnectionState, ReadyState, StatusSnapshot, TimerToken};
