pub mod constants;
pub mod error;
pub mod message;

pub use constants::*;
pub use error::{Result, SocketError};
pub use message::{CloseInfo, MessageKeys, OutboundMessage, Payload, TransportFailure};
