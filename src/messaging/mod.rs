pub mod dispatcher;
pub mod event;
pub mod router;

pub use dispatcher::{EventDispatcher, ListenerId};
pub use event::SocketEvent;
pub use router::MessageRouter;
