//! Websocket transport: frame vocabulary, connection hub, per-connection
//! actor.

pub mod hub;
pub mod protocol;
pub mod session;

pub use hub::WsHub;
pub use protocol::{ClientMsg, ErrorCode, ServerMsg, PROTOCOL_VERSION};
