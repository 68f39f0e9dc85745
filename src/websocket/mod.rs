//! Bidirectional WebSocket transport.
//!
//! The client opens the connection and must send
//! `{"type":"hello","last_seq":<n>}` within the handshake timeout; a
//! missing, late, or malformed hello closes the connection with code
//! 1008 and no backlog is ever sent. After the hello the server streams
//! backlog and live items as `{"type":"notification","data":...}`
//! frames; further inbound frames are ignored until the client
//! disconnects.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{ClientMessage, ServerMessage};
