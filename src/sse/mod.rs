//! One-directional push transport over Server-Sent Events.
//!
//! `GET /notifications/stream?last_event_id=<n>` (or the standard
//! `Last-Event-ID` header on reconnect) replays the backlog after the
//! cursor and then streams live notifications, with a `: ping` comment
//! during idle periods so intermediaries keep the connection open.

mod handler;

pub use handler::{stream_handler, StreamQuery};
