use serde::{Deserialize, Serialize};

use crate::notification::Notification;

/// Messages sent from client to server.
///
/// The hello must be the first frame on the connection; it carries the
/// client's cursor. Anything else as a first frame is a protocol
/// violation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Hello {
        /// Highest seq the client has already seen; 0 when absent
        #[serde(default)]
        last_seq: i64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Notification { data: Notification },
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn notification(data: Notification) -> Self {
        Self::Notification { data }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
