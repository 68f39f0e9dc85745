use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sequenced notification record.
///
/// Created once by the store on append and never mutated afterwards.
/// `seq` is strictly increasing and unique across the lifetime of the
/// system but not contiguous: aborted writes may leave gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier, assigned at creation, never reused
    pub id: Uuid,
    /// Total-order position of this record
    pub seq: i64,
    /// Event type tag (e.g. "order.created")
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload, passed through unmodified
    pub payload: serde_json::Value,
    /// Creation timestamp, informational only; ordering is by `seq`
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(seq: i64, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}
