//! Store contract: sequence assignment plus ordered range reads.

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::Notification;

/// Errors surfaced by a store backend.
///
/// This layer performs no retries; transient failures propagate to the
/// caller unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable, atomically-appending, range-queryable notification log.
///
/// `append` assigns the next `seq` and persists the record in one atomic
/// step. `range` must be linearizable with respect to `append`: a record
/// whose append completed before the `range` call is visible to any
/// query whose `after_seq` predates it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new notification with the next sequence number.
    async fn append(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<Notification, StoreError>;

    /// Up to `limit` records with `seq > after_seq`, ascending.
    /// An empty result is valid and not an error.
    async fn range(&self, after_seq: i64, limit: usize) -> Result<Vec<Notification>, StoreError>;
}
