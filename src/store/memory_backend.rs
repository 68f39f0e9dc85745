//! In-memory store backend.
//!
//! Records live in a mutex-guarded append-only vector and are lost on
//! restart. This is the default backend and the one used by tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::notification::Notification;

use super::backend::{Store, StoreError};

/// Memory-backed notification log.
///
/// Sequence assignment and insertion happen under one lock, which makes
/// `range` linearizable with respect to `append`. The vector is sorted
/// by `seq` by construction.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    next_seq: i64,
    records: Vec<Notification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_seq: 1,
                records: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<Notification, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let notification = Notification::new(seq, kind, payload);
        inner.records.push(notification.clone());

        Ok(notification)
    }

    async fn range(&self, after_seq: i64, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        // Records are sorted by seq, so the cut-off is a partition point.
        let start = inner.records.partition_point(|n| n.seq <= after_seq);
        Ok(inner.records[start..]
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_assigns_increasing_seqs() {
        let store = MemoryStore::new();

        let a = store.append("a", json!({})).await.unwrap();
        let b = store.append("b", json!({})).await.unwrap();
        let c = store.append("c", json!({})).await.unwrap();

        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_range_after_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append("n", json!({ "i": i })).await.unwrap();
        }

        let items = store.range(2, 50).await.unwrap();
        let seqs: Vec<i64> = items.iter().map(|n| n.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_range_respects_limit() {
        let store = MemoryStore::new();
        for _ in 0..10 {
            store.append("n", json!({})).await.unwrap();
        }

        let items = store.range(0, 4).await.unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items.last().unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_empty_range_is_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.range(0, 50).await.unwrap().is_empty());

        store.append("n", json!({})).await.unwrap();
        // Cursor beyond the head
        assert!(store.range(100, 50).await.unwrap().is_empty());
    }
}
