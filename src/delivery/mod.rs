//! Catch-up / live merge: one gap-free, duplicate-free ordered stream
//! from a client cursor.
//!
//! Every streaming transport runs the same sequence:
//!
//! 1. Subscribe to the broadcaster. Anything appended from here on is
//!    captured by the mailbox, so nothing can fall between backlog and
//!    live. Subscribing after the backlog read loses writes that land
//!    between the two steps and must not be done.
//! 2. Replay the backlog with paged `range` queries, advancing the
//!    `last_sent` watermark. Paging until a short page keeps a backlog
//!    longer than one page from opening a gap before the live phase.
//! 3. Drain the mailbox, yielding only items above the watermark. An
//!    item can legitimately arrive both ways (appended after subscribe
//!    but before the range snapshot); the watermark makes delivery
//!    idempotent instead of requiring exactly-once fan-out internally.
//!
//! Dropping the stream drops the subscription, which unregisters it.
//! That is the cleanup step, and it runs on every exit path including
//! cancellation.

use std::sync::Arc;

use futures::stream::Stream;

use crate::broadcast::Broadcaster;
use crate::metrics::{BACKLOG_REPLAYED_TOTAL, DUPLICATES_FILTERED_TOTAL};
use crate::notification::Notification;
use crate::store::{Store, StoreError};

/// Produce the merged backlog-then-live stream for a client that has
/// already seen everything up to and including `after_seq`.
///
/// Each yielded item has a seq strictly greater than the previous one.
/// The stream ends only on a store error or when the subscription is
/// closed (broadcaster eviction of a slow consumer).
pub fn subscribe_with_backlog(
    store: Arc<dyn Store>,
    broadcaster: Arc<Broadcaster>,
    after_seq: i64,
    backlog_limit: usize,
) -> impl Stream<Item = Result<Arc<Notification>, StoreError>> {
    // A zero page size would never see a short page and spin on empty reads.
    let backlog_limit = backlog_limit.max(1);

    async_stream::try_stream! {
        // Subscribe first; the mailbox now captures concurrent appends.
        let mut subscription = broadcaster.subscribe();
        let mut last_sent = after_seq;

        loop {
            let page = store.range(last_sent, backlog_limit).await?;
            let page_len = page.len();
            BACKLOG_REPLAYED_TOTAL.inc_by(page_len as u64);

            for notification in page {
                last_sent = notification.seq;
                yield Arc::new(notification);
            }

            if page_len < backlog_limit {
                break;
            }
        }

        tracing::debug!(
            subscription_id = %subscription.id(),
            watermark = last_sent,
            "Backlog replayed, switching to live delivery"
        );

        while let Some(notification) = subscription.recv().await {
            if notification.seq <= last_sent {
                // Already covered by the backlog read
                DUPLICATES_FILTERED_TOTAL.inc();
                continue;
            }
            last_sent = notification.seq;
            yield notification;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, count: usize) {
        for i in 0..count {
            store.append("seed", json!({ "i": i })).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_backlog_then_live_in_order() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new(32));
        seed(&store, 3).await;

        let mut stream = Box::pin(subscribe_with_backlog(
            store.clone(),
            broadcaster.clone(),
            0,
            200,
        ));

        for expected in 1..=3 {
            assert_eq!(stream.next().await.unwrap().unwrap().seq, expected);
        }

        // The stream is now live; a new write arrives through the mailbox.
        let live = Arc::new(store.append("live", json!({})).await.unwrap());
        broadcaster.publish(&live);
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_watermark_filters_duplicate_live_delivery() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new(32));

        let first = Arc::new(store.append("a", json!({})).await.unwrap());

        let mut stream = Box::pin(subscribe_with_backlog(
            store.clone(),
            broadcaster.clone(),
            0,
            200,
        ));

        // First poll subscribes and replays seq 1 from backlog.
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 1);

        // The same record also arrives live (publish raced the range
        // snapshot); the watermark must discard it.
        broadcaster.publish(&first);
        let second = Arc::new(store.append("b", json!({})).await.unwrap());
        broadcaster.publish(&second);

        assert_eq!(stream.next().await.unwrap().unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_multi_page_backlog_is_gap_free() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new(32));
        seed(&store, 7).await;

        // Page size 3 forces three range queries.
        let mut stream = Box::pin(subscribe_with_backlog(
            store.clone(),
            broadcaster.clone(),
            0,
            3,
        ));

        for expected in 1..=7 {
            assert_eq!(stream.next().await.unwrap().unwrap().seq, expected);
        }
    }

    #[tokio::test]
    async fn test_cursor_skips_already_seen_records() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new(32));
        seed(&store, 5).await;

        let mut stream = Box::pin(subscribe_with_backlog(
            store.clone(),
            broadcaster.clone(),
            3,
            200,
        ));

        assert_eq!(stream.next().await.unwrap().unwrap().seq, 4);
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 5);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new(32));
        seed(&store, 1).await;

        {
            let mut stream = Box::pin(subscribe_with_backlog(
                store.clone(),
                broadcaster.clone(),
                0,
                200,
            ));
            assert_eq!(stream.next().await.unwrap().unwrap().seq, 1);
            assert_eq!(broadcaster.subscriber_count(), 1);
        }

        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
