//! End-to-end delivery properties over the in-memory store.
//!
//! These exercise the catch-up/live merge the way the transports use
//! it, without network plumbing: every client that supplies a cursor
//! must see exactly the records above it, each once, in seq order.

use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde_json::json;

use seqcast::broadcast::Broadcaster;
use seqcast::delivery::subscribe_with_backlog;
use seqcast::notification::Notification;
use seqcast::store::{MemoryStore, Store};

async fn write_and_publish(
    store: &Arc<MemoryStore>,
    broadcaster: &Arc<Broadcaster>,
    kind: &str,
) -> Arc<Notification> {
    let n = Arc::new(store.append(kind, json!({})).await.unwrap());
    broadcaster.publish(&n);
    n
}

/// Two writes, then a client catching up from seq 1: it must receive
/// only the seq-2 backlog item, then subsequent writes live, each
/// exactly once.
#[tokio::test]
async fn test_catch_up_from_cursor_then_live() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));

    write_and_publish(&store, &broadcaster, "A").await;
    write_and_publish(&store, &broadcaster, "B").await;

    let mut stream = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        1,
        200,
    ));

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.seq, 2);
    assert_eq!(first.kind, "B");

    let third = write_and_publish(&store, &broadcaster, "C").await;
    let received = stream.next().await.unwrap().unwrap();
    assert_eq!(received.seq, third.seq);
    assert_eq!(received.kind, "C");
}

/// A record that lands in both the backlog read and the live mailbox is
/// delivered once.
#[tokio::test]
async fn test_no_duplicate_across_backlog_and_live() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));

    let racing = Arc::new(store.append("raced", json!({})).await.unwrap());

    let mut stream = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        0,
        200,
    ));

    // First poll subscribes, then replays seq 1 from the backlog.
    assert_eq!(stream.next().await.unwrap().unwrap().seq, 1);

    // The fan-out for the same record arrives afterwards, as if publish
    // had raced the range snapshot. The watermark must swallow it.
    broadcaster.publish(&racing);
    write_and_publish(&store, &broadcaster, "next").await;

    assert_eq!(stream.next().await.unwrap().unwrap().seq, 2);
}

/// Gap-free, duplicate-free, ordered delivery while a writer keeps
/// appending through the backlog-to-live transition.
#[tokio::test]
async fn test_concurrent_writes_delivered_exactly_once_in_order() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(1024));

    // Ten records exist before the client connects.
    for _ in 0..10 {
        write_and_publish(&store, &broadcaster, "w").await;
    }

    // A small page size keeps the reader in the backlog phase while the
    // writer below is still appending.
    let mut stream = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        0,
        4,
    ));

    let writer = tokio::spawn({
        let store = store.clone();
        let broadcaster = broadcaster.clone();
        async move {
            for _ in 0..40 {
                write_and_publish(&store, &broadcaster, "w").await;
                tokio::task::yield_now().await;
            }
        }
    });

    let mut seen = Vec::new();
    while seen.len() < 50 {
        let item = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("delivery stalled")
            .unwrap()
            .unwrap();
        seen.push(item.seq);
    }
    writer.await.unwrap();

    assert_eq!(seen, (1..=50).collect::<Vec<i64>>());
}

/// Independent clients at different cursors each get their own complete
/// view.
#[tokio::test]
async fn test_multiple_clients_independent_cursors() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));

    for _ in 0..4 {
        write_and_publish(&store, &broadcaster, "w").await;
    }

    let mut from_zero = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        0,
        200,
    ));
    let mut from_three = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        3,
        200,
    ));

    for expected in 1..=4 {
        assert_eq!(from_zero.next().await.unwrap().unwrap().seq, expected);
    }
    assert_eq!(from_three.next().await.unwrap().unwrap().seq, 4);

    // Both are live now and see the next write once each.
    write_and_publish(&store, &broadcaster, "w").await;
    assert_eq!(from_zero.next().await.unwrap().unwrap().seq, 5);
    assert_eq!(from_three.next().await.unwrap().unwrap().seq, 5);
}

/// Seq values are not contiguous after aborted writes; the merge only
/// relies on monotonic increase.
#[tokio::test]
async fn test_delivery_tolerates_seq_gaps() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));

    let mut stream = Box::pin(subscribe_with_backlog(
        store.clone(),
        broadcaster.clone(),
        5,
        200,
    ));

    // Drive the stream past the (empty) backlog so it is subscribed and
    // waiting on its mailbox.
    assert!(stream.next().now_or_never().is_none());
    assert_eq!(broadcaster.subscriber_count(), 1);

    // Live records arriving with holes in the sequence (7, then 10)
    // pass straight through the watermark filter.
    broadcaster.publish(&Arc::new(Notification::new(7, "w", json!({}))));
    broadcaster.publish(&Arc::new(Notification::new(10, "w", json!({}))));

    assert_eq!(stream.next().await.unwrap().unwrap().seq, 7);
    assert_eq!(stream.next().await.unwrap().unwrap().seq, 10);
}

/// A subscription whose owner went away stops receiving after removal.
#[tokio::test]
async fn test_disconnected_client_cleanup() {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));

    {
        let mut stream = Box::pin(subscribe_with_backlog(
            store.clone(),
            broadcaster.clone(),
            0,
            200,
        ));
        write_and_publish(&store, &broadcaster, "w").await;
        assert_eq!(stream.next().await.unwrap().unwrap().seq, 1);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    // Dropping the stream unregistered the subscription; later
    // publishes fan out to nobody.
    assert_eq!(broadcaster.subscriber_count(), 0);
    let n = Arc::new(store.append("w", json!({})).await.unwrap());
    assert_eq!(broadcaster.publish(&n), 0);
}
