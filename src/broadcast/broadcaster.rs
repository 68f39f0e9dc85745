use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::metrics::{
    NOTIFICATIONS_DELIVERED_TOTAL, SLOW_SUBSCRIBERS_EVICTED_TOTAL, SUBSCRIBERS_ACTIVE,
};
use crate::notification::Notification;

use super::subscription::Subscription;

/// Counters kept alongside the registry, exposed through `/stats`.
#[derive(Debug, Default)]
pub struct BroadcasterStats {
    pub published_total: AtomicU64,
    pub delivered_total: AtomicU64,
    pub evicted_total: AtomicU64,
}

/// Snapshot of broadcaster statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcasterStatsSnapshot {
    pub active_subscribers: usize,
    pub published_total: u64,
    pub delivered_total: u64,
    pub evicted_total: u64,
}

/// Process-wide registry of live subscriptions.
///
/// One instance is constructed explicitly and owned by the application
/// state; there is no module-level default. `publish` fans each
/// notification out to every mailbox registered at the moment of the
/// call, enqueue-only: it never waits on a consumer. A subscriber whose
/// bounded mailbox is full is evicted, which ends its stream after it
/// drains what was already buffered; the client reconnects with its
/// cursor and replays the rest from backlog.
pub struct Broadcaster {
    subscribers: DashMap<Uuid, mpsc::Sender<Arc<Notification>>>,
    mailbox_capacity: usize,
    stats: BroadcasterStats,
}

impl Broadcaster {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            mailbox_capacity: mailbox_capacity.max(1),
            stats: BroadcasterStats::default(),
        }
    }

    /// Register a new, empty subscription.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);
        SUBSCRIBERS_ACTIVE.inc();

        tracing::debug!(subscription_id = %id, "Subscription registered");
        Subscription::new(id, rx, Arc::clone(self))
    }

    /// Remove a subscription. Idempotent: unknown ids are a no-op.
    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            SUBSCRIBERS_ACTIVE.dec();
            tracing::debug!(subscription_id = %id, "Subscription removed");
        }
    }

    /// Fan a notification out to every currently registered mailbox.
    ///
    /// Returns the number of mailboxes it was enqueued to. A zero-entry
    /// registry is a no-op. Subscriptions added concurrently may or may
    /// not receive this notification; none receives it twice.
    pub fn publish(&self, notification: &Arc<Notification>) -> usize {
        self.stats.published_total.fetch_add(1, Ordering::Relaxed);

        if self.subscribers.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut evicted = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(notification)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscription_id = %entry.key(),
                        seq = notification.seq,
                        capacity = self.mailbox_capacity,
                        "Mailbox full, evicting slow subscriber"
                    );
                    SLOW_SUBSCRIBERS_EVICTED_TOTAL.inc();
                    self.stats.evicted_total.fetch_add(1, Ordering::Relaxed);
                    evicted.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => {
                    // Receiver gone but not yet unregistered
                    evicted.push(*entry.key());
                }
            }
        }

        // Removal happens outside the iteration to keep the map shards free.
        for id in evicted {
            self.unsubscribe(id);
        }

        NOTIFICATIONS_DELIVERED_TOTAL.inc_by(delivered as u64);
        self.stats
            .delivered_total
            .fetch_add(delivered as u64, Ordering::Relaxed);

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn stats(&self) -> BroadcasterStatsSnapshot {
        BroadcasterStatsSnapshot {
            active_subscribers: self.subscribers.len(),
            published_total: self.stats.published_total.load(Ordering::Relaxed),
            delivered_total: self.stats.delivered_total.load(Ordering::Relaxed),
            evicted_total: self.stats.evicted_total.load(Ordering::Relaxed),
        }
    }
}
