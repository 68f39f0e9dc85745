use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notification::Notification;

use super::broadcaster::Broadcaster;

/// One live client's mailbox of pending notifications.
///
/// Exclusively owned by the connection adapter that created it. The
/// broadcaster only enqueues; the owner only dequeues. Dropping the
/// subscription unregisters it, so cleanup runs on every exit path,
/// including task cancellation.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Arc<Notification>>,
    broadcaster: Arc<Broadcaster>,
}

impl Subscription {
    pub(super) fn new(
        id: Uuid,
        receiver: mpsc::Receiver<Arc<Notification>>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            id,
            receiver,
            broadcaster,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next live notification.
    ///
    /// Returns `None` once the subscription has been removed from the
    /// broadcaster and the remaining buffered items are drained.
    pub async fn recv(&mut self) -> Option<Arc<Notification>> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
