//! In-process fan-out: the subscription registry and per-client mailboxes.

mod broadcaster;
mod subscription;

pub use broadcaster::{Broadcaster, BroadcasterStatsSnapshot};
pub use subscription::Subscription;
