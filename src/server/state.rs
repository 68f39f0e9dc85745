use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::error::AppError;
use crate::store::{create_store, MemoryStore, Store};

/// Shared application state, cloned into every handler.
///
/// The broadcaster is the only mutable state shared across client
/// handlers; it is constructed here once and passed by reference, never
/// reached through a global.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Build state from configuration, connecting the configured store
    /// backend.
    pub async fn new(settings: Settings) -> Result<Self, AppError> {
        let store = create_store(&settings.store).await?;
        let broadcaster = Arc::new(Broadcaster::new(settings.stream.mailbox_capacity));

        Ok(Self {
            settings: Arc::new(settings),
            store,
            broadcaster,
        })
    }

    /// State over an in-memory store, for tests.
    pub fn for_testing(settings: Settings) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(settings.stream.mailbox_capacity));
        Self {
            settings: Arc::new(settings),
            store: Arc::new(MemoryStore::new()),
            broadcaster,
        }
    }
}
