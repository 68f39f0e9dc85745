//! Store backend factory.

use std::sync::Arc;

use crate::config::StoreConfig;

use super::backend::{Store, StoreError};
use super::memory_backend::MemoryStore;
use super::postgres_backend::PostgresStore;

/// Create a store backend based on configuration.
///
/// - `"postgres"`: connects a pool and ensures the schema exists
/// - `"memory"` (default): in-process log, lost on restart
///
/// An unrecognized backend name falls back to memory with a warning.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.backend.as_str() {
        "postgres" => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL store");
            let store = PostgresStore::connect(config).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown store backend, falling back to memory"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
