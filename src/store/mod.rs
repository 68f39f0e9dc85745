//! Sequencer/store: atomic seq assignment plus ordered range reads.
//!
//! The `Store` trait is the delivery layer's only view of persistence.
//! Backends are selected by configuration through `create_store`.

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;

pub use backend::{Store, StoreError};
pub use factory::create_store;
pub use memory_backend::MemoryStore;
pub use postgres_backend::PostgresStore;
