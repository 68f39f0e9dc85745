//! Layered configuration: defaults, config files by RUN_MODE, environment.

mod settings;

pub use settings::{ServerConfig, Settings, StoreConfig, StreamConfig};
