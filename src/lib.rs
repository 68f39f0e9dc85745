// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer (delivery core)
pub mod broadcast;
pub mod delivery;
pub mod notification;
pub mod store;

// Application layer
pub mod api;
pub mod server;
pub mod sse;
pub mod websocket;
