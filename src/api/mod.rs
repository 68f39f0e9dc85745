//! HTTP API: write, polling, health, stats, metrics.

mod handlers;
mod health;
mod metrics;
mod routes;

pub use handlers::{CreateNotificationRequest, PollQuery, PollResponse};
pub use routes::api_routes;
