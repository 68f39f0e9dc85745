use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::sse::stream_handler;

use super::handlers::{create_notification, poll_notifications};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Write + polling
        .route(
            "/notifications",
            post(create_notification).get(poll_notifications),
        )
        // Push stream
        .route("/notifications/stream", get(stream_handler))
}
