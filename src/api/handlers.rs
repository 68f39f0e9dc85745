//! Write and polling endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::metrics::NOTIFICATIONS_CREATED_TOTAL;
use crate::notification::Notification;
use crate::server::AppState;
use crate::store::Store;

/// Default page size for polling
const DEFAULT_POLL_LIMIT: usize = 50;
/// Hard cap on the polling page size
const MAX_POLL_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub after_seq: i64,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub items: Vec<Notification>,
    pub next_after_seq: i64,
}

/// POST /notifications
///
/// Appends the event to the store (which assigns its seq) and fans it
/// out to every live subscription. Fan-out is best-effort: the write
/// succeeds regardless of how many subscribers were reachable.
pub async fn create_notification(
    State(state): State<AppState>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>)> {
    let kind = body
        .kind
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Validation("missing field: type".to_string()))?;
    let payload = body
        .payload
        .ok_or_else(|| AppError::Validation("missing field: payload".to_string()))?;

    let notification = Arc::new(state.store.append(&kind, payload).await?);
    let delivered = state.broadcaster.publish(&notification);

    NOTIFICATIONS_CREATED_TOTAL.inc();
    tracing::info!(
        seq = notification.seq,
        kind = %notification.kind,
        delivered,
        "Notification created"
    );

    Ok((StatusCode::CREATED, Json((*notification).clone())))
}

/// GET /notifications?after_seq=&limit=
///
/// Stateless cursor polling: no subscription is created and repeating a
/// request with an unchanged cursor returns the same result until a new
/// write occurs. `next_after_seq` echoes the input cursor when nothing
/// was found. A `limit` above the cap is rejected, not clamped.
pub async fn poll_notifications(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_POLL_LIMIT);
    if limit > MAX_POLL_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be at most {}",
            MAX_POLL_LIMIT
        )));
    }

    let items = state.store.range(query.after_seq, limit).await?;
    let next_after_seq = items.last().map(|n| n.seq).unwrap_or(query.after_seq);

    Ok(Json(PollResponse {
        items,
        next_after_seq,
    }))
}
