//! SSE handler implementation.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;

use crate::delivery::subscribe_with_backlog;
use crate::metrics::{CONNECTION_DURATION, SSE_CONNECTIONS_CLOSED, SSE_CONNECTIONS_OPENED};
use crate::server::AppState;

/// Query parameters for the stream endpoint
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub last_event_id: Option<i64>,
}

/// SSE stream handler.
///
/// Replays everything after the client's cursor, then follows with live
/// notifications, each framed with `id` = seq and event type
/// "notification". A keep-alive comment goes out after the configured
/// interval of silence; it does not advance the client's cursor.
#[tracing::instrument(
    name = "sse.connect",
    skip(state, query, headers),
    fields(has_query_cursor = query.last_event_id.is_some())
)]
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let cursor = extract_cursor(&query, &headers);

    SSE_CONNECTIONS_OPENED.inc();
    tracing::info!(last_event_id = cursor, "SSE stream connected");

    let keep_alive_interval = Duration::from_secs(state.settings.stream.keep_alive_seconds);
    let stream = create_event_stream(state, cursor);

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keep_alive_interval).text("ping"))
        .into_response()
}

/// Extract the cursor from the query parameter or the standard
/// `Last-Event-ID` reconnect header. The query parameter wins.
fn extract_cursor(query: &StreamQuery, headers: &HeaderMap) -> i64 {
    if let Some(cursor) = query.last_event_id {
        return cursor;
    }

    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Create the SSE event stream over the catch-up/live merge.
fn create_event_stream(
    state: AppState,
    cursor: i64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    // Dropped when the client disconnects and the stream unwinds
    let cleanup_guard = CleanupGuard::new(cursor, Instant::now());

    let merged = subscribe_with_backlog(
        state.store.clone(),
        state.broadcaster.clone(),
        cursor,
        state.settings.stream.backlog_limit,
    );

    async_stream::stream! {
        let _guard = cleanup_guard;
        let mut merged = Box::pin(merged);

        while let Some(result) = merged.next().await {
            match result {
                Ok(notification) => {
                    let json = match serde_json::to_string(&*notification) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize SSE notification");
                            continue;
                        }
                    };
                    yield Ok(Event::default()
                        .id(notification.seq.to_string())
                        .event("notification")
                        .data(json));
                }
                Err(e) => {
                    // Headers are long gone; surface the failure as an
                    // error event and end the stream so the client
                    // reconnects with its cursor.
                    tracing::error!(error = %e, "Store failure during SSE delivery");
                    yield Ok(Event::default()
                        .event("error")
                        .data(r#"{"code":"STORE_ERROR","message":"backlog read failed"}"#));
                    break;
                }
            }
        }
    }
}

/// Guard that records connection-closed metrics when dropped
struct CleanupGuard {
    cursor: i64,
    connection_start: Instant,
}

impl CleanupGuard {
    fn new(cursor: i64, connection_start: Instant) -> Self {
        Self {
            cursor,
            connection_start,
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_CLOSED.inc();
        let duration = self.connection_start.elapsed().as_secs_f64();
        CONNECTION_DURATION.observe(duration);

        tracing::info!(
            last_event_id = self.cursor,
            duration_secs = duration,
            "SSE stream closed"
        );
    }
}
