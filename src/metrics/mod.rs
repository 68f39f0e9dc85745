//! Prometheus metrics for the delivery service.
//!
//! Covers stream connections per transport, the live subscriber set,
//! notification throughput, and backlog replay behavior.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "seqcast";

lazy_static! {
    // Connection metrics

    /// Total SSE stream connections opened
    pub static ref SSE_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_sse_connections_opened_total", METRIC_PREFIX),
        "Total SSE stream connections opened"
    ).unwrap();

    /// Total SSE stream connections closed
    pub static ref SSE_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_sse_connections_closed_total", METRIC_PREFIX),
        "Total SSE stream connections closed"
    ).unwrap();

    /// Total WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// Total WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket handshakes rejected as protocol violations
    pub static ref WS_PROTOCOL_VIOLATIONS: IntCounter = register_int_counter!(
        format!("{}_ws_protocol_violations_total", METRIC_PREFIX),
        "WebSocket connections closed for a missing or malformed hello"
    ).unwrap();

    /// Stream connection duration in seconds
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "Duration of stream connections in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 7200.0]
    ).unwrap();

    // Fan-out metrics

    /// Currently registered live subscriptions
    pub static ref SUBSCRIBERS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_subscribers_active", METRIC_PREFIX),
        "Currently registered live subscriptions"
    ).unwrap();

    /// Notifications accepted by the store
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Notifications appended to the store"
    ).unwrap();

    /// Per-subscriber live deliveries
    pub static ref NOTIFICATIONS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_delivered_total", METRIC_PREFIX),
        "Live notification deliveries across all subscribers"
    ).unwrap();

    /// Subscribers evicted because their mailbox overflowed
    pub static ref SLOW_SUBSCRIBERS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_slow_subscribers_evicted_total", METRIC_PREFIX),
        "Subscribers forcibly disconnected because their mailbox was full"
    ).unwrap();

    // Catch-up metrics

    /// Backlog records replayed to reconnecting clients
    pub static ref BACKLOG_REPLAYED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_backlog_replayed_total", METRIC_PREFIX),
        "Backlog records replayed to catching-up clients"
    ).unwrap();

    /// Live items dropped by the watermark filter
    pub static ref DUPLICATES_FILTERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_duplicates_filtered_total", METRIC_PREFIX),
        "Live items already covered by backlog replay and filtered out"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_includes_prefix() {
        NOTIFICATIONS_CREATED_TOTAL.inc();
        let output = encode_metrics().unwrap();
        assert!(output.contains("seqcast_notifications_created_total"));
    }
}
