use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::delivery::subscribe_with_backlog;
use crate::metrics::{
    CONNECTION_DURATION, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_PROTOCOL_VIOLATIONS,
};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};

/// Close code sent when the handshake is missing, late, or malformed
const POLICY_VIOLATION_CODE: u16 = 1008;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
///
/// The first inbound frame must be a well-formed hello carrying the
/// client's cursor; until then no subscription exists and nothing is
/// sent. On a good hello the send task drives the catch-up/live merge
/// stream while the receive task waits for the client to go away.
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    WS_CONNECTIONS_OPENED.inc();
    let connection_start = Instant::now();

    let handshake_timeout = Duration::from_secs(state.settings.stream.handshake_timeout_seconds);
    let cursor = match await_hello(&mut socket, handshake_timeout).await {
        Ok(cursor) => cursor,
        Err(reason) => {
            WS_PROTOCOL_VIOLATIONS.inc();
            tracing::warn!(reason, "WebSocket handshake failed, closing");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: POLICY_VIOLATION_CODE,
                    reason: reason.into(),
                })))
                .await;
            WS_CONNECTIONS_CLOSED.inc();
            return;
        }
    };

    tracing::info!(last_seq = cursor, "WebSocket hello received");

    let (ws_sender, ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(deliver(ws_sender, state.clone(), cursor));
    let mut recv_task = tokio::spawn(watch_disconnect(ws_receiver));

    // Disconnect cancels delivery; delivery ending (store failure, slow
    // consumer eviction) tears the connection down. Aborting the send
    // task drops the merge stream, which unregisters the subscription.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    CONNECTION_DURATION.observe(duration);

    tracing::info!(duration_secs = duration, "WebSocket connection closed");
}

/// Wait for the client's hello, bounded by the handshake timeout.
///
/// Anything other than a well-formed text hello within the deadline is a
/// protocol violation described by the returned reason. Generic over the
/// inbound frame stream; the live `WebSocket` is one such stream.
async fn await_hello<S>(socket: &mut S, timeout: Duration) -> Result<i64, &'static str>
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    match tokio::time::timeout(timeout, socket.next()).await {
        Err(_) => Err("handshake timed out"),
        Ok(first) => parse_hello(first),
    }
}

/// Interpret the first inbound frame of a connection.
fn parse_hello(first: Option<Result<Message, axum::Error>>) -> Result<i64, &'static str> {
    match first {
        None => Err("connection closed before hello"),
        Some(Err(_)) => Err("connection error before hello"),
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Hello { last_seq }) => Ok(last_seq),
            Err(_) => Err("first message must be a well-formed hello"),
        },
        Some(Ok(_)) => Err("first message must be a text hello frame"),
    }
}

/// Drive the merge stream and frame each item for the wire.
async fn deliver(mut ws_sender: SplitSink<WebSocket, Message>, state: AppState, cursor: i64) {
    let mut stream = Box::pin(subscribe_with_backlog(
        state.store.clone(),
        state.broadcaster.clone(),
        cursor,
        state.settings.stream.backlog_limit,
    ));

    while let Some(result) = stream.next().await {
        match result {
            Ok(notification) => {
                let message = ServerMessage::notification((*notification).clone());
                let text = match serde_json::to_string(&message) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize message");
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Store failure during WebSocket delivery");
                let message = ServerMessage::error("STORE_ERROR", "backlog read failed");
                if let Ok(text) = serde_json::to_string(&message) {
                    let _ = ws_sender.send(Message::Text(text.into())).await;
                }
                break;
            }
        }
    }

    let _ = ws_sender.close().await;
}

/// Wait for the client to disconnect. Inbound frames after the hello
/// are ignored.
async fn watch_disconnect(mut ws_receiver: SplitStream<WebSocket>) {
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
