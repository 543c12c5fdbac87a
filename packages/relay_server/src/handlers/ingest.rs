//! Producer WebSocket at `/api/v1/camera/upload/ws`.
//!
//! Each binary message is one complete frame and overwrites the store slot
//! for the connection's key. There is no acknowledgement and no validation.

use axum::{
    extract::ws::{CloseFrame, Message, WebSocket},
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use frame_relay::{FrameStore, RelayError, StreamKey};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::StreamKeyQuery;
use crate::AppState;
use crate::metrics::RelayMetrics;

pub async fn upload_websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamKeyQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let key = query.key();
    let store = state.store.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| handle_ingest(socket, key, store, metrics))
}

/// How a producer connection ended without an error.
#[derive(Debug)]
enum IngestEnd {
    Closed(Option<CloseFrame>),
    StreamEnded,
}

pub(crate) async fn handle_ingest(
    socket: WebSocket,
    key: StreamKey,
    store: Arc<FrameStore>,
    metrics: Arc<RelayMetrics>,
) {
    info!(device_id = %key.device_id, stream_id = %key.stream_id, "producer connected");
    metrics.producer_connected();

    match receive_frames(socket, &key, &store, &metrics).await {
        Ok(IngestEnd::Closed(frame)) => {
            // Close code tells a clean shutdown apart from a proxy cutting the line
            let code = frame.map(|f| f.code);
            info!(device_id = %key.device_id, stream_id = %key.stream_id, code = ?code, "producer disconnected");
        }
        Ok(IngestEnd::StreamEnded) => {
            info!(device_id = %key.device_id, stream_id = %key.stream_id, "producer stream ended");
        }
        Err(e) => {
            metrics.ingest_error();
            warn!(device_id = %key.device_id, stream_id = %key.stream_id, "producer connection failed: {}", e);
        }
    }

    metrics.producer_disconnected();
}

async fn receive_frames(
    mut socket: WebSocket,
    key: &StreamKey,
    store: &FrameStore,
    metrics: &RelayMetrics,
) -> Result<IngestEnd, RelayError> {
    while let Some(msg) = socket.recv().await {
        let msg = msg.map_err(|e| RelayError::Transport(e.to_string()))?;
        match msg {
            Message::Binary(frame) => {
                metrics.frame_received(frame.len());
                store.write(key, frame);
            }
            Message::Text(_) => {
                return Err(RelayError::MalformedMessage(
                    "expected a binary frame, got text".to_string(),
                ));
            }
            Message::Close(frame) => return Ok(IngestEnd::Closed(frame)),
            Message::Ping(_) | Message::Pong(_) => {
                debug!(key = %key, "producer keepalive");
            }
        }
    }
    Ok(IngestEnd::StreamEnded)
}
