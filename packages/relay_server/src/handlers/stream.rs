use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use frame_relay::{Multiplexer, STREAM_CONTENT_TYPE, StreamKey};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MjpegQuery {
    #[serde(alias = "device_id")]
    robot_id: String,
    #[serde(default = "super::default_stream_id", alias = "stream_id")]
    camera_id: String,
    /// Per-viewer override of the configured output rate
    fps: Option<f64>,
}

/// MJPEG stream for WebViews and browsers.
///
/// Does not check for an existing frame first: the viewer hangs on until a
/// producer starts pushing, or until the stale timeout ends the response.
pub async fn mjpeg_handler(
    State(state): State<AppState>,
    Query(query): Query<MjpegQuery>,
) -> Response {
    let key = StreamKey::new(query.robot_id, query.camera_id);
    let mut config = state.config.stream.clone();
    if let Some(fps) = query.fps {
        config.max_stream_fps = fps;
    }

    info!(key = %key, fps = config.effective_fps(), "viewer connected");

    // Capacity 1: the multiplexer waits on the transport instead of queueing parts.
    let (mut tx, rx) = mpsc::channel::<Bytes>(1);
    let store = state.store.clone();
    let metrics = state.metrics.clone();
    metrics.viewer_opened();
    tokio::spawn(async move {
        let summary = Multiplexer::new(store, key, config).run(&mut tx).await;
        metrics.viewer_closed(&summary);
    });

    let parts = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|part| (Ok::<_, Infallible>(part), rx))
    });

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}
