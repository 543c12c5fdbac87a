use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::StreamKeyQuery;
use crate::AppState;

/// Latest JPEG for a device/camera, for clients that poll instead of streaming.
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamKeyQuery>,
) -> Response {
    let key = query.key();
    match frame_relay::snapshot(&state.store, &key) {
        Ok(frame) => {
            state.metrics.snapshot_served(true);
            ([(header::CONTENT_TYPE, "image/jpeg")], frame).into_response()
        }
        Err(e) => {
            debug!(key = %key, "snapshot miss: {}", e);
            state.metrics.snapshot_served(false);
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "No frame available for this robot/camera yet"
                })),
            )
                .into_response()
        }
    }
}
