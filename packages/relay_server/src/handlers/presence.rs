use axum::{
    Json,
    extract::{Query, State},
};
use frame_relay::PresenceEntry;
use serde::Deserialize;
use std::time::Duration;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    threshold_seconds: Option<u64>,
}

/// Device/camera pairs that pushed a frame within `threshold_seconds`.
pub async fn robots_online_handler(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
) -> Json<Vec<PresenceEntry>> {
    let threshold = query
        .threshold_seconds
        .map(Duration::from_secs)
        .unwrap_or(state.config.presence_threshold);
    Json(frame_relay::presence(&state.store, threshold))
}
