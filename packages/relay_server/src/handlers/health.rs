use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns relay status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();

    let status = if snapshot.producers.errors == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        keys: state.store.len() as u64,
        producers: snapshot.producers.active,
        viewers: snapshot.viewers.active,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed relay metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_counts_keys() {
        let state = crate::test_helpers::test_app_state();
        state
            .store
            .write(&frame_relay::StreamKey::new("robot1", "front"), vec![1, 2, 3]);
        let app = Router::new()
            .route("/health", get(health_handler))
            .with_state(state);

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["keys"], 1);
        assert_eq!(json["viewers"], 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = crate::test_helpers::test_app_state();
        state.metrics.frame_received(10);
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["producers"]["frames_received"], 1);
        assert_eq!(json["producers"]["bytes_received"], 10);
    }
}
