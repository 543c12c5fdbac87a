pub mod health;
pub mod ingest;
pub mod presence;
pub mod snapshot;
pub mod stream;

use frame_relay::StreamKey;
use serde::Deserialize;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, metrics_handler};
pub use ingest::upload_websocket_handler;
pub use presence::robots_online_handler;
pub use snapshot::snapshot_handler;
pub use stream::mjpeg_handler;

const DEFAULT_STREAM_ID: &str = "default";

/// `?robot_id=..&camera_id=..` as sent by devices and apps.
/// `device_id` / `stream_id` are accepted too.
#[derive(Debug, Deserialize)]
pub struct StreamKeyQuery {
    #[serde(alias = "device_id")]
    pub robot_id: String,
    #[serde(default = "default_stream_id", alias = "stream_id")]
    pub camera_id: String,
}

pub(crate) fn default_stream_id() -> String {
    DEFAULT_STREAM_ID.to_string()
}

impl StreamKeyQuery {
    pub fn key(&self) -> StreamKey {
        StreamKey::new(&self.robot_id, &self.camera_id)
    }
}
