use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::store::FrameStore;

pub const DEFAULT_PRESENCE_THRESHOLD: Duration = Duration::from_secs(10);

/// A device/stream pair that pushed a frame recently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub device_id: String,
    pub stream_id: String,
    /// Unix seconds of the last write
    pub last_update_timestamp: f64,
}

/// Every key whose last write is at most `threshold` old, sorted by key.
///
/// Scans all keys in the store, so the cost follows the number of keys
/// ever written (minus evicted ones), not the number currently live.
pub fn presence(store: &FrameStore, threshold: Duration) -> Vec<PresenceEntry> {
    let mut online: Vec<_> = store
        .entries()
        .into_iter()
        .filter(|(_, record)| record.age() <= threshold)
        .collect();
    online.sort_by(|a, b| a.0.cmp(&b.0));

    online
        .into_iter()
        .map(|(key, record)| PresenceEntry {
            device_id: key.device_id,
            stream_id: key.stream_id,
            last_update_timestamp: record.arrived_at.timestamp_micros() as f64 / 1_000_000.0,
        })
        .collect()
}
