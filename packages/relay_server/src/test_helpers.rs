use frame_relay::FrameStore;
use std::sync::Arc;

use crate::AppState;
use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;

/// Build an `AppState` with an empty store and default config.
pub fn test_app_state() -> AppState {
    AppState {
        store: Arc::new(FrameStore::new()),
        config: Arc::new(RelayConfig::default()),
        metrics: Arc::new(RelayMetrics::new()),
    }
}
