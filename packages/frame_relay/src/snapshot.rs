use bytes::Bytes;

use crate::error::RelayError;
use crate::store::{FrameStore, StreamKey};

/// Latest stored payload for `key`, however old it is.
pub fn snapshot(store: &FrameStore, key: &StreamKey) -> Result<Bytes, RelayError> {
    store
        .read(key)
        .map(|record| record.payload)
        .ok_or_else(|| RelayError::FrameNotFound(key.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_never_written() {
        let store = FrameStore::new();
        let key = StreamKey::new("robot1", "front");
        assert_eq!(
            snapshot(&store, &key),
            Err(RelayError::FrameNotFound(key.clone()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_returns_latest() {
        let store = FrameStore::new();
        let key = StreamKey::new("robot1", "front");

        store.write(&key, vec![0xAA; 1000]);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(snapshot(&store, &key).unwrap().len(), 1000);

        tokio::time::advance(Duration::from_millis(100)).await;
        store.write(&key, vec![0xBB; 2000]);
        tokio::time::advance(Duration::from_millis(100)).await;
        let frame = snapshot(&store, &key).unwrap();
        assert_eq!(frame.len(), 2000);
        assert!(frame.iter().all(|b| *b == 0xBB));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_ignores_staleness() {
        let store = FrameStore::new();
        let key = StreamKey::new("robot1", "front");
        store.write(&key, b"old".to_vec());
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;
        assert_eq!(snapshot(&store, &key).unwrap().as_ref(), b"old");
    }
}
