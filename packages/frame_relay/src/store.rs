use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Identity of one logical camera feed: (device, stream).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StreamKey {
    pub device_id: String,
    pub stream_id: String,
}

impl StreamKey {
    pub fn new(device_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            stream_id: stream_id.into(),
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.stream_id)
    }
}

/// The single frame held for a key.
///
/// A record is built whole and swapped into the map in one insert, so the
/// payload, timestamps and sequence number always come from the same write.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    /// Raw frame bytes as received; never decoded
    pub payload: Bytes,
    /// Wall-clock arrival time, reported to presence clients
    pub arrived_at: DateTime<Utc>,
    /// Monotonic arrival time, used for all age comparisons
    pub received: Instant,
    /// Store-wide write generation, strictly increasing per key
    pub seq: u64,
}

impl FrameRecord {
    pub fn age(&self) -> Duration {
        self.received.elapsed()
    }
}

/// Latest-wins frame store shared by producers and viewers.
///
/// Backed by a sharded map, so writers on different keys never contend on
/// the same lock. Each key holds exactly one record; older frames are
/// dropped on overwrite.
pub struct FrameStore {
    frames: DashMap<StreamKey, FrameRecord>,
    next_seq: AtomicU64,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            frames: DashMap::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Replace the record for `key` with `payload`, stamped now.
    pub fn write(&self, key: &StreamKey, payload: impl Into<Bytes>) -> FrameRecord {
        let payload = payload.into();

        // Stamp while holding the shard lock so seq order matches insert order.
        match self.frames.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let record = self.stamp(payload);
                slot.insert(record.clone());
                record
            }
            Entry::Vacant(slot) => {
                let record = self.stamp(payload);
                debug!(key = %key, "first frame for key");
                slot.insert(record.clone());
                record
            }
        }
    }

    fn stamp(&self, payload: Bytes) -> FrameRecord {
        FrameRecord {
            payload,
            arrived_at: Utc::now(),
            received: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Current record for `key`, if any write has happened.
    pub fn read(&self, key: &StreamKey) -> Option<FrameRecord> {
        self.frames.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn keys(&self) -> Vec<StreamKey> {
        self.frames.iter().map(|r| r.key().clone()).collect()
    }

    /// Point-in-time copy of every key and its record.
    pub fn entries(&self) -> Vec<(StreamKey, FrameRecord)> {
        self.frames
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Drop every record whose last write is older than `max_age`.
    /// Returns how many keys were removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        self.frames.retain(|key, record| {
            let keep = record.age() <= max_age;
            if !keep {
                debug!(key = %key, age_ms = record.age().as_millis() as u64, "evicting stale key");
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key() -> StreamKey {
        StreamKey::new("robot1", "front")
    }

    #[test]
    fn test_read_absent_key() {
        let store = FrameStore::new();
        assert!(store.read(&key()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = FrameStore::new();
        for i in 0..10u8 {
            store.write(&key(), vec![i; 4]);
        }
        let record = store.read(&key()).unwrap();
        assert_eq!(record.payload.as_ref(), &[9u8; 4]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_seq_increases_per_key() {
        let store = FrameStore::new();
        let a = store.write(&key(), vec![1]);
        let b = store.write(&key(), vec![2]);
        assert!(b.seq > a.seq);
        assert_eq!(store.read(&key()).unwrap().seq, b.seq);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = FrameStore::new();
        let other = StreamKey::new("robot1", "rear");
        store.write(&key(), vec![1]);
        store.write(&other, vec![2]);
        assert_eq!(store.read(&key()).unwrap().payload.as_ref(), &[1]);
        assert_eq!(store.read(&other).unwrap().payload.as_ref(), &[2]);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec![key(), other]);
    }

    #[test]
    fn test_display() {
        assert_eq!(key().to_string(), "robot1/front");
    }

    #[tokio::test]
    async fn test_evict_older_than() {
        tokio::time::pause();
        let store = FrameStore::new();
        let fresh = StreamKey::new("robot2", "front");
        store.write(&key(), vec![1]);
        tokio::time::advance(Duration::from_secs(30)).await;
        store.write(&fresh, vec![2]);

        assert_eq!(store.evict_older_than(Duration::from_secs(10)), 1);
        assert!(store.read(&key()).is_none());
        assert!(store.read(&fresh).is_some());

        // A later write recreates an evicted key
        store.write(&key(), vec![3]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_never_tear() {
        let store = Arc::new(FrameStore::new());
        let mut tasks = Vec::new();

        // Each writer fills its payload with its own id so a torn record
        // would show mixed bytes or a length that does not match the id.
        for writer in 1..=8u8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..500 {
                    store.write(&key(), vec![writer; writer as usize * 16]);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for _ in 0..4 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut last_seq = 0;
                for _ in 0..2000 {
                    if let Some(record) = store.read(&key()) {
                        let first = record.payload[0];
                        assert_eq!(record.payload.len(), first as usize * 16);
                        assert!(record.payload.iter().all(|b| *b == first));
                        // Reads never go backward once a newer record is stored
                        assert!(record.seq >= last_seq);
                        last_seq = record.seq;
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
