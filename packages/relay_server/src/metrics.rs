//! Relay metrics for observability
//!
//! Atomic counters updated by the ingest and viewer handlers, exposed as a
//! serializable snapshot on `/metrics`.

use frame_relay::{SessionEnd, SessionSummary};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct RelayMetrics {
    // Producer metrics
    /// Currently connected producers
    pub active_producers: AtomicU64,
    /// Total producer connections since server start
    pub total_producers: AtomicU64,
    /// Frames written to the store
    pub frames_received: AtomicU64,
    /// Payload bytes written to the store
    pub bytes_received: AtomicU64,
    /// Producer connections that ended on a transport error or bad message
    pub ingest_errors: AtomicU64,

    // Viewer metrics
    /// Currently open stream sessions
    pub active_viewers: AtomicU64,
    /// Total stream sessions since server start
    pub total_viewers: AtomicU64,
    /// Multipart parts sent to viewers
    pub chunks_sent: AtomicU64,
    /// Frames replaced before a rate-limited viewer could receive them
    pub frames_skipped: AtomicU64,
    /// Sessions ended by the stale timeout
    pub sessions_timed_out: AtomicU64,
    /// Sessions ended by the viewer going away
    pub sessions_disconnected: AtomicU64,

    // Snapshot metrics
    pub snapshots_served: AtomicU64,
    pub snapshots_missed: AtomicU64,

    /// Keys dropped by the retention sweeper
    pub keys_evicted: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Producer tracking
    pub fn producer_connected(&self) {
        self.active_producers.fetch_add(1, Ordering::Relaxed);
        self.total_producers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn producer_disconnected(&self) {
        self.active_producers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn ingest_error(&self) {
        self.ingest_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Viewer tracking
    pub fn viewer_opened(&self) {
        self.active_viewers.fetch_add(1, Ordering::Relaxed);
        self.total_viewers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn viewer_closed(&self, summary: &SessionSummary) {
        self.active_viewers.fetch_sub(1, Ordering::Relaxed);
        self.chunks_sent
            .fetch_add(summary.chunks_sent, Ordering::Relaxed);
        self.frames_skipped
            .fetch_add(summary.frames_skipped, Ordering::Relaxed);
        match summary.end {
            SessionEnd::TimedOut => self.sessions_timed_out.fetch_add(1, Ordering::Relaxed),
            SessionEnd::Disconnected => self.sessions_disconnected.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot_served(&self, found: bool) {
        if found {
            self.snapshots_served.fetch_add(1, Ordering::Relaxed);
        } else {
            self.snapshots_missed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn keys_evicted(&self, count: usize) {
        self.keys_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            producers: ProducerMetrics {
                active: self.active_producers.load(Ordering::Relaxed),
                total: self.total_producers.load(Ordering::Relaxed),
                frames_received: self.frames_received.load(Ordering::Relaxed),
                bytes_received: self.bytes_received.load(Ordering::Relaxed),
                errors: self.ingest_errors.load(Ordering::Relaxed),
            },
            viewers: ViewerMetrics {
                active: self.active_viewers.load(Ordering::Relaxed),
                total: self.total_viewers.load(Ordering::Relaxed),
                chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
                frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
                timed_out: self.sessions_timed_out.load(Ordering::Relaxed),
                disconnected: self.sessions_disconnected.load(Ordering::Relaxed),
            },
            snapshots: SnapshotMetrics {
                served: self.snapshots_served.load(Ordering::Relaxed),
                missed: self.snapshots_missed.load(Ordering::Relaxed),
            },
            keys_evicted: self.keys_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub producers: ProducerMetrics,
    pub viewers: ViewerMetrics,
    pub snapshots: SnapshotMetrics,
    pub keys_evicted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerMetrics {
    pub active: u64,
    pub total: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerMetrics {
    pub active: u64,
    pub total: u64,
    pub chunks_sent: u64,
    pub frames_skipped: u64,
    pub timed_out: u64,
    pub disconnected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub served: u64,
    pub missed: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub keys: u64,
    pub producers: u64,
    pub viewers: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_tracking() {
        let metrics = RelayMetrics::new();

        metrics.producer_connected();
        metrics.producer_connected();
        metrics.frame_received(100);
        metrics.frame_received(50);
        assert_eq!(metrics.active_producers.load(Ordering::Relaxed), 2);

        metrics.producer_disconnected();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.producers.active, 1);
        assert_eq!(snapshot.producers.total, 2);
        assert_eq!(snapshot.producers.frames_received, 2);
        assert_eq!(snapshot.producers.bytes_received, 150);
    }

    #[test]
    fn test_viewer_tracking() {
        let metrics = RelayMetrics::new();

        metrics.viewer_opened();
        metrics.viewer_opened();
        metrics.viewer_closed(&SessionSummary {
            end: SessionEnd::TimedOut,
            chunks_sent: 7,
            frames_skipped: 3,
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.viewers.active, 1);
        assert_eq!(snapshot.viewers.total, 2);
        assert_eq!(snapshot.viewers.chunks_sent, 7);
        assert_eq!(snapshot.viewers.frames_skipped, 3);
        assert_eq!(snapshot.viewers.timed_out, 1);
        assert_eq!(snapshot.viewers.disconnected, 0);
    }

    #[test]
    fn test_snapshot_counts() {
        let metrics = RelayMetrics::new();
        metrics.snapshot_served(true);
        metrics.snapshot_served(false);
        metrics.snapshot_served(false);
        metrics.keys_evicted(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.snapshots.served, 1);
        assert_eq!(snapshot.snapshots.missed, 2);
        assert_eq!(snapshot.keys_evicted, 4);
    }
}
