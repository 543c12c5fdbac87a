//! Per-viewer streaming loop.
//!
//! A [`Multiplexer`] polls the [`FrameStore`] for one key and turns the
//! latest frame into `multipart/x-mixed-replace` parts, at most one part per
//! `1 / max_stream_fps` window. Frames superseded before the window opens are
//! skipped, never queued, and the same frame is never sent twice.

use bytes::{BufMut, Bytes, BytesMut};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::store::{FrameStore, StreamKey};

/// Multipart boundary marker
pub const BOUNDARY: &str = "frame";

/// Content type of every part
pub const FRAME_CONTENT_TYPE: &str = "image/jpeg";

/// Content type of the whole streaming response
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const DEFAULT_MAX_STREAM_FPS: f64 = 10.0;
const FALLBACK_STREAM_FPS: f64 = 1.0;
/// One part per hour
const MIN_STREAM_FPS: f64 = 1.0 / 3600.0;
const MAX_STREAM_FPS: f64 = 1000.0;

/// Tunables for one viewer session.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    /// Output rate cap; non-positive values fall back to 1 fps, others are
    /// clamped to one part per hour .. 1000 fps
    pub max_stream_fps: f64,
    /// End the session when no new frame shows up for this long (zero = never)
    pub stale_timeout: Duration,
    /// Poll interval while the key has no record at all
    pub idle_poll_interval: Duration,
    /// Poll interval while waiting for a frame fresher than the last one sent
    pub new_frame_poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_stream_fps: DEFAULT_MAX_STREAM_FPS,
            stale_timeout: Duration::from_secs(60),
            idle_poll_interval: Duration::from_millis(100),
            new_frame_poll_interval: Duration::from_millis(10),
        }
    }
}

impl StreamConfig {
    pub fn effective_fps(&self) -> f64 {
        if self.max_stream_fps.is_finite() && self.max_stream_fps > 0.0 {
            self.max_stream_fps.clamp(MIN_STREAM_FPS, MAX_STREAM_FPS)
        } else {
            FALLBACK_STREAM_FPS
        }
    }

    /// Minimum spacing between two emitted parts.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.effective_fps())
    }

    fn timeout_enabled(&self) -> bool {
        !self.stale_timeout.is_zero()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    AwaitingFirstFrame,
    Streaming,
    RateLimitedWait,
    TimedOut,
    Disconnected,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::TimedOut | StreamState::Disconnected)
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// No new frame within the stale timeout; the viewer should reconnect
    TimedOut,
    /// The viewer went away
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub chunks_sent: u64,
    /// Frames seen during a rate-limit wait and replaced before they could be sent
    pub frames_skipped: u64,
}

/// Destination for encoded parts.
///
/// `send_chunk` may wait for the transport to accept more data; an error
/// means the viewer is gone.
pub trait ChunkSink {
    fn send_chunk(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Cheap check for a viewer that left while nothing was being sent.
    fn is_closed(&self) -> bool {
        false
    }
}

impl ChunkSink for mpsc::Sender<Bytes> {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.send(chunk)
            .await
            .map_err(|_| RelayError::ViewerDisconnected)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

impl ChunkSink for Vec<Bytes> {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.push(chunk);
        Ok(())
    }
}

/// Encode one multipart part: boundary, headers, payload, trailing CRLF.
pub fn encode_part(payload: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: {FRAME_CONTENT_TYPE}\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + payload.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(payload);
    part.put_slice(b"\r\n");
    part.freeze()
}

pub struct Multiplexer {
    store: Arc<FrameStore>,
    key: StreamKey,
    config: StreamConfig,
    state: StreamState,
}

impl Multiplexer {
    pub fn new(store: Arc<FrameStore>, key: StreamKey, config: StreamConfig) -> Self {
        Self {
            store,
            key,
            config,
            state: StreamState::AwaitingFirstFrame,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            debug!(key = %self.key, from = ?self.state, to = ?next, "stream state");
            self.state = next;
        }
    }

    /// Drive the session until it times out or the viewer disconnects.
    pub async fn run<S: ChunkSink>(&mut self, sink: &mut S) -> SessionSummary {
        let min_interval = self.config.min_interval();

        let mut last_sent_at: Option<Instant> = None;
        let mut last_delivered_seq: Option<u64> = None;
        let mut pending_seq: Option<u64> = None;
        let mut last_new_frame_at = Instant::now();
        let mut chunks_sent = 0u64;
        let mut frames_skipped = 0u64;

        let end = loop {
            if sink.is_closed() {
                break SessionEnd::Disconnected;
            }

            let now = Instant::now();
            if self.config.timeout_enabled()
                && now.duration_since(last_new_frame_at) > self.config.stale_timeout
            {
                warn!(key = %self.key, timeout_secs = self.config.stale_timeout.as_secs_f64(), "stream timed out waiting for frames");
                break SessionEnd::TimedOut;
            }

            let Some(record) = self.store.read(&self.key) else {
                self.transition(StreamState::AwaitingFirstFrame);
                sleep(self.config.idle_poll_interval).await;
                continue;
            };

            if last_delivered_seq == Some(record.seq) {
                sleep(self.config.new_frame_poll_interval).await;
                continue;
            }

            last_new_frame_at = now;
            if let Some(pending) = pending_seq {
                if pending != record.seq {
                    frames_skipped += 1;
                }
            }

            if let Some(sent_at) = last_sent_at {
                let elapsed = now.duration_since(sent_at);
                if elapsed < min_interval {
                    // Re-read after the wait: a fresher frame may replace this one.
                    // Long waits are sliced so a departed viewer is still noticed.
                    pending_seq = Some(record.seq);
                    self.transition(StreamState::RateLimitedWait);
                    sleep((min_interval - elapsed).min(self.config.idle_poll_interval)).await;
                    continue;
                }
            }

            if sink.send_chunk(encode_part(&record.payload)).await.is_err() {
                break SessionEnd::Disconnected;
            }
            last_sent_at = Some(Instant::now());
            last_delivered_seq = Some(record.seq);
            pending_seq = None;
            chunks_sent += 1;
            self.transition(StreamState::Streaming);
        };

        self.transition(match end {
            SessionEnd::TimedOut => StreamState::TimedOut,
            SessionEnd::Disconnected => StreamState::Disconnected,
        });
        info!(key = %self.key, end = ?end, chunks_sent, frames_skipped, "stream session ended");

        SessionSummary {
            end,
            chunks_sent,
            frames_skipped,
        }
    }
}
