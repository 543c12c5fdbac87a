//! Frame Relay - latest-frame-wins store for live camera feeds
//!
//! Producers overwrite one slot per (device, stream) key; viewers read the
//! slot as a snapshot, as a presence listing, or as a rate-limited
//! `multipart/x-mixed-replace` stream. Nothing is queued: a slow viewer
//! skips superseded frames instead of buffering them.
//!
//! This crate has no HTTP dependencies; transports plug in through
//! [`ChunkSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use frame_relay::{FrameStore, Multiplexer, StreamConfig, StreamKey};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(FrameStore::new());
//!     let key = StreamKey::new("kirox-001", "front");
//!
//!     store.write(&key, std::fs::read("frame.jpg").unwrap());
//!
//!     let (mut tx, mut rx) = tokio::sync::mpsc::channel::<bytes::Bytes>(1);
//!     tokio::spawn(async move {
//!         while let Some(part) = rx.recv().await {
//!             println!("part of {} bytes", part.len());
//!         }
//!     });
//!
//!     let summary = Multiplexer::new(store, key, StreamConfig::default())
//!         .run(&mut tx)
//!         .await;
//!     println!("session ended: {:?}", summary.end);
//! }
//! ```

mod error;
pub mod multiplexer;
pub mod presence;
pub mod retention;
mod snapshot;
pub mod store;

pub use error::RelayError;
pub use multiplexer::{
    ChunkSink, Multiplexer, STREAM_CONTENT_TYPE, SessionEnd, SessionSummary, StreamConfig,
    StreamState, encode_part,
};
pub use presence::{DEFAULT_PRESENCE_THRESHOLD, PresenceEntry, presence};
pub use retention::{RetentionPolicy, run_sweeper};
pub use snapshot::snapshot;
pub use store::{FrameRecord, FrameStore, StreamKey};
