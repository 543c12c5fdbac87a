use crate::store::StreamKey;

/// Errors surfaced by the relay core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// No frame has ever been written for this key
    #[error("no frame available for {0}")]
    FrameNotFound(StreamKey),

    /// The viewer side of a stream went away
    #[error("viewer disconnected")]
    ViewerDisconnected,

    /// A producer sent something that is not a frame
    #[error("malformed ingest message: {0}")]
    MalformedMessage(String),

    /// The producer's connection failed mid-stream
    #[error("producer transport error: {0}")]
    Transport(String),
}
