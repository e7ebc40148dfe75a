use std::path::PathBuf;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (open, read or write failure).
    #[error("transport error: {0}")]
    Transport(#[from] relaylink_transport::TransportError),

    /// Frame-level error, including local argument validation.
    #[error("frame error: {0}")]
    Frame(#[from] relaylink_frame::FrameError),

    /// Command issued while the link is not connected.
    #[error("relay board not connected")]
    NotConnected,

    /// The reply answers a different function than the request.
    #[error("reply function 0x{actual:02X} does not match request 0x{expected:02X}")]
    ResponseMismatch { expected: u8, actual: u8 },

    /// No reply arrived in time.
    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    /// Board configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
