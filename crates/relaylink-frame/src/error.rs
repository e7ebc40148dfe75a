/// Errors that can occur while building, validating or transferring frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Board address 0 is reserved.
    #[error("invalid board address 0 (must be 1-255)")]
    InvalidAddress,

    /// Circuit count is not one of 8, 16, 24 or 32.
    #[error("invalid circuit count {0} (must be 8, 16, 24 or 32)")]
    InvalidCircuitCount(u8),

    /// Circuit index outside `1..=count`.
    #[error("circuit {index} out of range (board has {count} circuits)")]
    IndexOutOfRange { index: u8, count: u8 },

    /// A per-circuit sequence does not cover every circuit.
    #[error("expected {expected} circuit values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Trailing checksum byte does not match the frame contents.
    #[error("checksum mismatch (computed 0x{expected:02X}, frame carries 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The frame does not start with the expected header byte.
    #[error("unexpected header byte 0x{0:02X}")]
    InvalidHeader(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed by the other side.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
