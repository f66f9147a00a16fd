//! Wire-level error types.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing or unframing packets.
#[derive(Debug, Error)]
pub enum WireError {
    /// The packet id does not fit the u16 length prefix.
    #[error("packet id too long: {len} bytes (max: {max})")]
    IdTooLong { len: usize, max: usize },

    /// The frame ended before the announced content.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// The frame id is not valid UTF-8.
    #[error("packet id is not valid UTF-8: {0}")]
    InvalidId(#[from] std::str::Utf8Error),

    /// The frame id is not present in the registry.
    #[error("unknown packet id: {0}")]
    UnknownId(String),

    /// IO error from a packet's own read/write routine.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
