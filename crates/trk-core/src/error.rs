//! Error types for TRK reading.

use std::io;

/// Errors that can occur while indexing or extracting streamlines.
#[derive(Debug, thiserror::Error)]
pub enum TrkError {
    /// The fixed header failed validation. The file is unusable.
    #[error("malformed TRK header: {reason}")]
    MalformedHeader { reason: String },

    /// A record declares more bytes than remain in the file.
    #[error(
        "streamline {index} at byte {offset} is truncated: needs {expected} bytes, {available} available"
    )]
    TruncatedRecord {
        index: usize,
        offset: u64,
        expected: u64,
        available: u64,
    },

    /// A record carries a point count that cannot describe any streamline.
    #[error("streamline {index} at byte {offset} has invalid point count {point_count}")]
    CorruptRecord {
        index: usize,
        offset: u64,
        point_count: i32,
    },

    /// The index and the bytes handed to the decoder disagree.
    #[error("decode out of range: record needs {needed} bytes, slice has {available}")]
    DecodeOutOfRange { needed: usize, available: usize },

    /// Requested streamline index is outside `[0, len)`.
    #[error("streamline index {index} out of range (collection holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A buffer for the requested selection could not be allocated.
    #[error("insufficient memory: {requested} bytes requested")]
    InsufficientMemory { requested: u64 },

    /// The header's streamline count disagrees with the scanned count.
    #[error("header declares {declared} streamlines, file holds {found}")]
    CountMismatch { declared: usize, found: usize },

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TrkError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TrkError::MalformedHeader {
            reason: reason.into(),
        }
    }
}

/// Result type alias for TRK operations.
pub type Result<T> = std::result::Result<T, TrkError>;
