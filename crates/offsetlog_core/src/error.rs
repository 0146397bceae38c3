//! Error types for the offset log.

use crate::types::Offset;
use offsetlog_codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for frame encoding and parsing.
pub type FrameResult<T> = Result<T, FrameError>;

/// Errors produced by the pure framing functions in [`crate::frame`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The buffer ends before the frame does.
    #[error("incomplete frame: need {needed} bytes, {available} available")]
    Incomplete {
        /// Bytes required from the frame boundary.
        needed: u64,
        /// Bytes actually present.
        available: u64,
    },

    /// The bytes cannot be a valid frame.
    #[error("corrupt frame: {reason}")]
    Corrupt {
        /// What failed to validate.
        reason: String,
    },

    /// Frames must carry at least one payload byte.
    #[error("empty payload cannot be framed")]
    EmptyPayload,

    /// Payload does not fit the 32-bit length field.
    #[error("payload of {len} bytes exceeds the frame limit of {max}")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Largest allowed payload.
        max: usize,
    },
}

impl FrameError {
    /// Creates a corrupt frame error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur in offset log operations.
///
/// `Encode` and `Decode` are local to one record; the log stays usable.
/// `Open`, `Storage` and `Io` are fatal to the handle that hit them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The codec rejected a value on append. The log is unchanged.
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),

    /// A stored payload could not be decoded.
    #[error("decode failed for record at {offset}: {source}")]
    Decode {
        /// Offset of the record.
        offset: Offset,
        /// Codec failure.
        #[source]
        source: CodecError,
    },

    /// A frame failed validation. Never skipped.
    #[error("corrupt frame at offset {offset}: {reason}")]
    CorruptFrame {
        /// Where the frame starts (or ends, when scanning backward).
        offset: u64,
        /// What failed to validate.
        reason: String,
    },

    /// A frame runs past the end of the readable bytes.
    #[error("incomplete frame at offset {offset}: need {needed} bytes, {available} available")]
    IncompleteFrame {
        /// Where the frame starts.
        offset: u64,
        /// Bytes the frame needs.
        needed: u64,
        /// Bytes present before the end.
        available: u64,
    },

    /// Offset or sequence number beyond what has been appended.
    #[error("{requested} is out of range (limit {limit})")]
    OutOfRange {
        /// Requested position.
        requested: u64,
        /// First position that does not exist yet.
        limit: u64,
    },

    /// Opening the log failed.
    #[error("failed to open log at {}: {source}", path.display())]
    Open {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: Box<CoreError>,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] offsetlog_storage::StorageError),

    /// I/O error outside the backend (snapshots).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An earlier storage failure left the writer unusable.
    #[error("log is poisoned by an earlier write failure")]
    Poisoned,

    /// The log has been closed.
    #[error("log is closed")]
    Closed,

    /// The request itself is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A sequence view snapshot is missing, corrupt, or stale.
    #[error("snapshot error: {message}")]
    Snapshot {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt frame error.
    pub fn corrupt_frame(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptFrame {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Places a frame error at an absolute log offset.
    pub fn from_frame(offset: u64, err: FrameError) -> Self {
        match err {
            FrameError::Incomplete { needed, available } => Self::IncompleteFrame {
                offset,
                needed,
                available,
            },
            FrameError::Corrupt { reason } => Self::CorruptFrame { offset, reason },
            other => Self::invalid_argument(other.to_string()),
        }
    }

    /// Returns true if the error concerns a single record and leaves the log
    /// usable.
    #[must_use]
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_to_offsets() {
        let err = CoreError::from_frame(
            40,
            FrameError::Incomplete {
                needed: 12,
                available: 3,
            },
        );
        assert!(matches!(
            err,
            CoreError::IncompleteFrame {
                offset: 40,
                needed: 12,
                available: 3
            }
        ));

        let err = CoreError::from_frame(8, FrameError::corrupt("checksum mismatch"));
        assert!(matches!(err, CoreError::CorruptFrame { offset: 8, .. }));
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn record_local_classification() {
        assert!(CoreError::Encode(CodecError::NonFiniteFloat).is_record_local());
        assert!(CoreError::Decode {
            offset: Offset::new(0),
            source: CodecError::UnexpectedEof,
        }
        .is_record_local());
        assert!(!CoreError::Poisoned.is_record_local());
        assert!(!CoreError::corrupt_frame(0, "bad").is_record_local());
    }

    #[test]
    fn open_error_names_path() {
        let err = CoreError::Open {
            path: PathBuf::from("/tmp/x.log"),
            source: Box::new(CoreError::Closed),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.log"));
        assert!(msg.contains("closed"));
    }
}
