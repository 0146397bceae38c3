//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
///
/// Whether an error is an encode or a decode failure follows from the
/// operation that produced it; the log keeps the two apart when it wraps
/// them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The value holds a type the codec cannot represent.
    #[error("unsupported type for {codec}: {type_name}")]
    UnsupportedType {
        /// Codec that rejected the value.
        codec: &'static str,
        /// Name of the unsupported type.
        type_name: String,
    },

    /// NaN and infinities have no stable encoding.
    #[error("non-finite float values are forbidden")]
    NonFiniteFloat,

    /// A map holds the same key twice.
    #[error("duplicate map key: {key:?}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// Nesting exceeds [`crate::MAX_DEPTH`].
    #[error("nesting deeper than {max} levels")]
    DepthLimitExceeded {
        /// Maximum permitted depth.
        max: usize,
    },

    /// Encoded or claimed size exceeds the configured maximum.
    #[error("size limit exceeded: {size} bytes, maximum is {max}")]
    SizeLimitExceeded {
        /// Size that was produced or claimed.
        size: u64,
        /// Maximum permitted size.
        max: u64,
    },

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remain after a complete value was decoded.
    #[error("{count} trailing bytes after value")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        count: usize,
    },

    /// Invalid structure for the codec's format.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Integer outside the signed 64-bit range.
    #[error("integer overflow")]
    IntegerOverflow,
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(codec: &'static str, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            codec,
            type_name: type_name.into(),
        }
    }
}
