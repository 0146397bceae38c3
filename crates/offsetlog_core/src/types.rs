//! Core type definitions for the offset log.

use offsetlog_codec::Value;
use std::fmt;

/// Byte position of a record in the log.
///
/// An offset is the record's durable identifier. Offsets of successive
/// appends are strictly increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(pub u64);

impl Offset {
    /// The start of the log.
    pub const ZERO: Offset = Offset(0);

    /// Creates a new offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Returns the raw byte position.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the offset `len` bytes further on.
    #[must_use]
    pub const fn advance(self, len: u64) -> Self {
        Self(self.0 + len)
    }
}

impl From<u64> for Offset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical append position: 0 for the first record, 1 for the second, ...
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq(pub u64);

impl Seq {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// A decoded record and where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Where the record's frame starts.
    pub offset: Offset,
    /// The decoded value.
    pub value: Value,
    /// Total frame length including overhead.
    pub frame_len: u32,
}

impl Record {
    /// Offset of the record that follows this one.
    #[must_use]
    pub fn next_offset(&self) -> Offset {
        self.offset.advance(u64::from(self.frame_len))
    }
}
