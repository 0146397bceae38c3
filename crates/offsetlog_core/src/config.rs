//! Log configuration.

use crate::types::Offset;

/// When appended bytes are pushed to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Sync after every append. An acknowledged append survives a crash.
    #[default]
    SyncEveryWrite,
    /// Sync once `max_pending` appends have accumulated, and on `flush`/`close`.
    Batched {
        /// Appends between syncs.
        max_pending: usize,
    },
    /// Only push to the OS; sync on `flush`/`close`.
    None,
}

/// What a stream does after reporting a record that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// End the stream.
    #[default]
    Stop,
    /// Continue with the next record.
    Skip,
}

/// What `append_all` does when one append fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePolicy {
    /// Stop at the first failure and return it.
    #[default]
    AbortOnError,
    /// Record the failure and keep appending.
    ContinueOnError,
}

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Durability of appends.
    pub flush_policy: FlushPolicy,

    /// Offset of a known-good frame boundary to start the open scan from.
    /// Bytes before it are trusted without verification.
    pub start_offset_hint: Option<Offset>,

    /// Bytes fetched per backend read when scanning and streaming.
    pub read_buffer_size: usize,

    /// Default decode error policy for streams.
    pub decode_error_policy: DecodeErrorPolicy,

    /// Whether `open` creates missing parent directories.
    pub create_dirs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            flush_policy: FlushPolicy::SyncEveryWrite,
            start_offset_hint: None,
            read_buffer_size: 64 * 1024, // 64 KB
            decode_error_policy: DecodeErrorPolicy::Stop,
            create_dirs: true,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flush policy.
    #[must_use]
    pub const fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Sets the offset the open scan starts from.
    #[must_use]
    pub const fn start_offset_hint(mut self, offset: Offset) -> Self {
        self.start_offset_hint = Some(offset);
        self
    }

    /// Sets the read buffer size.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the default decode error policy for streams.
    #[must_use]
    pub const fn decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = policy;
        self
    }

    /// Sets whether missing parent directories are created.
    #[must_use]
    pub const fn create_dirs(mut self, value: bool) -> Self {
        self.create_dirs = value;
        self
    }
}
