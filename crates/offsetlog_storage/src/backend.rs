//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level, append-growable byte store backing one log.
///
/// Backends are **opaque byte stores**. The log owns all interpretation of
/// the bytes; a backend only knows how to read a range, append at the end,
/// cut the end off, and push data to durable storage.
///
/// # Invariants
///
/// - `append` returns the offset where data was written, which always equals
///   `size()` before the call
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `truncate` only shrinks; it is used to drop a torn tail
/// - `sync` makes all appended bytes survive process termination
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. A failed append may have
    /// written a prefix of `data`.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// Takes `&self` so it can run alongside reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush`: after it returns, the
    /// appended bytes and the file length survive a power loss. Like
    /// `flush` it takes `&self`; a slow sync must not hold up readers.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
