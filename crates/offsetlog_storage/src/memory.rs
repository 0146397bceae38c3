//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral logs that don't need persistence
///
/// Handles created with [`InMemoryBackend::share`] see the same bytes, which
/// lets a test hand one handle to a log, drop the log, and reopen a new log
/// over the surviving bytes as if the process had restarted.
///
/// # Example
///
/// ```rust
/// use offsetlog_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns another handle over the same bytes.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn reopen_through_shared_handle_after_writer_drops() {
        let mut writer = InMemoryBackend::new();
        let survivor = writer.share();

        assert_eq!(writer.append(b"first").unwrap(), 0);
        assert_eq!(writer.append(b"second").unwrap(), 5);
        drop(writer);

        let mut reopened = survivor.share();
        assert_eq!(reopened.size().unwrap(), 11);
        assert_eq!(reopened.append(b"!").unwrap(), 11);
        assert_eq!(survivor.data(), b"firstsecond!");
    }

    #[test]
    fn torn_tail_truncation_is_visible_to_every_handle() {
        let mut backend = InMemoryBackend::with_data(b"complete".to_vec());
        let observer = backend.share();

        let torn_at = backend.append(b"half-wr").unwrap();
        backend.truncate(torn_at).unwrap();

        assert_eq!(observer.size().unwrap(), 8);
        assert!(matches!(
            observer.read_at(torn_at, 1),
            Err(StorageError::ReadPastEnd { offset: 8, len: 1, size: 8 })
        ));
        assert!(matches!(
            backend.truncate(9),
            Err(StorageError::TruncatePastEnd { requested: 9, size: 8 })
        ));
    }

    #[test]
    fn read_range_must_lie_inside_the_data() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());

        assert_eq!(backend.read_at(1, 3).unwrap(), b"ell");
        assert!(backend.read_at(5, 0).unwrap().is_empty());
        assert!(matches!(backend.read_at(3, 10), Err(StorageError::ReadPastEnd { .. })));
        assert!(matches!(backend.read_at(6, 0), Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn shared_reader_sees_appends_from_another_thread() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.share();

        let handle = thread::spawn(move || {
            for i in 0..100u8 {
                writer.append(&[i]).unwrap();
                writer.sync().unwrap();
            }
        });
        handle.join().unwrap();

        let expected: Vec<u8> = (0..100).collect();
        assert_eq!(reader.read_at(0, 100).unwrap(), expected);
    }
}
