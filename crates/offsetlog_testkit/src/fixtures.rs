//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up test logs and common test
//! scenarios.

use offsetlog_codec::{Codec, JsonCodec, Value};
use offsetlog_core::{LogConfig, Offset, OffsetLog};
use offsetlog_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test log with automatic cleanup.
pub struct TestLog {
    /// The log instance.
    pub log: OffsetLog,
    codec: Arc<dyn Codec>,
    storage: Storage,
}

enum Storage {
    Memory(InMemoryBackend),
    File { dir: TempDir, path: PathBuf },
}

impl TestLog {
    /// Creates a new in-memory JSON log.
    pub fn memory() -> Self {
        Self::memory_with(Arc::new(JsonCodec::new()), LogConfig::default())
    }

    /// Creates a new in-memory log with the given codec and configuration.
    pub fn memory_with(codec: Arc<dyn Codec>, config: LogConfig) -> Self {
        let bytes = InMemoryBackend::new();
        let log = OffsetLog::open_with_backend(Box::new(bytes.share()), Arc::clone(&codec), config)
            .expect("Failed to open in-memory log");
        Self {
            log,
            codec,
            storage: Storage::Memory(bytes),
        }
    }

    /// Creates a new file-based JSON log in a temporary directory.
    pub fn file() -> Self {
        Self::file_with(Arc::new(JsonCodec::new()), LogConfig::default())
    }

    /// Creates a new file-based log with the given codec and configuration.
    pub fn file_with(codec: Arc<dyn Codec>, config: LogConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("test.log");
        let log = OffsetLog::open(&path, Arc::clone(&codec), config).expect("Failed to open file log");
        Self {
            log,
            codec,
            storage: Storage::File { dir, path },
        }
    }

    /// Returns the log path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::File { path, .. } => Some(path),
        }
    }

    /// Returns the temporary directory if file-based.
    pub fn dir(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::File { dir, .. } => Some(dir.path()),
        }
    }

    /// Returns the raw log bytes.
    pub fn bytes(&self) -> Vec<u8> {
        match &self.storage {
            Storage::Memory(bytes) => bytes.data(),
            Storage::File { path, .. } => std::fs::read(path).expect("Failed to read log file"),
        }
    }

    /// Replaces the raw log bytes. Only meaningful while the log is closed;
    /// pair with [`Self::reopen`].
    pub fn set_bytes(&self, data: &[u8]) {
        match &self.storage {
            Storage::Memory(bytes) => {
                use offsetlog_storage::StorageBackend;
                let mut bytes = bytes.share();
                bytes.truncate(0).expect("Failed to clear memory log");
                bytes.append(data).expect("Failed to write memory log");
            }
            Storage::File { path, .. } => {
                std::fs::write(path, data).expect("Failed to write log file");
            }
        }
    }

    /// Closes the log and opens it again over the same bytes.
    pub fn reopen(self) -> offsetlog_core::CoreResult<Self> {
        self.reopen_with(LogConfig::default())
    }

    /// Closes the log and opens it again with another configuration.
    pub fn reopen_with(self, config: LogConfig) -> offsetlog_core::CoreResult<Self> {
        let Self {
            log,
            codec,
            storage,
        } = self;
        drop(log);

        let log = match &storage {
            Storage::Memory(bytes) => {
                OffsetLog::open_with_backend(Box::new(bytes.share()), Arc::clone(&codec), config)?
            }
            Storage::File { path, .. } => OffsetLog::open(path, Arc::clone(&codec), config)?,
        };
        Ok(Self {
            log,
            codec,
            storage,
        })
    }

    /// Appends every value, returning their offsets.
    pub fn append_values(&self, values: &[Value]) -> Vec<Offset> {
        values
            .iter()
            .map(|v| self.log.append(v).expect("Failed to append"))
            .collect()
    }
}

impl std::ops::Deref for TestLog {
    type Target = OffsetLog;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Runs a test with a temporary in-memory log.
///
/// # Example
///
/// ```rust
/// use offsetlog_testkit::with_temp_log;
/// use offsetlog_codec::Value;
///
/// with_temp_log(|log| {
///     let offset = log.append(&Value::Bool(true)).unwrap();
///     assert_eq!(log.get(offset).unwrap(), Value::Bool(true));
/// });
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&OffsetLog) -> R,
{
    let test_log = TestLog::memory();
    f(&test_log.log)
}

/// Runs a test with a temporary file-based log.
pub fn with_file_log<F, R>(f: F) -> R
where
    F: FnOnce(&OffsetLog, &Path) -> R,
{
    let test_log = TestLog::file();
    let path = test_log.path().expect("File log should have a path").to_path_buf();
    f(&test_log.log, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// The demonstration values, in append order.
    pub fn sample_values() -> Vec<Value> {
        vec![
            Value::from("whut"),
            Value::map([("greets", "hello!")]),
            Value::map([("test", "1")]),
            Value::Bool(true),
            Value::map([("test", 2i64)]),
            Value::map([("test", 32i64)]),
            Value::map([("abc", true), ("more", false)]),
        ]
    }

    /// Creates a log holding `count` small records.
    pub fn populated_log(count: usize) -> (TestLog, Vec<Offset>) {
        let test_log = TestLog::memory();
        let values: Vec<_> = (0..count)
            .map(|i| Value::map([("index", i as i64)]))
            .collect();
        let offsets = test_log.append_values(&values);
        (test_log, offsets)
    }
}
