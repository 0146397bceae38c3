//! Crash simulation for offset logs.
//!
//! [`CrashableBackend`] wraps another backend and fails once a byte budget
//! is spent, leaving a partial write behind like a power cut mid-append.
//! The bytes that did land stay in the wrapped backend, so reopening over a
//! shared [`InMemoryBackend`] handle shows exactly what a restart would see.
//!
//! ## Test Strategy
//!
//! 1. **Crash during append** - a torn final frame is truncated on reopen
//! 2. **Crash before append** - nothing is written, nothing is lost
//! 3. **Failed sync** - the append is rolled back and the log poisoned
//! 4. **Slow sync** - readers keep going while an append waits on storage

use offsetlog_codec::Value;
use offsetlog_core::{CoreResult, LogConfig, Offset, OffsetLog};
use offsetlog_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared switches for a [`CrashableBackend`].
///
/// The backend moves into the log; keep this handle to arm it afterwards.
#[derive(Debug, Default)]
pub struct CrashControl {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
    sync_delay_ms: AtomicU64,
    syncs_started: AtomicUsize,
}

impl CrashControl {
    fn new() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    /// Crashes once `bytes` more bytes have been written.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush and sync fail. These failures are transient and
    /// do not count as a crash.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Makes every sync sleep for `delay` before reaching storage.
    pub fn set_sync_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.sync_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of syncs that have started, including ones still sleeping.
    pub fn syncs_started(&self) -> usize {
        self.syncs_started.load(Ordering::SeqCst)
    }

    /// Disarms every failure and delay.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
        self.sync_delay_ms.store(0, Ordering::SeqCst);
    }

    /// Returns whether a simulated crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Total bytes the wrapped backend accepted.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<CrashControl>,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            control: Arc::new(CrashControl::new()),
        }
    }

    /// Returns the handle used to arm failures.
    pub fn control(&self) -> Arc<CrashControl> {
        Arc::clone(&self.control)
    }

    fn crash(&self, what: &str) -> StorageError {
        self.control.crashed.store(true, Ordering::SeqCst);
        io_error(format!("simulated crash during {what}"))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let written = self.control.bytes_written.load(Ordering::SeqCst);
        let threshold = self.control.crash_after_bytes.load(Ordering::SeqCst);

        if written >= threshold {
            return Err(self.crash("write"));
        }

        // Write partial data up to the crash point
        if written + data.len() > threshold {
            let partial = threshold - written;
            if partial > 0 {
                self.inner.append(&data[..partial])?;
                self.control
                    .bytes_written
                    .fetch_add(partial, Ordering::SeqCst);
            }
            return Err(self.crash("partial write"));
        }

        let offset = self.inner.append(data)?;
        self.control
            .bytes_written
            .fetch_add(data.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&self) -> StorageResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(io_error("simulated flush failure".into()));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&self) -> StorageResult<()> {
        self.control.syncs_started.fetch_add(1, Ordering::SeqCst);
        let delay = self.control.sync_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(io_error("simulated sync failure".into()));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        // A crashed device accepts nothing, not even a rollback.
        if self.control.has_crashed() {
            return Err(self.crash("truncate"));
        }
        self.inner.truncate(new_size)
    }
}

fn io_error(message: String) -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, message))
}

/// A log over a crashable in-memory backend, plus the handles needed to
/// crash it and look at what survived.
pub struct CrashHarness {
    /// The log under test.
    pub log: OffsetLog,
    /// Arms failures in the log's backend.
    pub control: Arc<CrashControl>,
    /// The bytes behind the log, readable after a crash.
    pub bytes: InMemoryBackend,
}

impl CrashHarness {
    /// Opens a JSON log over fresh crashable memory.
    pub fn new() -> CoreResult<Self> {
        Self::with_config(LogConfig::default())
    }

    /// Opens a JSON log with the given configuration.
    pub fn with_config(config: LogConfig) -> CoreResult<Self> {
        let bytes = InMemoryBackend::new();
        let backend = CrashableBackend::new(Box::new(bytes.share()));
        let control = backend.control();
        let log = OffsetLog::open_with_backend(
            Box::new(backend),
            Arc::new(offsetlog_codec::JsonCodec::new()),
            config,
        )?;
        Ok(Self {
            log,
            control,
            bytes,
        })
    }

    /// Appends every value, returning their offsets.
    pub fn append_values(&self, values: &[Value]) -> CoreResult<Vec<Offset>> {
        values.iter().map(|v| self.log.append(v)).collect()
    }

    /// Drops the log without letting it tidy up, and reopens the surviving
    /// bytes as a restarted process would.
    pub fn restart(self) -> CoreResult<OffsetLog> {
        let bytes = self.bytes.share();
        drop(self.log);
        OffsetLog::open_with_backend(
            Box::new(bytes),
            Arc::new(offsetlog_codec::JsonCodec::new()),
            LogConfig::default(),
        )
    }
}
