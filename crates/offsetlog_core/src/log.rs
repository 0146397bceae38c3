//! The offset log: append, point reads, streams, recovery.

use crate::config::{FlushPolicy, LogConfig, SequencePolicy};
use crate::error::{CoreError, CoreResult, FrameError};
use crate::frame;
use crate::scan::{scan_log, FrameScanner, RawFrame, ScanEnd};
use crate::stream::{FrameIter, LogStream, StreamOptions};
use crate::types::{Offset, Record};
use offsetlog_codec::{Codec, Value};
use offsetlog_storage::{FileBackend, StorageBackend, StorageError};
use parking_lot::{Condvar, Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cursor state published to readers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CursorState {
    /// End of the last committed frame.
    pub(crate) write: u64,
    /// End of the last frame known to be synced.
    pub(crate) durable: u64,
    pub(crate) closed: bool,
}

/// State shared by the writer, readers and streams.
pub(crate) struct LogShared {
    pub(crate) backend: RwLock<Box<dyn StorageBackend>>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) config: LogConfig,
    pub(crate) cursor: Mutex<CursorState>,
    /// Signalled whenever the cursor advances or the log closes.
    pub(crate) appended: Condvar,
}

impl LogShared {
    fn new(
        backend: Box<dyn StorageBackend>,
        codec: Arc<dyn Codec>,
        config: LogConfig,
        write: u64,
    ) -> Self {
        Self {
            backend: RwLock::new(backend),
            codec,
            config,
            cursor: Mutex::new(CursorState {
                write,
                durable: write,
                closed: false,
            }),
            appended: Condvar::new(),
        }
    }

    /// The published write cursor, or `Closed`.
    pub(crate) fn published(&self) -> CoreResult<u64> {
        let state = self.cursor.lock();
        if state.closed {
            return Err(CoreError::Closed);
        }
        Ok(state.write)
    }

    pub(crate) fn decode(&self, raw: RawFrame) -> CoreResult<Record> {
        let offset = Offset::new(raw.offset);
        let value = self
            .codec
            .decode(&raw.payload)
            .map_err(|source| CoreError::Decode { offset, source })?;
        Ok(Record {
            offset,
            value,
            frame_len: raw.frame_len,
        })
    }
}

/// Read-only handle on a log.
///
/// Cheap to clone. Readers see every append committed before the call and
/// never see a partially written frame.
#[derive(Clone)]
pub struct LogReader {
    pub(crate) shared: Arc<LogShared>,
}

impl LogReader {
    /// Opens a read-only view of the log in `backend`.
    ///
    /// Nothing is written: a torn tail is left in place and lies beyond the
    /// write cursor. No handle can append, so live streams only end when
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Same as [`OffsetLog::open_with_backend`].
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        codec: Arc<dyn Codec>,
        config: LogConfig,
    ) -> CoreResult<Self> {
        let start = config.start_offset_hint.map_or(0, Offset::as_u64);
        let report = scan_log(backend.as_ref(), start, config.read_buffer_size)?;

        match report.end {
            ScanEnd::Clean => {}
            ScanEnd::TornTail { offset, .. } => {
                warn!(
                    offset,
                    ignored_bytes = report.trailing_bytes(),
                    "leaving torn tail in read-only log"
                );
            }
            ScanEnd::Corrupt { offset, reason } => {
                return Err(CoreError::CorruptFrame { offset, reason });
            }
        }

        info!(
            codec = codec.name(),
            records_scanned = report.records,
            write_cursor = report.valid_end,
            "opened log read-only"
        );
        Ok(Self {
            shared: Arc::new(LogShared::new(backend, codec, config, report.valid_end)),
        })
    }

    /// Reads the value of the record at `offset`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`].
    pub fn get(&self, offset: Offset) -> CoreResult<Value> {
        self.read(offset).map(|record| record.value)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `offset` is at or past the write cursor
    /// - `CorruptFrame` if no valid frame starts at `offset`
    /// - `Decode` if the payload fails to decode
    /// - `Closed` after the log is closed
    pub fn read(&self, offset: Offset) -> CoreResult<Record> {
        let limit = self.shared.published()?;
        if offset.as_u64() >= limit {
            return Err(CoreError::OutOfRange {
                requested: offset.as_u64(),
                limit,
            });
        }

        let raw = {
            let backend = self.shared.backend.read();
            FrameScanner::new(0).next(&**backend, offset.as_u64(), limit)
        };
        match raw {
            Ok(Some(raw)) => self.shared.decode(raw),
            Ok(None) => Err(CoreError::OutOfRange {
                requested: offset.as_u64(),
                limit,
            }),
            Err(CoreError::IncompleteFrame { offset, .. }) => Err(CoreError::corrupt_frame(
                offset,
                "frame extends past the write cursor",
            )),
            Err(e) => Err(e),
        }
    }

    /// Opens a stream over the log.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `reverse` combined with `live` or
    /// `until`, `OutOfRange` for a start past the write cursor, and `Closed`
    /// after the log is closed.
    pub fn stream(&self, options: StreamOptions) -> CoreResult<LogStream> {
        LogStream::new(Arc::clone(&self.shared), options)
    }

    /// Walks frame boundaries from `from` up to the current write cursor,
    /// verifying checksums without decoding payloads.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `from` is past the write cursor, or `Closed`.
    pub fn frames(&self, from: Offset) -> CoreResult<FrameIter> {
        FrameIter::new(Arc::clone(&self.shared), from)
    }

    /// End of the last committed frame; the offset the next append gets.
    #[must_use]
    pub fn write_cursor(&self) -> Offset {
        Offset::new(self.shared.cursor.lock().write)
    }

    /// End of the last frame known to be synced to storage.
    #[must_use]
    pub fn durable_offset(&self) -> Offset {
        Offset::new(self.shared.cursor.lock().durable)
    }

    /// Whether the log has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.cursor.lock().closed
    }

    /// The codec records are decoded with.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.shared.codec
    }
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.shared.cursor.lock();
        f.debug_struct("LogReader")
            .field("codec", &self.shared.codec.name())
            .field("write_cursor", &state.write)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

/// Result of [`OffsetLog::append_all`].
#[derive(Debug, Default)]
pub struct AppendReport {
    /// Offsets of the values that were appended, in order.
    pub offsets: Vec<Offset>,
    /// Index into the input and error for each value that was not.
    pub failures: Vec<(usize, CoreError)>,
}

impl AppendReport {
    /// True if every value was appended.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
struct WriterState {
    poisoned: bool,
    pending: usize,
}

/// An append-only log of encoded records addressed by byte offset.
///
/// There is one writer per log; appends through a shared `&OffsetLog` are
/// serialized. Use [`OffsetLog::reader`] for read-only handles that can move
/// to other threads.
///
/// # Example
///
/// ```rust
/// use offsetlog_core::{LogConfig, OffsetLog, Value};
/// use offsetlog_codec::JsonCodec;
/// use offsetlog_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// let log = OffsetLog::open_with_backend(
///     Box::new(InMemoryBackend::new()),
///     Arc::new(JsonCodec::new()),
///     LogConfig::default(),
/// )
/// .unwrap();
///
/// let offset = log.append(&Value::from("whut")).unwrap();
/// assert_eq!(log.get(offset).unwrap(), Value::from("whut"));
/// ```
pub struct OffsetLog {
    reader: LogReader,
    writer: Mutex<WriterState>,
    path: Option<PathBuf>,
}

impl OffsetLog {
    /// Opens the log file at `path`, creating it if missing.
    ///
    /// A torn final frame is truncated away; any other invalid frame fails
    /// the open.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Open` wrapping the cause.
    pub fn open(
        path: impl AsRef<Path>,
        codec: Arc<dyn Codec>,
        config: LogConfig,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        let wrap = |source: CoreError| CoreError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let backend = if config.create_dirs {
            FileBackend::open_with_create_dirs(path)
        } else {
            FileBackend::open(path)
        }
        .map_err(|e| wrap(e.into()))?;

        let mut log = Self::open_with_backend(Box::new(backend), codec, config).map_err(wrap)?;
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    /// Opens a log over any storage backend.
    ///
    /// # Errors
    ///
    /// Returns `CorruptFrame` if a frame fails validation, `InvalidArgument`
    /// if the start hint lies past the end, or a storage error.
    pub fn open_with_backend(
        mut backend: Box<dyn StorageBackend>,
        codec: Arc<dyn Codec>,
        config: LogConfig,
    ) -> CoreResult<Self> {
        let start = config.start_offset_hint.map_or(0, Offset::as_u64);
        let report = scan_log(backend.as_ref(), start, config.read_buffer_size)?;

        match report.end {
            ScanEnd::Clean => {}
            ScanEnd::TornTail { offset, .. } => {
                warn!(
                    offset,
                    dropped_bytes = report.trailing_bytes(),
                    "truncating torn tail"
                );
                backend.truncate(offset)?;
                backend.sync()?;
            }
            ScanEnd::Corrupt { offset, reason } => {
                return Err(CoreError::CorruptFrame { offset, reason });
            }
        }

        let write = report.valid_end;
        info!(
            codec = codec.name(),
            records_scanned = report.records,
            write_cursor = write,
            "opened log"
        );

        Ok(Self {
            reader: LogReader {
                shared: Arc::new(LogShared::new(backend, codec, config, write)),
            },
            writer: Mutex::new(WriterState::default()),
            path: None,
        })
    }

    /// Appends a value and returns the offset of its frame.
    ///
    /// The value is visible to readers once this returns.
    ///
    /// # Errors
    ///
    /// - `Encode` if the codec rejects the value; the log is unchanged
    /// - `Storage` if the write fails; the log is then poisoned
    /// - `Poisoned` or `Closed` if the writer can no longer append
    pub fn append(&self, value: &Value) -> CoreResult<Offset> {
        let shared = &self.reader.shared;
        let payload = shared.codec.encode(value).map_err(CoreError::Encode)?;
        let bytes = frame::frame(&payload).map_err(|e| match e {
            FrameError::EmptyPayload | FrameError::PayloadTooLarge { .. } => {
                CoreError::invalid_argument(e.to_string())
            }
            other => CoreError::from_frame(0, other),
        })?;

        let mut writer = self.writer.lock();
        if writer.poisoned {
            return Err(CoreError::Poisoned);
        }
        let start = shared.published()?;

        {
            let mut backend = shared.backend.write();
            match backend.append(&bytes) {
                Ok(at) if at == start => {}
                Ok(at) => {
                    let err = CoreError::corrupt_frame(
                        at,
                        format!("backend appended at {at}, write cursor is {start}"),
                    );
                    poison(&mut writer, backend.as_mut(), start, &err);
                    return Err(err);
                }
                Err(e) => {
                    let err = CoreError::Storage(e);
                    poison(&mut writer, backend.as_mut(), start, &err);
                    return Err(err);
                }
            }
        }

        // Readers are bounded by the published cursor, which has not moved
        // yet, so the sync runs under the shared lock.
        let policy = shared.config.flush_policy;
        let persisted = persist(&**shared.backend.read(), &mut writer, policy);
        let synced = match persisted {
            Ok(synced) => synced,
            Err(e) => {
                let err = CoreError::Storage(e);
                poison(&mut writer, shared.backend.write().as_mut(), start, &err);
                return Err(err);
            }
        };

        let end = start + bytes.len() as u64;
        {
            let mut state = shared.cursor.lock();
            state.write = end;
            if synced {
                state.durable = end;
            }
        }
        shared.appended.notify_all();

        debug!(offset = start, frame_len = bytes.len(), synced, "appended record");
        Ok(Offset::new(start))
    }

    /// Appends values strictly in order.
    ///
    /// With [`SequencePolicy::AbortOnError`] the first failure is returned
    /// and nothing after it is appended. With
    /// [`SequencePolicy::ContinueOnError`] record-local failures (encode
    /// errors) are collected in the report; failures that leave the log
    /// unusable still end the batch.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the batch.
    pub fn append_all<'a, I>(&self, values: I, policy: SequencePolicy) -> CoreResult<AppendReport>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut report = AppendReport::default();
        for (index, value) in values.into_iter().enumerate() {
            match self.append(value) {
                Ok(offset) => report.offsets.push(offset),
                Err(e) if policy == SequencePolicy::ContinueOnError && e.is_record_local() => {
                    debug!(index, error = %e, "skipping value in append_all");
                    report.failures.push((index, e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Reads the value of the record at `offset`.
    ///
    /// # Errors
    ///
    /// See [`LogReader::read`].
    pub fn get(&self, offset: Offset) -> CoreResult<Value> {
        self.reader.get(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// See [`LogReader::read`].
    pub fn read(&self, offset: Offset) -> CoreResult<Record> {
        self.reader.read(offset)
    }

    /// Opens a stream over the log.
    ///
    /// # Errors
    ///
    /// See [`LogReader::stream`].
    pub fn stream(&self, options: StreamOptions) -> CoreResult<LogStream> {
        self.reader.stream(options)
    }

    /// Returns a read-only handle.
    #[must_use]
    pub fn reader(&self) -> LogReader {
        self.reader.clone()
    }

    /// End of the last committed frame; the offset the next append gets.
    #[must_use]
    pub fn write_cursor(&self) -> Offset {
        self.reader.write_cursor()
    }

    /// End of the last frame known to be synced to storage.
    #[must_use]
    pub fn durable_offset(&self) -> Offset {
        self.reader.durable_offset()
    }

    /// The codec records are encoded with.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec> {
        self.reader.codec()
    }

    /// Path of the backing file, if opened with [`OffsetLog::open`].
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Syncs every committed frame to storage.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned`, `Closed`, or the storage error.
    pub fn flush(&self) -> CoreResult<()> {
        let shared = &self.reader.shared;
        let mut writer = self.writer.lock();
        if writer.poisoned {
            return Err(CoreError::Poisoned);
        }
        let write = shared.published()?;

        shared.backend.read().sync()?;
        writer.pending = 0;
        shared.cursor.lock().durable = write;

        debug!(durable = write, "flushed log");
        Ok(())
    }

    /// Syncs and closes the log.
    ///
    /// Live streams end; later reads through any handle fail with `Closed`.
    /// Dropping the log closes it too, ignoring sync errors.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the final sync fails. The log is closed
    /// either way.
    pub fn close(self) -> CoreResult<()> {
        self.shutdown()
    }

    fn shutdown(&self) -> CoreResult<()> {
        let shared = &self.reader.shared;
        let mut writer = self.writer.lock();
        if shared.cursor.lock().closed {
            return Ok(());
        }

        let result = if writer.poisoned {
            Ok(())
        } else {
            shared.backend.read().sync().map_err(CoreError::from)
        };
        writer.pending = 0;

        {
            let mut state = shared.cursor.lock();
            if result.is_ok() && !writer.poisoned {
                state.durable = state.write;
            }
            state.closed = true;
        }
        shared.appended.notify_all();

        info!(write_cursor = self.reader.write_cursor().as_u64(), "closed log");
        result
    }
}

impl Drop for OffsetLog {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "sync on drop failed");
        }
    }
}

impl std::fmt::Debug for OffsetLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffsetLog")
            .field("path", &self.path)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

/// Marks the writer unusable and drops whatever part of the failed frame
/// reached storage.
fn poison(
    writer: &mut WriterState,
    backend: &mut dyn StorageBackend,
    start: u64,
    cause: &CoreError,
) {
    writer.poisoned = true;
    if let Ok(size) = backend.size() {
        if size > start {
            if let Err(e) = backend.truncate(start) {
                warn!(offset = start, error = %e, "rollback after failed append failed");
            }
        }
    }
    warn!(offset = start, error = %cause, "append failed, log poisoned");
}

/// Applies the flush policy after an append. Returns whether the bytes were
/// synced.
fn persist(
    backend: &dyn StorageBackend,
    writer: &mut WriterState,
    policy: FlushPolicy,
) -> Result<bool, StorageError> {
    match policy {
        FlushPolicy::SyncEveryWrite => {
            backend.sync()?;
            Ok(true)
        }
        FlushPolicy::Batched { max_pending } => {
            writer.pending += 1;
            if writer.pending >= max_pending.max(1) {
                backend.sync()?;
                writer.pending = 0;
                Ok(true)
            } else {
                backend.flush()?;
                Ok(false)
            }
        }
        FlushPolicy::None => {
            backend.flush()?;
            Ok(false)
        }
    }
}
