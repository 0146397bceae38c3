//! CLI command implementations.

pub mod append;
pub mod dump;
pub mod example;
pub mod get;
pub mod verify;

use offsetlog_core::{CodecKind, CoreError, CoreResult, LogConfig, LogReader, OffsetLog};
use offsetlog_storage::FileBackend;
use std::path::Path;

/// Opens (or creates) the log at `path` with a built-in codec.
pub fn open_log(path: &Path, codec: CodecKind) -> CoreResult<OffsetLog> {
    OffsetLog::open(
        path,
        codec.build(offsetlog_codec::DEFAULT_MAX_ENCODED_SIZE),
        LogConfig::default(),
    )
}

/// Opens the existing log at `path` for reading. The file is never modified,
/// not even to drop a torn tail.
pub fn open_reader(path: &Path, codec: CodecKind) -> CoreResult<LogReader> {
    let wrap = |source: CoreError| CoreError::Open {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let backend = FileBackend::open_read_only(path).map_err(|e| wrap(e.into()))?;
    LogReader::open_with_backend(
        Box::new(backend),
        codec.build(offsetlog_codec::DEFAULT_MAX_ENCODED_SIZE),
        LogConfig::default(),
    )
    .map_err(wrap)
}
