//! # offsetlog core
//!
//! Append-only, offset-indexed log of encoded records.
//!
//! This crate provides:
//! - Record framing with length prefixes, CRC-32 and backward links
//! - [`OffsetLog`]: append, point reads, torn-tail recovery at open
//! - [`LogStream`]: forward, backward and live (tailing) streams
//! - [`SequenceView`]: append order to offset, with snapshots
//!
//! Records are addressed by the byte offset of their frame, which never
//! changes once the append returns.
//!
//! ## Example
//!
//! ```rust
//! use offsetlog_core::{LogConfig, OffsetLog, StreamOptions, Value};
//! use offsetlog_codec::CborCodec;
//! use offsetlog_storage::InMemoryBackend;
//! use std::sync::Arc;
//!
//! let log = OffsetLog::open_with_backend(
//!     Box::new(InMemoryBackend::new()),
//!     Arc::new(CborCodec::new()),
//!     LogConfig::default(),
//! )
//! .unwrap();
//!
//! log.append(&Value::from("whut")).unwrap();
//! log.append(&Value::map([("greets", "hello!")])).unwrap();
//!
//! let values: Vec<_> = log
//!     .stream(StreamOptions::new())
//!     .unwrap()
//!     .map(|r| r.unwrap().value)
//!     .collect();
//! assert_eq!(values.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod frame;
mod log;
mod scan;
mod sequence;
mod stream;
mod types;

pub use config::{DecodeErrorPolicy, FlushPolicy, LogConfig, SequencePolicy};
pub use error::{CoreError, CoreResult, FrameError, FrameResult};
pub use log::{AppendReport, LogReader, OffsetLog};
pub use scan::{scan_log, verify, ScanEnd, ScanReport};
pub use sequence::{SequenceFollower, SequenceView, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use stream::{FrameIter, LogStream, StreamCanceller, StreamOptions};
pub use types::{Offset, Record, Seq};

pub use offsetlog_codec::{Codec, CodecKind, Value};
