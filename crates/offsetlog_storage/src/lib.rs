//! # offsetlog Storage
//!
//! Backing storage for the offsetlog append-only log.
//!
//! Storage backends are **opaque byte stores** - they do not interpret
//! the data they store. Frames, checksums and records are owned by
//! `offsetlog_core`.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, truncate, flush, sync)
//! - No knowledge of frame layout or codecs
//! - Must be `Send + Sync` so a log handle can be shared across threads
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral logs
//! - [`FileBackend`] - For persistent logs using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use offsetlog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
