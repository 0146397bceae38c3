//! # offsetlog Testkit
//!
//! Test utilities for offsetlog.
//!
//! This crate provides:
//! - Test fixtures and log helpers
//! - Property-based test generators using proptest
//! - Crash simulation over a wrapping storage backend
//! - Stress testing utilities
//! - Byte-level test vectors for payloads and frames
//!
//! ## Usage
//!
//! ```rust
//! use offsetlog_testkit::prelude::*;
//!
//! let (log, offsets) = scenarios::populated_log(3);
//! assert_eq!(offsets.len(), 3);
//! assert!(log.get(offsets[2]).is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use vectors::*;
