//! Shared helpers for the offsetlog benchmarks.

pub mod utils;
