//! Append command implementation.

use super::open_log;
use offsetlog_core::{CodecKind, Value};
use std::path::Path;

/// Runs the append command.
pub fn run(path: &Path, codec: CodecKind, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(json)?;

    let log = open_log(path, codec)?;
    let offset = log.append(&value)?;
    log.close()?;

    println!("{offset}");
    Ok(())
}
