//! Get command implementation.

use super::open_reader;
use offsetlog_core::{CodecKind, Offset};
use std::path::Path;

/// Runs the get command. The log file is opened read-only.
pub fn run(path: &Path, codec: CodecKind, offset: u64) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("log file not found: {}", path.display()).into());
    }

    let log = open_reader(path, codec)?;
    let value = log.get(Offset::new(offset))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
