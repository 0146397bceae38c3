//! Example command implementation.

use super::open_log;
use offsetlog_core::{CodecKind, SequencePolicy, Value};
use std::path::Path;

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

/// Runs the example command.
///
/// Appends the sample values one after another and stops at the first
/// failure.
pub fn run(path: &Path, codec: CodecKind) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path, codec)?;
    let values = sample_values();

    let report = log.append_all(&values, SequencePolicy::AbortOnError)?;
    for (offset, value) in report.offsets.iter().zip(&values) {
        println!("{offset:>8}  {}", serde_json::to_string(value)?);
    }

    log.close()?;
    println!("done!");
    Ok(())
}
