//! Dump command implementation.

use super::open_reader;
use offsetlog_core::{
    CodecKind, CoreError, DecodeErrorPolicy, LogStream, Offset, Record, StreamOptions, Value,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// Options for the dump command.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Start offset.
    pub from: Option<u64>,
    /// Maximum number of records.
    pub limit: Option<usize>,
    /// Newest first.
    pub reverse: bool,
    /// Keep waiting for new records.
    pub follow: bool,
}

/// One dumped record in JSON output.
#[derive(Debug, Serialize)]
struct RecordInfo<'a> {
    offset: u64,
    frame_len: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Runs the dump command. The log file is opened read-only.
pub fn run(
    path: &Path,
    codec: CodecKind,
    options: &DumpOptions,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("log file not found: {}", path.display()).into());
    }

    let log = open_reader(path, codec)?;
    let stream = log.stream(stream_options(options))?;
    dump(stream, format, &mut io::stdout().lock())?;
    Ok(())
}

/// Records written by [`dump`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DumpCounts {
    decoded: usize,
    undecodable: usize,
}

fn dump(
    stream: LogStream,
    format: &str,
    out: &mut impl Write,
) -> Result<DumpCounts, Box<dyn std::error::Error>> {
    let mut counts = DumpCounts::default();
    for item in stream {
        match item {
            Ok(record) => {
                write_record(out, &record, format)?;
                counts.decoded += 1;
            }
            Err(CoreError::Decode { offset, source }) => {
                write_error(out, offset, &source.to_string(), format)?;
                counts.undecodable += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if format != "json" {
        if counts.undecodable > 0 {
            writeln!(
                out,
                "({} records, {} undecodable)",
                counts.decoded, counts.undecodable
            )?;
        } else {
            writeln!(out, "({} records)", counts.decoded)?;
        }
    }
    Ok(counts)
}

fn stream_options(options: &DumpOptions) -> StreamOptions {
    let mut stream = StreamOptions::new().on_decode_error(DecodeErrorPolicy::Skip);
    if let Some(from) = options.from {
        stream = stream.from(Offset::new(from));
    }
    if let Some(limit) = options.limit {
        stream = stream.limit(limit);
    }
    if options.reverse {
        stream = stream.reverse();
    }
    if options.follow {
        stream = stream.live();
    }
    stream
}

fn write_record(
    out: &mut impl Write,
    record: &Record,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            let info = RecordInfo {
                offset: record.offset.as_u64(),
                frame_len: record.frame_len,
                value: Some(&record.value),
                error: None,
            };
            writeln!(out, "{}", serde_json::to_string(&info)?)?;
        }
        _ => {
            writeln!(
                out,
                "[{:010}] {}",
                record.offset.as_u64(),
                serde_json::to_string(&record.value)?
            )?;
        }
    }
    Ok(())
}

fn write_error(
    out: &mut impl Write,
    offset: Offset,
    message: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            let info = RecordInfo {
                offset: offset.as_u64(),
                frame_len: 0,
                value: None,
                error: Some(message.to_string()),
            };
            writeln!(out, "{}", serde_json::to_string(&info)?)?;
        }
        _ => {
            writeln!(out, "[{:010}] <undecodable: {message}>", offset.as_u64())?;
        }
    }
    Ok(())
}
