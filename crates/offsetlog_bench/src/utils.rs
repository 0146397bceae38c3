//! Benchmark utilities.

use offsetlog_codec::{CborCodec, Value};
use offsetlog_core::{FlushPolicy, LogConfig, OffsetLog, Offset};
use offsetlog_storage::InMemoryBackend;
use rand::Rng;
use std::sync::Arc;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// A record shaped like a typical event, padded with `payload_size` random bytes.
pub fn event_record(seq: usize, payload_size: usize) -> Value {
    Value::map([
        ("seq", Value::Integer(seq as i64)),
        ("kind", Value::from("event")),
        ("payload", Value::Bytes(random_data(payload_size))),
    ])
}

/// Generate `count` event records.
pub fn generate_records(count: usize, payload_size: usize) -> Vec<Value> {
    (0..count).map(|i| event_record(i, payload_size)).collect()
}

/// An in-memory CBOR log that never syncs.
pub fn memory_log() -> OffsetLog {
    OffsetLog::open_with_backend(
        Box::new(InMemoryBackend::new()),
        Arc::new(CborCodec::new()),
        LogConfig::new().flush_policy(FlushPolicy::None),
    )
    .expect("in-memory log opens")
}

/// An in-memory log holding `count` records, with their offsets.
pub fn populated_log(count: usize, payload_size: usize) -> (OffsetLog, Vec<Offset>) {
    let log = memory_log();
    let offsets = generate_records(count, payload_size)
        .iter()
        .map(|value| log.append(value).expect("append"))
        .collect();
    (log, offsets)
}
