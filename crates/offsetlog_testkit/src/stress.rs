//! Stress tests for offset logs.
//!
//! These tests verify behavior under heavy load and concurrent access.

use offsetlog_codec::Value;
use offsetlog_core::{Offset, OffsetLog, StreamOptions};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Length of the text padding in each record.
    pub record_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            record_size: 256,
        }
    }
}

/// The record a stress writer appends.
pub fn stress_record(writer: usize, seq: usize, record_size: usize) -> Value {
    Value::map([
        ("writer", Value::Integer(writer as i64)),
        ("seq", Value::Integer(seq as i64)),
        ("pad", Value::Text("x".repeat(record_size))),
    ])
}

/// Run a sequential append stress test.
pub fn stress_sequential_appends(log: &OffsetLog, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match log.append(&stress_record(0, i, config.record_size)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a sequential read stress test over freshly appended records.
///
/// A read that returns the wrong value counts as a failure.
pub fn stress_sequential_reads(log: &OffsetLog, config: &StressConfig) -> StressTestResult {
    let count = config.operations.clamp(1, 1_000);
    let offsets: Vec<Offset> = (0..count)
        .filter_map(|i| log.append(&stress_record(0, i, config.record_size)).ok())
        .collect();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let idx = i % offsets.len().max(1);
        match offsets.get(idx).map(|o| log.get(*o)) {
            Some(Ok(value)) if value == stress_record(0, idx, config.record_size) => {
                successful += 1;
            }
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a concurrent append stress test.
///
/// Each thread checks that its own offsets strictly increase.
pub fn stress_concurrent_appends(log: Arc<OffsetLog>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let log = Arc::clone(&log);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let record_size = config.record_size;

            thread::spawn(move || {
                let mut last: Option<Offset> = None;
                for i in 0..ops_per_thread {
                    match log.append(&stress_record(t, i, record_size)) {
                        Ok(offset) if last.map_or(true, |l| l < offset) => {
                            last = Some(offset);
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run readers against a log while one writer appends.
///
/// Readers repeatedly open snapshot streams; every record must decode and
/// each writer's sequence numbers must appear in order. Operations counted
/// are records read.
pub fn stress_read_while_appending(
    log: Arc<OffsetLog>,
    config: &StressConfig,
) -> StressTestResult {
    let done = Arc::new(AtomicBool::new(false));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let log = Arc::clone(&log);
            let done = Arc::clone(&done);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || loop {
                let finished = done.load(Ordering::SeqCst);
                match log.stream(StreamOptions::new()) {
                    Ok(stream) => {
                        let mut expected = 0i64;
                        for item in stream {
                            let seq = item
                                .ok()
                                .and_then(|r| r.value.get("seq").and_then(Value::as_integer));
                            if seq == Some(expected) {
                                expected += 1;
                                successful.fetch_add(1, Ordering::Relaxed);
                            } else {
                                failed.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                    Err(_) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                if finished {
                    break;
                }
            })
        })
        .collect();

    for i in 0..config.operations {
        if log.append(&stress_record(0, i, config.record_size)).is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    done.store(true, Ordering::SeqCst);

    for handle in readers {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestLog;
    use offsetlog_core::{FlushPolicy, LogConfig};

    fn create_test_log() -> OffsetLog {
        TestLog::memory_with(
            Arc::new(offsetlog_codec::CborCodec::new()),
            LogConfig::new().flush_policy(FlushPolicy::None),
        )
        .log
    }

    #[test]
    fn test_sequential_appends() {
        let log = create_test_log();
        let config = StressConfig {
            operations: 1_000,
            record_size: 64,
            ..Default::default()
        };

        let result = stress_sequential_appends(&log, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 1_000);
    }

    #[test]
    fn test_sequential_reads() {
        let log = create_test_log();
        let config = StressConfig {
            operations: 1_000,
            record_size: 64,
            ..Default::default()
        };

        let result = stress_sequential_reads(&log, &config);
        assert_eq!(result.failed_ops, 0);
    }

    #[test]
    fn test_concurrent_appends() {
        let log = Arc::new(create_test_log());
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            record_size: 64,
        };

        let result = stress_concurrent_appends(Arc::clone(&log), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(log.stream(StreamOptions::new()).unwrap().count(), 1_000);
    }

    #[test]
    fn test_read_while_appending() {
        let log = Arc::new(create_test_log());
        let config = StressConfig {
            operations: 500,
            threads: 3,
            record_size: 16,
        };

        let result = stress_read_while_appending(log, &config);
        assert_eq!(result.failed_ops, 0);
        assert!(result.successful_ops >= 3 * 500);
    }
}
