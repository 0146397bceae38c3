//! Live streams and the sequence view under concurrent appends.

use offsetlog_codec::Value;
use offsetlog_core::{Offset, Seq, SequenceView, StreamOptions};
use offsetlog_testkit::fixtures::TestLog;
use offsetlog_testkit::stress::stress_record;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn live_stream_sees_every_append_once_in_order() {
    let test_log = Arc::new(TestLog::memory());
    let mut stream = test_log.stream(StreamOptions::new().live()).unwrap();
    let canceller = stream.canceller();

    let (tx, rx) = mpsc::channel();
    let consumer = thread::spawn(move || {
        for record in stream.by_ref() {
            tx.send(record.unwrap()).unwrap();
        }
        stream.position()
    });

    let offsets: Vec<Offset> = (0..200)
        .map(|i| test_log.append(&stress_record(0, i, 8)).unwrap())
        .collect();

    for (i, offset) in offsets.iter().enumerate() {
        let record = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(record.offset, *offset);
        assert_eq!(record.value, stress_record(0, i, 8));
    }

    canceller.cancel();
    assert_eq!(consumer.join().unwrap(), test_log.write_cursor());
    assert!(rx.try_recv().is_err());
}

#[test]
fn live_stream_resumes_after_cancel() {
    let test_log = TestLog::memory();
    test_log.append_values(&[Value::Integer(0), Value::Integer(1)]);

    let mut first = test_log.stream(StreamOptions::new().live()).unwrap();
    assert_eq!(first.next().unwrap().unwrap().value, Value::Integer(0));
    first.canceller().cancel();
    assert!(first.next().is_none());

    test_log.append(&Value::Integer(2)).unwrap();
    let rest: Vec<Value> = test_log
        .stream(StreamOptions::new().from(first.position()))
        .unwrap()
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(rest, vec![Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn follower_matches_rebuild_under_concurrent_appends() {
    let test_log = Arc::new(TestLog::memory());
    test_log.append_values(&[Value::from("before")]);

    let follower = SequenceView::build(&test_log.reader())
        .unwrap()
        .follow(&test_log.reader())
        .unwrap();

    let writers: Vec<_> = (0..3)
        .map(|t| {
            let test_log = Arc::clone(&test_log);
            thread::spawn(move || {
                for i in 0..50 {
                    test_log.append(&stress_record(t, i, 4)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert!(follower.wait_for_len(151, Duration::from_secs(10)));
    let followed = follower.stop().unwrap();
    let rebuilt = SequenceView::build(&test_log.reader()).unwrap();

    assert_eq!(followed, rebuilt);
    assert_eq!(followed.offset_of(Seq::new(0)).unwrap(), Offset::ZERO);
    assert_eq!(followed.next_offset(), test_log.write_cursor());

    // each writer's records appear in its own order
    for t in 0..3i64 {
        let seqs: Vec<i64> = followed
            .offsets()
            .iter()
            .map(|o| test_log.get(*o).unwrap())
            .filter(|v| v.get("writer").and_then(Value::as_integer) == Some(t))
            .filter_map(|v| v.get("seq").and_then(Value::as_integer))
            .collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn snapshot_then_catch_up() {
    let test_log = TestLog::file();
    test_log.append_values(&[Value::Integer(1), Value::Integer(2)]);
    let snapshot = test_log.dir().unwrap().join("sequence.snap");

    SequenceView::build(&test_log.reader())
        .unwrap()
        .save_snapshot(&snapshot)
        .unwrap();
    let third = test_log.append(&Value::Integer(3)).unwrap();

    let mut view = SequenceView::load_snapshot(&snapshot).unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(view.catch_up(&test_log.reader()).unwrap(), 1);
    assert_eq!(view.latest(), Some((Seq::new(2), third)));
}
