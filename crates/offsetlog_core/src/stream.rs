//! Lazy record streams over a log.
//!
//! A [`LogStream`] walks frames forward or backward from a start position
//! and decodes each payload on demand. Snapshot streams stop at the write
//! cursor as it was when the stream was opened. Live streams wait at the
//! cursor for new appends until they are cancelled or the log closes.
//!
//! Positions follow cursor semantics: a forward stream at position `p`
//! yields the record that starts at `p`, a backward stream yields the record
//! that ends at `p`. [`LogStream::position`] is always a valid restart point.

use crate::config::DecodeErrorPolicy;
use crate::error::{CoreError, CoreResult};
use crate::log::LogShared;
use crate::scan::{FrameScanner, RawFrame};
use crate::types::{Offset, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for [`crate::OffsetLog::stream`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    from: Option<Offset>,
    reverse: bool,
    live: bool,
    until: Option<Offset>,
    limit: Option<usize>,
    decode_error_policy: Option<DecodeErrorPolicy>,
}

impl StreamOptions {
    /// A forward snapshot stream over the whole log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at `offset` instead of the beginning (or the end, in reverse).
    #[must_use]
    pub const fn from(mut self, offset: Offset) -> Self {
        self.from = Some(offset);
        self
    }

    /// Walks backward toward offset 0.
    #[must_use]
    pub const fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Waits at the write cursor for new appends instead of ending.
    #[must_use]
    pub const fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Ends before the first record starting at or after `offset`.
    #[must_use]
    pub const fn until(mut self, offset: Offset) -> Self {
        self.until = Some(offset);
        self
    }

    /// Ends after `n` successfully decoded records.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Overrides the log's default decode error policy.
    #[must_use]
    pub const fn on_decode_error(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = Some(policy);
        self
    }
}

/// Iterator over the records of a log.
///
/// Yields `Err(CoreError::Decode { .. })` for a payload the codec rejects
/// and then ends or continues according to the decode error policy. A
/// corrupt frame is yielded once and ends the stream.
pub struct LogStream {
    shared: Arc<LogShared>,
    scanner: FrameScanner,
    position: u64,
    /// Forward streams read no further than this.
    bound: u64,
    reverse: bool,
    live: bool,
    until: Option<u64>,
    remaining: Option<usize>,
    policy: DecodeErrorPolicy,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

impl LogStream {
    pub(crate) fn new(shared: Arc<LogShared>, options: StreamOptions) -> CoreResult<Self> {
        if options.reverse && options.live {
            return Err(CoreError::invalid_argument(
                "a reverse stream cannot be live",
            ));
        }
        if options.reverse && options.until.is_some() {
            return Err(CoreError::invalid_argument(
                "until applies to forward streams only",
            ));
        }

        let cursor = shared.published()?;
        let default_start = if options.reverse { cursor } else { 0 };
        let position = options.from.map_or(default_start, Offset::as_u64);
        if position > cursor {
            return Err(CoreError::OutOfRange {
                requested: position,
                limit: cursor,
            });
        }

        let policy = options
            .decode_error_policy
            .unwrap_or(shared.config.decode_error_policy);
        let scanner = FrameScanner::new(shared.config.read_buffer_size);

        Ok(Self {
            shared,
            scanner,
            position,
            bound: cursor,
            reverse: options.reverse,
            live: options.live,
            until: options.until.map(Offset::as_u64),
            remaining: options.limit,
            policy,
            cancelled: Arc::new(AtomicBool::new(false)),
            finished: false,
        })
    }

    /// The position to restart from to continue exactly where this stream
    /// stands.
    #[must_use]
    pub fn position(&self) -> Offset {
        Offset::new(self.position)
    }

    /// Whether the stream has ended. A live stream that timed out in
    /// [`Self::next_timeout`] has not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns a handle that ends this stream from another thread.
    #[must_use]
    pub fn canceller(&self) -> StreamCanceller {
        StreamCanceller {
            flag: Arc::clone(&self.cancelled),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Like `next`, but a live stream waits at most `timeout` for an append.
    ///
    /// Returns `None` both at the end of the stream and on timeout; check
    /// [`Self::is_finished`] to tell them apart.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<CoreResult<Record>> {
        self.advance(Some(Instant::now() + timeout))
    }

    fn finish(&mut self) -> Option<CoreResult<Record>> {
        self.finished = true;
        None
    }

    fn fail(&mut self, err: CoreError) -> Option<CoreResult<Record>> {
        self.finished = true;
        Some(Err(err))
    }

    fn advance(&mut self, deadline: Option<Instant>) -> Option<CoreResult<Record>> {
        if self.finished || self.remaining == Some(0) || self.cancelled.load(Ordering::SeqCst) {
            return self.finish();
        }
        if self.shared.cursor.lock().closed {
            return if self.live {
                self.finish()
            } else {
                self.fail(CoreError::Closed)
            };
        }

        let raw = if self.reverse {
            match self.read_prev() {
                Ok(Some(raw)) => {
                    self.position = raw.offset;
                    raw
                }
                Ok(None) => return self.finish(),
                Err(e) => return self.fail(e),
            }
        } else {
            if self.until.is_some_and(|until| self.position >= until) {
                return self.finish();
            }
            if self.position >= self.bound {
                if !self.live {
                    return self.finish();
                }
                match self.wait_for_append(deadline) {
                    Wait::Ready => {}
                    Wait::TimedOut => return None,
                    Wait::Ended => return self.finish(),
                }
            }
            match self.read_next() {
                Ok(Some(raw)) => {
                    self.position += u64::from(raw.frame_len);
                    raw
                }
                Ok(None) => return self.finish(),
                Err(e) => return self.fail(e),
            }
        };

        match self.shared.decode(raw) {
            Ok(record) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(record))
            }
            Err(e) if self.policy == DecodeErrorPolicy::Skip => Some(Err(e)),
            Err(e) => self.fail(e),
        }
    }

    fn read_next(&mut self) -> CoreResult<Option<RawFrame>> {
        let backend = self.shared.backend.read();
        match self.scanner.next(&**backend, self.position, self.bound) {
            Err(CoreError::IncompleteFrame { offset, .. }) => Err(CoreError::corrupt_frame(
                offset,
                "frame extends past the write cursor",
            )),
            other => other,
        }
    }

    fn read_prev(&mut self) -> CoreResult<Option<RawFrame>> {
        let backend = self.shared.backend.read();
        self.scanner.prev(&**backend, self.position)
    }

    /// Blocks until the cursor moves past the stream position.
    fn wait_for_append(&mut self, deadline: Option<Instant>) -> Wait {
        let mut state = self.shared.cursor.lock();
        loop {
            if state.closed || self.cancelled.load(Ordering::SeqCst) {
                return Wait::Ended;
            }
            if state.write > self.position {
                self.bound = state.write;
                return Wait::Ready;
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .appended
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Wait::TimedOut;
                    }
                }
                None => self.shared.appended.wait(&mut state),
            }
        }
    }
}

enum Wait {
    Ready,
    TimedOut,
    Ended,
}

impl Iterator for LogStream {
    type Item = CoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance(None)
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("position", &self.position)
            .field("reverse", &self.reverse)
            .field("live", &self.live)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Ends a [`LogStream`] from another thread, waking it if it is waiting.
#[derive(Clone)]
pub struct StreamCanceller {
    flag: Arc<AtomicBool>,
    shared: Arc<LogShared>,
}

impl StreamCanceller {
    /// Cancels the stream. Its next call returns `None`.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Taking the lock orders this against a waiter's flag check.
        let _state = self.shared.cursor.lock();
        self.shared.appended.notify_all();
    }

    /// Whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StreamCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCanceller")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Frame boundaries from a start offset to the write cursor at creation,
/// checksummed but not decoded.
pub struct FrameIter {
    shared: Arc<LogShared>,
    scanner: FrameScanner,
    position: u64,
    bound: u64,
    finished: bool,
}

impl FrameIter {
    pub(crate) fn new(shared: Arc<LogShared>, from: Offset) -> CoreResult<Self> {
        let bound = shared.published()?;
        if from.as_u64() > bound {
            return Err(CoreError::OutOfRange {
                requested: from.as_u64(),
                limit: bound,
            });
        }
        let scanner = FrameScanner::new(shared.config.read_buffer_size);
        Ok(Self {
            shared,
            scanner,
            position: from.as_u64(),
            bound,
            finished: false,
        })
    }

    /// Offset after the last frame yielded.
    #[must_use]
    pub fn position(&self) -> Offset {
        Offset::new(self.position)
    }
}

impl Iterator for FrameIter {
    /// Start offset and total length of each frame.
    type Item = CoreResult<(Offset, u32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = {
            let backend = self.shared.backend.read();
            self.scanner.skip(&**backend, self.position, self.bound)
        };
        match result {
            Ok(Some(frame_len)) => {
                let offset = Offset::new(self.position);
                self.position += u64::from(frame_len);
                Some(Ok((offset, frame_len)))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(CoreError::IncompleteFrame { offset, .. }) => {
                self.finished = true;
                Some(Err(CoreError::corrupt_frame(
                    offset,
                    "frame extends past the write cursor",
                )))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for FrameIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameIter")
            .field("position", &self.position)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
