//! Sequence view: append order to offset.
//!
//! A [`SequenceView`] maps the n-th appended record to its offset. It is
//! derived from the log and can always be rebuilt by replaying it; snapshots
//! only save the replay.
//!
//! ## Snapshot Format
//!
//! ```text
//! | magic "OLSV" | version: u16 | count: u64 | next_offset: u64 |
//! | offset: u64 ... (count) | crc32: u32 |
//! ```
//!
//! Big-endian, checksummed over everything before the CRC.

use crate::config::DecodeErrorPolicy;
use crate::error::{CoreError, CoreResult};
use crate::frame::compute_crc32;
use crate::log::LogReader;
use crate::stream::{LogStream, StreamCanceller, StreamOptions};
use crate::types::{Offset, Seq};
use parking_lot::{Condvar, Mutex};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Snapshot file magic.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"OLSV";

/// Current snapshot version.
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 8 + 8;
const CRC_LEN: usize = 4;

/// Offsets of every record in append order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceView {
    offsets: Vec<Offset>,
    next_offset: Offset,
}

impl SequenceView {
    /// An empty view positioned at the start of the log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a view by replaying the log from offset 0.
    ///
    /// # Errors
    ///
    /// Returns the first frame or storage error met during the replay.
    pub fn build(reader: &LogReader) -> CoreResult<Self> {
        let mut view = Self::new();
        view.catch_up(reader)?;
        Ok(view)
    }

    /// Indexes every record appended since the view was last brought up to
    /// date. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the view is ahead of the log, or the first
    /// frame or storage error.
    pub fn catch_up(&mut self, reader: &LogReader) -> CoreResult<usize> {
        let mut added = 0;
        for frame in reader.frames(self.next_offset)? {
            let (offset, frame_len) = frame?;
            self.push(offset, offset.advance(u64::from(frame_len)));
            added += 1;
        }
        debug!(added, total = self.offsets.len(), "sequence view caught up");
        Ok(added)
    }

    fn push(&mut self, offset: Offset, next: Offset) {
        trace!(seq = self.offsets.len(), offset = offset.as_u64(), "indexed record");
        self.offsets.push(offset);
        self.next_offset = next;
    }

    /// The most recent record.
    #[must_use]
    pub fn latest(&self) -> Option<(Seq, Offset)> {
        let last = self.offsets.last()?;
        Some((Seq::new(self.offsets.len() as u64 - 1), *last))
    }

    /// Offset of the record appended `seq`-th.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if that record has not been indexed.
    pub fn offset_of(&self, seq: Seq) -> CoreResult<Offset> {
        usize::try_from(seq.as_u64())
            .ok()
            .and_then(|i| self.offsets.get(i).copied())
            .ok_or(CoreError::OutOfRange {
                requested: seq.as_u64(),
                limit: self.offsets.len() as u64,
            })
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if no records are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The offset the next indexed record will have.
    #[must_use]
    pub fn next_offset(&self) -> Offset {
        self.next_offset
    }

    /// All indexed offsets in append order.
    #[must_use]
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// Writes the view to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let temp_path = temp_path(path);

        let data = self.encode();
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        sync_parent(path)?;

        debug!(path = %path.display(), records = self.offsets.len(), "saved sequence snapshot");
        Ok(())
    }

    /// Reads a view saved by [`Self::save_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Snapshot` if it is not a
    /// valid snapshot.
    pub fn load_snapshot(path: impl AsRef<Path>) -> CoreResult<Self> {
        let data = fs::read(path.as_ref())?;
        Self::decode(&data)
    }

    /// Loads the snapshot at `path` and catches it up, or rebuilds from the
    /// log if the snapshot is missing, invalid or does not fit the log.
    ///
    /// # Errors
    ///
    /// Returns an error only if the rebuild fails.
    pub fn load_or_build(path: impl AsRef<Path>, reader: &LogReader) -> CoreResult<Self> {
        let path = path.as_ref();
        let restored = Self::load_snapshot(path).and_then(|mut view| {
            view.catch_up(reader)?;
            Ok(view)
        });
        match restored {
            Ok(view) => Ok(view),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rebuilding sequence view");
                Self::build(reader)
            }
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.offsets.len() * 8 + CRC_LEN);
        buf.extend_from_slice(&SNAPSHOT_MAGIC);
        buf.extend_from_slice(&SNAPSHOT_VERSION.to_be_bytes());
        buf.extend_from_slice(&(self.offsets.len() as u64).to_be_bytes());
        buf.extend_from_slice(&self.next_offset.as_u64().to_be_bytes());
        for offset in &self.offsets {
            buf.extend_from_slice(&offset.as_u64().to_be_bytes());
        }
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }

    fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_LEN + CRC_LEN {
            return Err(CoreError::snapshot("snapshot too short"));
        }
        if data[0..4] != SNAPSHOT_MAGIC {
            return Err(CoreError::snapshot("invalid snapshot magic"));
        }
        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != SNAPSHOT_VERSION {
            return Err(CoreError::snapshot(format!(
                "unsupported snapshot version {version}"
            )));
        }

        let count = read_u64(data, 6);
        let next_offset = read_u64(data, 14);
        let expected = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(8))
            .and_then(|n| n.checked_add(HEADER_LEN + CRC_LEN));
        if expected != Some(data.len()) {
            return Err(CoreError::snapshot(format!(
                "snapshot of {} bytes cannot hold {count} offsets",
                data.len()
            )));
        }

        let body_end = data.len() - CRC_LEN;
        let stored = u32::from_be_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let computed = compute_crc32(&data[..body_end]);
        if stored != computed {
            return Err(CoreError::snapshot("snapshot checksum mismatch"));
        }

        let offsets: Vec<Offset> = data[HEADER_LEN..body_end]
            .chunks_exact(8)
            .map(|chunk| Offset::new(read_u64(chunk, 0)))
            .collect();

        match offsets.first() {
            Some(first) if *first != Offset::ZERO => {
                return Err(CoreError::snapshot("first offset is not 0"));
            }
            None if next_offset != 0 => {
                return Err(CoreError::snapshot("empty snapshot past offset 0"));
            }
            _ => {}
        }
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::snapshot("offsets are not increasing"));
        }
        if offsets.last().is_some_and(|last| last.as_u64() >= next_offset) {
            return Err(CoreError::snapshot("next offset precedes the last record"));
        }

        Ok(Self {
            offsets,
            next_offset: Offset::new(next_offset),
        })
    }

    /// Keeps the view current in a background thread that follows the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the live stream cannot be opened or the thread
    /// cannot be spawned.
    pub fn follow(self, reader: &LogReader) -> CoreResult<SequenceFollower> {
        let stream = reader.stream(
            StreamOptions::new()
                .from(self.next_offset)
                .live()
                .on_decode_error(DecodeErrorPolicy::Skip),
        )?;
        let canceller = stream.canceller();
        let state = Arc::new(FollowState {
            inner: Mutex::new(FollowInner {
                view: self,
                error: None,
                running: true,
            }),
            grown: Condvar::new(),
        });

        let handle = {
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("offsetlog-sequence".into())
                .spawn(move || state.run(stream))?
        };

        Ok(SequenceFollower {
            state,
            canceller,
            handle: Some(handle),
        })
    }
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_be_bytes(bytes)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Fsyncs the directory holding `path` so the rename survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) -> CoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> CoreResult<()> {
    Ok(())
}

struct FollowInner {
    view: SequenceView,
    error: Option<CoreError>,
    running: bool,
}

struct FollowState {
    inner: Mutex<FollowInner>,
    grown: Condvar,
}

impl FollowState {
    fn run(&self, mut stream: LogStream) {
        while let Some(item) = stream.next() {
            let offset = match item {
                Ok(record) => record.offset,
                // The frame is intact; only its payload is unreadable.
                Err(CoreError::Decode { offset, .. }) => offset,
                Err(e) => {
                    warn!(error = %e, "sequence follower stopped");
                    self.inner.lock().error = Some(e);
                    break;
                }
            };
            let next = stream.position();
            self.inner.lock().view.push(offset, next);
            self.grown.notify_all();
        }

        self.inner.lock().running = false;
        self.grown.notify_all();
    }
}

/// A [`SequenceView`] kept current by a background thread.
///
/// Dropping the follower stops the thread.
pub struct SequenceFollower {
    state: Arc<FollowState>,
    canceller: StreamCanceller,
    handle: Option<JoinHandle<()>>,
}

impl SequenceFollower {
    /// A copy of the view as it stands.
    #[must_use]
    pub fn view(&self) -> SequenceView {
        self.state.inner.lock().view.clone()
    }

    /// Number of records indexed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.inner.lock().view.len()
    }

    /// True if nothing has been indexed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the background thread is still following the log.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.inner.lock().running
    }

    /// Waits until at least `len` records are indexed. Returns false on
    /// timeout or if the follower stopped first.
    pub fn wait_for_len(&self, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.state.inner.lock();
        while inner.view.len() < len && inner.running {
            if self.state.grown.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        inner.view.len() >= len
    }

    /// Stops following and returns the final view.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the follower early, if any.
    pub fn stop(mut self) -> CoreResult<SequenceView> {
        self.shutdown();
        let mut inner = self.state.inner.lock();
        match inner.error.take() {
            Some(e) => Err(e),
            None => Ok(std::mem::take(&mut inner.view)),
        }
    }

    fn shutdown(&mut self) {
        self.canceller.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sequence follower thread panicked");
            }
        }
    }
}

impl Drop for SequenceFollower {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SequenceFollower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceFollower")
            .field("len", &self.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
