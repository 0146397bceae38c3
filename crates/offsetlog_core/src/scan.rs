//! Buffered frame scanning over a storage backend.
//!
//! A [`FrameScanner`] keeps one window of log bytes in memory and parses
//! frames out of it with the functions in [`crate::frame`], refilling from
//! the backend only when a frame is not fully buffered. Memory stays bounded
//! by the read buffer size, or by the largest frame when one is bigger.
//!
//! ## Recovery Policy
//!
//! [`scan_log`] walks every frame from a start offset to the end of the
//! backend and verifies each checksum. It distinguishes:
//!
//! - **Torn tail**: the last frame runs past the end of the bytes. This is a
//!   crash mid-append; the log truncates it away on open.
//! - **Corruption**: a bad length, a length mismatch or a checksum mismatch
//!   anywhere. The log refuses to open.
//!
//! A frame that runs past the end is only torn if nothing complete follows
//! it. When the bytes after it still end in a checksummed frame, its length
//! prefix was damaged instead, and the scan reports corruption.

use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult, FrameError};
use crate::frame::{self, FRAME_OVERHEAD};
use offsetlog_storage::StorageBackend;
use std::ops::Range;
use tracing::trace;

const LEN_SIZE: u64 = 4;

/// One verified frame copied out of the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawFrame {
    pub(crate) offset: u64,
    pub(crate) payload: Vec<u8>,
    pub(crate) frame_len: u32,
}

/// Windowed reader that yields verified frames in either direction.
#[derive(Debug)]
pub(crate) struct FrameScanner {
    buffer: Vec<u8>,
    buffer_start: u64,
    chunk: usize,
}

impl FrameScanner {
    /// Creates a scanner that reads at least `chunk` bytes per refill.
    pub(crate) fn new(chunk: usize) -> Self {
        Self {
            buffer: Vec::new(),
            buffer_start: 0,
            chunk,
        }
    }

    fn window_end(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    /// Reads the frame starting at `pos`, looking no further than `limit`.
    ///
    /// Returns `Ok(None)` when `pos == limit` and
    /// [`CoreError::IncompleteFrame`] when the frame runs past `limit`.
    pub(crate) fn next(
        &mut self,
        backend: &dyn StorageBackend,
        pos: u64,
        limit: u64,
    ) -> CoreResult<Option<RawFrame>> {
        Ok(self.locate_next(backend, pos, limit)?.map(|(range, frame_len)| RawFrame {
            offset: pos,
            payload: self.buffer[range].to_vec(),
            frame_len,
        }))
    }

    /// Like [`Self::next`] but returns only the frame length.
    pub(crate) fn skip(
        &mut self,
        backend: &dyn StorageBackend,
        pos: u64,
        limit: u64,
    ) -> CoreResult<Option<u32>> {
        Ok(self.locate_next(backend, pos, limit)?.map(|(_, len)| len))
    }

    /// Reads the frame that ends at `end`.
    ///
    /// Returns `Ok(None)` at offset 0.
    pub(crate) fn prev(
        &mut self,
        backend: &dyn StorageBackend,
        end: u64,
    ) -> CoreResult<Option<RawFrame>> {
        if end == 0 {
            return Ok(None);
        }

        for _ in 0..3 {
            if !(end > self.buffer_start && end <= self.window_end()) {
                self.fill_backward(backend, end, LEN_SIZE)?;
            }
            let rel_end = (end - self.buffer_start) as usize;
            let window = &self.buffer[..rel_end];

            match frame::scan_prev(window, rel_end) {
                Ok(rel_start) => {
                    let start = self.buffer_start + rel_start as u64;
                    return match frame::unframe(window, rel_start) {
                        Ok((payload, frame_len)) => Ok(Some(RawFrame {
                            offset: start,
                            payload: payload.to_vec(),
                            frame_len,
                        })),
                        Err(e) => Err(CoreError::from_frame(start, e)),
                    };
                }
                Err(FrameError::Incomplete { needed, .. }) => {
                    if needed > end {
                        return Err(CoreError::corrupt_frame(
                            end,
                            format!("frame ending here claims {needed} bytes"),
                        ));
                    }
                    self.fill_backward(backend, end, needed)?;
                }
                Err(e) => return Err(CoreError::from_frame(end, e)),
            }
        }
        Err(CoreError::corrupt_frame(end, "frame could not be buffered"))
    }

    fn locate_next(
        &mut self,
        backend: &dyn StorageBackend,
        pos: u64,
        limit: u64,
    ) -> CoreResult<Option<(Range<usize>, u32)>> {
        if pos >= limit {
            return Ok(None);
        }

        for _ in 0..3 {
            if !(pos >= self.buffer_start && pos < self.window_end()) {
                self.fill_forward(backend, pos, LEN_SIZE, limit)?;
            }
            let rel = (pos - self.buffer_start) as usize;
            let visible = (self.window_end().min(limit) - self.buffer_start) as usize;
            let window = &self.buffer[..visible];

            match frame::unframe(window, rel) {
                Ok((payload, frame_len)) => {
                    let payload_start = rel + LEN_SIZE as usize;
                    return Ok(Some((payload_start..payload_start + payload.len(), frame_len)));
                }
                Err(FrameError::Incomplete { needed, .. }) => {
                    if pos + needed > limit {
                        return Err(CoreError::IncompleteFrame {
                            offset: pos,
                            needed,
                            available: limit - pos,
                        });
                    }
                    self.fill_forward(backend, pos, needed, limit)?;
                }
                Err(e) => return Err(CoreError::from_frame(pos, e)),
            }
        }
        Err(CoreError::corrupt_frame(pos, "frame could not be buffered"))
    }

    fn fill_forward(
        &mut self,
        backend: &dyn StorageBackend,
        from: u64,
        needed: u64,
        limit: u64,
    ) -> CoreResult<()> {
        let want = needed.max(self.chunk as u64).min(limit - from);
        self.buffer = backend.read_at(from, want as usize)?;
        self.buffer_start = from;
        Ok(())
    }

    fn fill_backward(
        &mut self,
        backend: &dyn StorageBackend,
        end: u64,
        needed: u64,
    ) -> CoreResult<()> {
        let want = needed.max(self.chunk as u64).min(end);
        let start = end - want;
        self.buffer = backend.read_at(start, want as usize)?;
        self.buffer_start = start;
        Ok(())
    }
}

/// How a full scan of the log ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEnd {
    /// Every byte belongs to a valid frame.
    Clean,
    /// The final frame is incomplete.
    TornTail {
        /// Where the incomplete frame starts.
        offset: u64,
        /// Bytes the frame needs.
        needed: u64,
        /// Bytes present.
        available: u64,
    },
    /// A frame failed validation.
    Corrupt {
        /// Where the bad frame starts.
        offset: u64,
        /// What failed to validate.
        reason: String,
    },
}

/// Result of walking and verifying every frame in a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Offset the scan started from.
    pub start: u64,
    /// Valid frames found.
    pub records: u64,
    /// End of the last valid frame.
    pub valid_end: u64,
    /// Size of the backing storage.
    pub size: u64,
    /// How the scan ended.
    pub end: ScanEnd,
}

impl ScanReport {
    /// Bytes after the last valid frame.
    #[must_use]
    pub fn trailing_bytes(&self) -> u64 {
        self.size - self.valid_end
    }

    /// True if the scan found neither corruption nor a torn tail.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.end == ScanEnd::Clean
    }
}

/// Walks and verifies every frame from `start` to the end of the backend.
///
/// # Errors
///
/// Returns an error if `start` lies past the end of the backend or the
/// backend fails. Corruption and torn tails are reported, not returned.
pub fn scan_log(
    backend: &dyn StorageBackend,
    start: u64,
    read_buffer_size: usize,
) -> CoreResult<ScanReport> {
    let size = backend.size()?;
    if start > size {
        return Err(CoreError::invalid_argument(format!(
            "start offset {start} lies past the end of the log ({size} bytes)"
        )));
    }

    let mut scanner = FrameScanner::new(read_buffer_size);
    let mut pos = start;
    let mut records = 0;

    let end = loop {
        match scanner.skip(backend, pos, size) {
            Ok(Some(frame_len)) => {
                trace!(offset = pos, frame_len, "verified frame");
                records += 1;
                pos += u64::from(frame_len);
            }
            Ok(None) => break ScanEnd::Clean,
            Err(CoreError::IncompleteFrame {
                offset,
                needed,
                available,
            }) => {
                if ends_with_complete_frame(backend, offset, size)? {
                    break ScanEnd::Corrupt {
                        offset,
                        reason: format!(
                            "frame claims {needed} bytes but a complete frame ends the log"
                        ),
                    };
                }
                break ScanEnd::TornTail {
                    offset,
                    needed,
                    available,
                };
            }
            Err(CoreError::CorruptFrame { offset, reason }) => {
                break ScanEnd::Corrupt { offset, reason }
            }
            Err(e) => return Err(e),
        }
    };

    Ok(ScanReport {
        start,
        records,
        valid_end: pos,
        size,
        end,
    })
}

/// Checks whether `[from, size)` ends with a whole frame whose checksum
/// holds, judged by the trailing length alone.
///
/// A torn append is a strict prefix of one frame, so its last bytes are
/// payload and fail this check.
fn ends_with_complete_frame(
    backend: &dyn StorageBackend,
    from: u64,
    size: u64,
) -> CoreResult<bool> {
    let overhead = FRAME_OVERHEAD as u64;
    if size - from < overhead {
        return Ok(false);
    }

    let tail = backend.read_at(size - LEN_SIZE, LEN_SIZE as usize)?;
    let len = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let total = u64::from(len) + overhead;
    if len == 0 || total > size - from {
        return Ok(false);
    }

    // The leading length may be the damaged one, so checksum against the
    // trailing copy.
    let start = size - total;
    let body = backend.read_at(start + LEN_SIZE, len as usize + 4)?;
    let (payload, stored) = body.split_at(len as usize);
    let stored = u32::from_be_bytes([stored[0], stored[1], stored[2], stored[3]]);

    let mut covered = Vec::with_capacity(payload.len() + 4);
    covered.extend_from_slice(&len.to_be_bytes());
    covered.extend_from_slice(payload);
    Ok(frame::compute_crc32(&covered) == stored)
}

/// Verifies a log without modifying it.
///
/// Starts from the configured `start_offset_hint`, like open does.
///
/// # Errors
///
/// Same as [`scan_log`].
pub fn verify(backend: &dyn StorageBackend, config: &LogConfig) -> CoreResult<ScanReport> {
    let start = config.start_offset_hint.map_or(0, |o| o.as_u64());
    scan_log(backend, start, config.read_buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::frame;
    use offsetlog_storage::InMemoryBackend;

    fn backend_with(payloads: &[&[u8]]) -> (InMemoryBackend, Vec<u64>) {
        let mut backend = InMemoryBackend::new();
        let mut offsets = Vec::new();
        for payload in payloads {
            offsets.push(backend.append(&frame(payload).unwrap()).unwrap());
        }
        (backend, offsets)
    }

    #[test]
    fn scanner_reads_forward_with_small_chunks() {
        let (backend, offsets) = backend_with(&[b"one", b"two", b"three"]);
        let size = backend.size().unwrap();

        for chunk in [0, 1, 7, 64 * 1024] {
            let mut scanner = FrameScanner::new(chunk);
            let mut pos = 0;
            let mut seen = Vec::new();
            while let Some(frame) = scanner.next(&backend, pos, size).unwrap() {
                seen.push((frame.offset, frame.payload.clone()));
                pos += u64::from(frame.frame_len);
            }
            assert_eq!(
                seen,
                vec![
                    (offsets[0], b"one".to_vec()),
                    (offsets[1], b"two".to_vec()),
                    (offsets[2], b"three".to_vec()),
                ],
                "chunk {chunk}"
            );
        }
    }

    #[test]
    fn scanner_reads_backward() {
        let (backend, offsets) = backend_with(&[b"one", b"two", b"three"]);

        for chunk in [0, 5, 64 * 1024] {
            let mut scanner = FrameScanner::new(chunk);
            let mut end = backend.size().unwrap();
            let mut seen = Vec::new();
            while let Some(frame) = scanner.prev(&backend, end).unwrap() {
                seen.push(frame.offset);
                end = frame.offset;
            }
            assert_eq!(seen, vec![offsets[2], offsets[1], offsets[0]], "chunk {chunk}");
        }
    }

    #[test]
    fn scanner_handles_frames_larger_than_chunk() {
        let big = vec![0xAB; 200 * 1024];
        let (backend, _) = backend_with(&[b"small", &big, b"after"]);
        let size = backend.size().unwrap();

        let mut scanner = FrameScanner::new(1024);
        let first = scanner.next(&backend, 0, size).unwrap().unwrap();
        let second_at = u64::from(first.frame_len);
        let second = scanner.next(&backend, second_at, size).unwrap().unwrap();
        assert_eq!(second.payload, big);

        let back = FrameScanner::new(1024)
            .prev(&backend, second_at + u64::from(second.frame_len))
            .unwrap()
            .unwrap();
        assert_eq!(back.offset, second_at);
    }

    #[test]
    fn scanner_reports_incomplete_at_limit() {
        let (backend, _) = backend_with(&[b"abc"]);
        let size = backend.size().unwrap();

        let err = FrameScanner::new(0).next(&backend, 0, size - 1).unwrap_err();
        assert!(matches!(err, CoreError::IncompleteFrame { offset: 0, .. }));
    }

    #[test]
    fn scanner_rejects_misaligned_offset() {
        let (backend, _) = backend_with(&[b"abcdefgh", b"ijklmnop"]);
        let size = backend.size().unwrap();

        let err = FrameScanner::new(0).next(&backend, 2, size).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CorruptFrame { .. } | CoreError::IncompleteFrame { .. }
        ));
    }

    #[test]
    fn scan_log_clean() {
        let (backend, _) = backend_with(&[b"a", b"b"]);
        let report = scan_log(&backend, 0, 64).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.records, 2);
        assert_eq!(report.valid_end, report.size);
        assert_eq!(report.trailing_bytes(), 0);
    }

    #[test]
    fn scan_log_detects_torn_tail() {
        let (mut backend, _) = backend_with(&[b"a", b"b"]);
        let valid_end = backend.size().unwrap();
        let partial = frame(b"partial").unwrap();
        backend.append(&partial[..5]).unwrap();

        let report = scan_log(&backend, 0, 64).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.valid_end, valid_end);
        assert_eq!(report.trailing_bytes(), 5);
        assert!(matches!(
            report.end,
            ScanEnd::TornTail { offset, available: 5, .. } if offset == valid_end
        ));
    }

    #[test]
    fn scan_log_detects_corruption() {
        let (backend, offsets) = backend_with(&[b"first", b"second", b"third"]);
        let mut data = backend.data();
        data[offsets[1] as usize + 6] ^= 0xFF;
        let backend = InMemoryBackend::with_data(data);

        let report = scan_log(&backend, 0, 64).unwrap();
        assert_eq!(report.records, 1);
        assert!(matches!(report.end, ScanEnd::Corrupt { offset, .. } if offset == offsets[1]));
    }

    #[test]
    fn damaged_length_prefix_mid_log_is_corruption() {
        let (backend, offsets) = backend_with(&[b"first", b"second", b"third", b"fourth"]);
        let mut data = backend.data();
        // high byte: the frame now claims far more than the file holds
        data[offsets[1] as usize] ^= 0x01;
        let backend = InMemoryBackend::with_data(data);

        let report = scan_log(&backend, 0, 64).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.valid_end, offsets[1]);
        assert!(matches!(report.end, ScanEnd::Corrupt { offset, .. } if offset == offsets[1]));
    }

    #[test]
    fn damaged_length_prefix_of_last_frame_is_corruption() {
        let (backend, offsets) = backend_with(&[b"first", b"last one"]);
        let mut data = backend.data();
        data[offsets[1] as usize + 2] ^= 0x40;
        let backend = InMemoryBackend::with_data(data);

        let report = scan_log(&backend, 0, 64).unwrap();
        assert!(matches!(report.end, ScanEnd::Corrupt { offset, .. } if offset == offsets[1]));
    }

    #[test]
    fn torn_frame_after_valid_frames_stays_torn() {
        for cut in 1..frame(b"a longer partial payload").unwrap().len() {
            let (mut backend, _) = backend_with(&[b"a", b"b"]);
            let valid_end = backend.size().unwrap();
            backend
                .append(&frame(b"a longer partial payload").unwrap()[..cut])
                .unwrap();

            let report = scan_log(&backend, 0, 64).unwrap();
            assert!(
                matches!(report.end, ScanEnd::TornTail { offset, .. } if offset == valid_end),
                "cut {cut}: {:?}",
                report.end
            );
        }
    }

    #[test]
    fn scan_log_rejects_start_past_end() {
        let (backend, _) = backend_with(&[b"a"]);
        let err = scan_log(&backend, 1000, 64).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn verify_uses_hint() {
        let (backend, offsets) = backend_with(&[b"a", b"b", b"c"]);
        let config = LogConfig::new().start_offset_hint(crate::Offset::new(offsets[1]));
        let report = verify(&backend, &config).unwrap();
        assert_eq!(report.start, offsets[1]);
        assert_eq!(report.records, 2);
    }
}
