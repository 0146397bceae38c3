//! Record framing.
//!
//! Every record is stored as one self-delimiting frame:
//!
//! ```text
//! | len: u32 | payload (len bytes) | crc32: u32 | len: u32 |
//! ```
//!
//! All integers are big-endian. The checksum (IEEE CRC-32) covers the
//! leading length and the payload. The trailing length lets a reader walk
//! the log backward from any frame boundary.
//!
//! The functions here are pure and operate on in-memory buffers; positions
//! are relative to the buffer.

use crate::error::{FrameError, FrameResult};

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = 12;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize - FRAME_OVERHEAD;

const LEN_SIZE: usize = 4;

/// Total frame length for a payload of `payload_len` bytes.
#[must_use]
pub const fn frame_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}

/// Wraps a payload in a frame.
///
/// # Errors
///
/// Returns [`FrameError::EmptyPayload`] for an empty payload and
/// [`FrameError::PayloadTooLarge`] above [`MAX_PAYLOAD_LEN`].
pub fn frame(payload: &[u8]) -> FrameResult<Vec<u8>> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        len: payload.len(),
        max: MAX_PAYLOAD_LEN,
    })?;

    let mut data = Vec::with_capacity(frame_len(payload.len()));
    data.extend_from_slice(&len.to_be_bytes());
    data.extend_from_slice(payload);
    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    data.extend_from_slice(&len.to_be_bytes());
    Ok(data)
}

/// Parses and verifies the frame starting at `at`.
///
/// Returns the payload and the total frame length.
///
/// # Errors
///
/// - [`FrameError::Incomplete`] if the buffer ends before the frame does
/// - [`FrameError::Corrupt`] on a zero length, a trailing length that does
///   not match, or a checksum mismatch
pub fn unframe(buffer: &[u8], at: usize) -> FrameResult<(&[u8], u32)> {
    let total = checked_extent(buffer, at)?;
    let len = total - FRAME_OVERHEAD;
    let payload_end = at + LEN_SIZE + len;

    let stored = read_u32(buffer, payload_end);
    let computed = compute_crc32(&buffer[at..payload_end]);
    if stored != computed {
        return Err(FrameError::corrupt(format!(
            "checksum mismatch: stored {stored:08x}, computed {computed:08x}"
        )));
    }

    let total = u32::try_from(total)
        .map_err(|_| FrameError::corrupt(format!("frame length {total} exceeds u32")))?;
    Ok((&buffer[at + LEN_SIZE..payload_end], total))
}

/// Returns the start of the frame after the one at `at`.
///
/// Validates both length fields but not the checksum.
///
/// # Errors
///
/// Same as [`unframe`], minus the checksum check.
pub fn scan_next(buffer: &[u8], at: usize) -> FrameResult<usize> {
    checked_extent(buffer, at).map(|total| at + total)
}

/// Returns the start of the frame that ends at `end`.
///
/// Reads the trailing length and checks that the leading length agrees.
///
/// # Errors
///
/// - [`FrameError::Incomplete`] if fewer than the frame's bytes precede `end`
/// - [`FrameError::Corrupt`] on a zero or mismatched length
pub fn scan_prev(buffer: &[u8], end: usize) -> FrameResult<usize> {
    if end > buffer.len() {
        return Err(FrameError::Incomplete {
            needed: end as u64,
            available: buffer.len() as u64,
        });
    }
    if end < LEN_SIZE {
        return Err(FrameError::Incomplete {
            needed: LEN_SIZE as u64,
            available: end as u64,
        });
    }

    let len = read_u32(buffer, end - LEN_SIZE) as usize;
    validate_len(len)?;
    let total = frame_len(len);
    if end < total {
        return Err(FrameError::Incomplete {
            needed: total as u64,
            available: end as u64,
        });
    }

    let start = end - total;
    let leading = read_u32(buffer, start) as usize;
    if leading != len {
        return Err(FrameError::corrupt(format!(
            "leading length {leading} does not match trailing length {len}"
        )));
    }
    Ok(start)
}

/// Computes the IEEE CRC-32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

/// Checks both length fields of the frame at `at` and returns its total
/// length.
fn checked_extent(buffer: &[u8], at: usize) -> FrameResult<usize> {
    let available = buffer.len().saturating_sub(at);
    if available < LEN_SIZE {
        return Err(FrameError::Incomplete {
            needed: LEN_SIZE as u64,
            available: available as u64,
        });
    }

    let len = read_u32(buffer, at) as usize;
    validate_len(len)?;
    let total = frame_len(len);
    if available < total {
        return Err(FrameError::Incomplete {
            needed: total as u64,
            available: available as u64,
        });
    }

    let trailing = read_u32(buffer, at + total - LEN_SIZE) as usize;
    if trailing != len {
        return Err(FrameError::corrupt(format!(
            "trailing length {trailing} does not match leading length {len}"
        )));
    }
    Ok(total)
}

fn validate_len(len: usize) -> FrameResult<()> {
    if len == 0 {
        return Err(FrameError::corrupt("zero-length frame"));
    }
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::corrupt(format!(
            "length {len} exceeds the frame limit"
        )));
    }
    Ok(())
}

fn read_u32(buffer: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_check_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frame_layout() {
        let framed = frame(b"abc").unwrap();
        assert_eq!(framed.len(), 3 + FRAME_OVERHEAD);
        assert_eq!(&framed[0..4], &[0, 0, 0, 3]);
        assert_eq!(&framed[4..7], b"abc");
        let crc = compute_crc32(&framed[0..7]);
        assert_eq!(&framed[7..11], &crc.to_be_bytes());
        assert_eq!(&framed[11..15], &[0, 0, 0, 3]);
    }

    #[test]
    fn frame_rejects_empty_payload() {
        assert_eq!(frame(b""), Err(FrameError::EmptyPayload));
    }

    #[test]
    fn unframe_returns_payload_and_length() {
        let framed = frame(b"hello").unwrap();
        let (payload, len) = unframe(&framed, 0).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(len as usize, framed.len());
    }

    #[test]
    fn unframe_at_offset() {
        let mut buffer = frame(b"first").unwrap();
        let second_at = buffer.len();
        buffer.extend(frame(b"second").unwrap());

        let (payload, _) = unframe(&buffer, second_at).unwrap();
        assert_eq!(payload, b"second");
    }

    #[test]
    fn every_truncation_is_incomplete() {
        let framed = frame(b"payload").unwrap();
        for cut in 0..framed.len() {
            let err = unframe(&framed[..cut], 0).unwrap_err();
            assert!(
                matches!(err, FrameError::Incomplete { available, .. } if available == cut as u64),
                "cut at {cut}: {err:?}"
            );
        }
    }

    #[test]
    fn incomplete_reports_full_extent_once_length_known() {
        let framed = frame(b"payload").unwrap();
        let err = unframe(&framed[..6], 0).unwrap_err();
        assert_eq!(
            err,
            FrameError::Incomplete {
                needed: framed.len() as u64,
                available: 6
            }
        );
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let mut framed = frame(b"payload").unwrap();
        framed[5] ^= 0xFF;
        let err = unframe(&framed, 0).unwrap_err();
        assert!(matches!(err, FrameError::Corrupt { ref reason } if reason.contains("checksum")));
    }

    #[test]
    fn trailing_length_mismatch_is_corrupt() {
        let mut framed = frame(b"payload").unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        assert!(matches!(
            unframe(&framed, 0),
            Err(FrameError::Corrupt { .. })
        ));
    }

    #[test]
    fn zero_length_is_corrupt() {
        let buffer = [0u8; 16];
        assert!(matches!(unframe(&buffer, 0), Err(FrameError::Corrupt { .. })));
        assert!(matches!(scan_prev(&buffer, 16), Err(FrameError::Corrupt { .. })));
    }

    #[test]
    fn scan_next_walks_frames_without_checksum() {
        let mut buffer = Vec::new();
        let mut starts = Vec::new();
        for payload in [&b"a"[..], b"bb", b"ccc"] {
            starts.push(buffer.len());
            buffer.extend(frame(payload).unwrap());
        }
        // a bad checksum does not stop scan_next
        buffer[starts[1] + 5] ^= 0xFF;

        let mut at = 0;
        let mut seen = Vec::new();
        while at < buffer.len() {
            seen.push(at);
            at = scan_next(&buffer, at).unwrap();
        }
        assert_eq!(seen, starts);
        assert_eq!(at, buffer.len());
    }

    #[test]
    fn scan_prev_walks_backward() {
        let mut buffer = Vec::new();
        let mut starts = Vec::new();
        for payload in [&b"one"[..], b"two!", b"three"] {
            starts.push(buffer.len());
            buffer.extend(frame(payload).unwrap());
        }

        let mut end = buffer.len();
        let mut seen = Vec::new();
        while end > 0 {
            end = scan_prev(&buffer, end).unwrap();
            seen.push(end);
        }
        starts.reverse();
        assert_eq!(seen, starts);
    }

    #[test]
    fn scan_prev_needs_whole_frame() {
        let framed = frame(b"abcdef").unwrap();
        // drop the first byte: the trailing length points before the buffer
        let err = scan_prev(&framed[1..], framed.len() - 1).unwrap_err();
        assert!(matches!(err, FrameError::Incomplete { .. }));
    }

    #[test]
    fn scan_prev_checks_leading_length() {
        let mut framed = frame(b"abcdef").unwrap();
        framed[3] ^= 0x01;
        assert!(matches!(
            scan_prev(&framed, framed.len()),
            Err(FrameError::Corrupt { .. })
        ));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn unframe_inverts_frame(payload in proptest::collection::vec(any::<u8>(), 1..512)) {
                let framed = frame(&payload).unwrap();
                let (out, len) = unframe(&framed, 0).unwrap();
                prop_assert_eq!(out, payload.as_slice());
                prop_assert_eq!(len as usize, framed.len());
                prop_assert_eq!(scan_prev(&framed, framed.len()).unwrap(), 0);
            }

            #[test]
            fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64), at in 0usize..64) {
                let _ = unframe(&bytes, at);
                let _ = scan_next(&bytes, at);
                let _ = scan_prev(&bytes, at);
            }
        }
    }
}
