//! Strict CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::MAX_DEPTH;
use std::collections::HashSet;

/// Decode exactly one value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, contain forbidden
/// constructs (tags, indefinite lengths, non-shortest integers, non-64-bit
/// floats, non-text or duplicate map keys), or are followed by extra bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CborDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A strict CBOR decoder.
///
/// Accepts only what [`crate::CborEncoder`] produces.
pub struct CborDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> CborDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.decode_at(0)
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn decode_at(&mut self, depth: usize) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                // Negative integer: value is -(n+1)
                let n = self.decode_unsigned(additional_info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(Value::Integer(-n - 1))
            }
            2 => {
                let bytes = self.decode_string_bytes(additional_info)?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            3 => self.decode_text(additional_info).map(Value::Text),
            4 => self.decode_array(additional_info, depth),
            5 => self.decode_map(additional_info, depth),
            6 => Err(CodecError::unsupported_type("cbor", "tag")),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.data.len() - self.pos {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let value = u16::from_be_bytes(self.read_array()?);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let value = u32::from_be_bytes(self.read_array()?);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let value = u64::from_be_bytes(self.read_array()?);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        let len = self.decode_unsigned(additional_info)?;
        if len > max {
            return Err(CodecError::SizeLimitExceeded { size: len, max });
        }
        usize::try_from(len).map_err(|_| CodecError::SizeLimitExceeded { size: len, max })
    }

    fn decode_string_bytes(&mut self, additional_info: u8) -> CodecResult<&'a [u8]> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        self.read_bytes(len)
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let bytes = self.decode_string_bytes(additional_info)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn decode_array(&mut self, additional_info: u8, depth: usize) -> CodecResult<Value> {
        if depth >= MAX_DEPTH {
            return Err(CodecError::DepthLimitExceeded { max: MAX_DEPTH });
        }
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        // Every item takes at least one byte.
        let mut items = Vec::with_capacity(len.min(self.remaining().len()));
        for _ in 0..len {
            items.push(self.decode_at(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8, depth: usize) -> CodecResult<Value> {
        if depth >= MAX_DEPTH {
            return Err(CodecError::DepthLimitExceeded { max: MAX_DEPTH });
        }
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let capacity = len.min(self.remaining().len() / 2);
        let mut pairs = Vec::with_capacity(capacity);
        let mut seen = HashSet::with_capacity(capacity);

        for _ in 0..len {
            let key_byte = self.read_byte()?;
            if key_byte >> 5 != 3 {
                return Err(CodecError::invalid_structure("map keys must be text"));
            }
            let key = self.decode_text(key_byte & 0x1f)?;
            if !seen.insert(key.clone()) {
                return Err(CodecError::DuplicateKey { key });
            }
            let value = self.decode_at(depth + 1)?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must be 64-bit",
            )),
            27 => {
                let f = f64::from_bits(u64::from_be_bytes(self.read_array()?));
                if !f.is_finite() {
                    return Err(CodecError::NonFiniteFloat);
                }
                Ok(Value::Float(f))
            }
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            other => Err(CodecError::unsupported_type(
                "cbor",
                format!("simple value {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_null_and_bool() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf4]).unwrap(), Value::Bool(false));
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x00]).unwrap(), Value::Integer(0));
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x18, 24]).unwrap(), Value::Integer(24));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x20]).unwrap(), Value::Integer(-1));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_integer_extremes() {
        let max = [0x1b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(from_cbor(&max).unwrap(), Value::Integer(i64::MAX));

        let min = [0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(from_cbor(&min).unwrap(), Value::Integer(i64::MIN));
    }

    #[test]
    fn reject_integer_overflow() {
        let too_big = [0x1b, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(from_cbor(&too_big), Err(CodecError::IntegerOverflow));

        let too_small = [0x3b, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(from_cbor(&too_small), Err(CodecError::IntegerOverflow));
    }

    #[test]
    fn decode_double_float() {
        let bytes = [0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0];
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn reject_short_floats() {
        assert!(matches!(
            from_cbor(&[0xf9, 0x00, 0x00]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0xfa, 0x00, 0x00, 0x00, 0x00]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_non_finite_float() {
        let nan = f64::NAN.to_bits().to_be_bytes();
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&nan);
        assert_eq!(from_cbor(&bytes), Err(CodecError::NonFiniteFloat));
    }

    #[test]
    fn decode_text_and_bytes() {
        assert_eq!(from_cbor(&[0x60]).unwrap(), Value::Text(String::new()));
        assert_eq!(
            from_cbor(&[0x61, b'a']).unwrap(),
            Value::Text("a".to_string())
        );
        assert_eq!(
            from_cbor(&[0x43, 1, 2, 3]).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn decode_map_keeps_order() {
        let bytes = [0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02];
        assert_eq!(
            from_cbor(&bytes).unwrap(),
            Value::map([("b", 1i64), ("a", 2)])
        );
    }

    #[test]
    fn reject_non_text_map_key() {
        assert!(matches!(
            from_cbor(&[0xa1, 0x01, 0x01]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_duplicate_map_key() {
        let bytes = [0xa2, 0x61, b'a', 0x01, 0x61, b'a', 0x02];
        assert_eq!(
            from_cbor(&bytes),
            Err(CodecError::DuplicateKey {
                key: "a".to_string()
            })
        );
    }

    #[test]
    fn reject_tags() {
        assert!(matches!(
            from_cbor(&[0xc1, 0x00]),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn reject_indefinite_length() {
        assert_eq!(
            from_cbor(&[0x5f, 0x41, b'a', 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
        assert_eq!(
            from_cbor(&[0x7f, 0x61, b'a', 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
        assert_eq!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
        assert_eq!(
            from_cbor(&[0xbf, 0x61, b'a', 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
    }

    #[test]
    fn reject_non_shortest_encoding() {
        assert!(matches!(
            from_cbor(&[0x18, 23]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0x19, 0x00, 0xff]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert_eq!(
            from_cbor(&[0x01, 0x02, 0x03]),
            Err(CodecError::TrailingBytes { count: 2 })
        );
    }

    #[test]
    fn reject_deep_nesting() {
        let mut bytes = vec![0x81; MAX_DEPTH + 1];
        bytes.push(0xf6);
        assert_eq!(
            from_cbor(&bytes),
            Err(CodecError::DepthLimitExceeded { max: MAX_DEPTH })
        );

        let mut ok = vec![0x81; MAX_DEPTH];
        ok.push(0xf6);
        assert!(from_cbor(&ok).is_ok());
    }

    #[test]
    fn unexpected_eof() {
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x18]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x19, 0x01]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x82, 0x01]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn oversized_claim_fails_without_allocating() {
        // array claiming 2^32 elements with no content
        let bytes = [0x9b, 0, 0, 0, 1, 0, 0, 0, 0];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert_eq!(from_cbor(&[0x62, 0xff, 0xfe]), Err(CodecError::InvalidUtf8));
    }
}
