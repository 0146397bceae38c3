//! Deterministic CBOR encoder.

use crate::error::CodecResult;
use crate::value::Value;

/// Encode a value to deterministic CBOR bytes.
///
/// The output follows these rules:
/// - Integers use the shortest possible encoding
/// - Floats are always written as 64-bit (`0xfb`)
/// - Lengths are always definite
/// - Map keys are text and keep the value's order
///
/// # Errors
///
/// Returns an error if the value fails [`Value::validate`].
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    value.validate()?;
    let mut encoder = CborEncoder::new();
    encoder.encode(value);
    Ok(encoder.into_bytes())
}

/// A deterministic CBOR encoder.
///
/// The encoder itself does not validate; [`to_cbor`] checks the value first.
pub struct CborEncoder {
    buffer: Vec<u8>,
}

impl CborEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value, appending to the buffer.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f),
            Value::Bytes(b) => self.encode_bytes(b),
            Value::Text(s) => self.encode_text(s),
            Value::Array(arr) => {
                self.encode_unsigned(4, arr.len() as u64);
                for item in arr {
                    self.encode(item);
                }
            }
            Value::Map(pairs) => {
                self.encode_unsigned(5, pairs.len() as u64);
                for (key, item) in pairs {
                    self.encode_text(key);
                    self.encode(item);
                }
            }
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1); for n in [-2^63, -1]
            // that lies in [0, 2^63-1].
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    fn encode_float(&mut self, f: f64) {
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_bytes(&mut self, bytes: &[u8]) {
        self.encode_unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }
}

impl Default for CborEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn encode_null_and_bool() {
        assert_eq!(to_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn encode_small_positive_integers() {
        assert_eq!(to_cbor(&Value::Integer(0)).unwrap(), vec![0x00]);
        assert_eq!(to_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
    }

    #[test]
    fn encode_integers_use_shortest_form() {
        assert_eq!(to_cbor(&Value::Integer(24)).unwrap(), vec![0x18, 24]);
        assert_eq!(to_cbor(&Value::Integer(255)).unwrap(), vec![0x18, 255]);
        assert_eq!(
            to_cbor(&Value::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_cbor(&Value::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            to_cbor(&Value::Integer(i64::MAX)).unwrap(),
            vec![0x1b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_negative_integers() {
        assert_eq!(to_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(to_cbor(&Value::Integer(-24)).unwrap(), vec![0x37]);
        assert_eq!(to_cbor(&Value::Integer(-25)).unwrap(), vec![0x38, 24]);
        assert_eq!(
            to_cbor(&Value::Integer(i64::MIN)).unwrap(),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_float_is_always_double() {
        assert_eq!(
            to_cbor(&Value::Float(1.5)).unwrap(),
            vec![0xfb, 0x3f, 0xf8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(to_cbor(&Value::Float(0.0)).unwrap().len(), 9);
    }

    #[test]
    fn encode_rejects_nan() {
        assert_eq!(
            to_cbor(&Value::Float(f64::NAN)),
            Err(CodecError::NonFiniteFloat)
        );
    }

    #[test]
    fn encode_bytes_and_text() {
        assert_eq!(to_cbor(&Value::Bytes(vec![])).unwrap(), vec![0x40]);
        assert_eq!(
            to_cbor(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3]
        );
        assert_eq!(to_cbor(&Value::Text(String::new())).unwrap(), vec![0x60]);
        assert_eq!(
            to_cbor(&Value::Text("hello".to_string())).unwrap(),
            vec![0x65, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn encode_array() {
        assert_eq!(to_cbor(&Value::Array(vec![])).unwrap(), vec![0x80]);
        assert_eq!(
            to_cbor(&Value::Array(vec![Value::Integer(1), Value::Integer(2)])).unwrap(),
            vec![0x82, 0x01, 0x02]
        );
    }

    #[test]
    fn encode_map_keeps_key_order() {
        let map = Value::map([("bb", 2i64), ("a", 1)]);
        let bytes = to_cbor(&map).unwrap();

        // map(2), "bb", 2, "a", 1
        assert_eq!(bytes, vec![0xa2, 0x62, b'b', b'b', 0x02, 0x61, b'a', 0x01]);
    }

    #[test]
    fn encode_rejects_duplicate_keys() {
        let map = Value::map([("a", 1i64), ("a", 2)]);
        assert!(matches!(
            to_cbor(&map),
            Err(CodecError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = Value::map([
            ("z", Value::Float(0.25)),
            ("a", Value::Array(vec![Value::Null, Value::Integer(-7)])),
        ]);
        assert_eq!(to_cbor(&value).unwrap(), to_cbor(&value.clone()).unwrap());
    }
}
