//! Byte-level test vectors for the record format.
//!
//! These vectors pin the exact bytes of codec payloads and frames so that
//! any implementation reading the same files agrees with this one.

use offsetlog_codec::Value;
use serde::{Deserialize, Serialize};

/// A test vector that can be shared with other implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded).
    pub input_hex: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
    /// Expected error message (if this should fail).
    pub expected_error: Option<String>,
}

impl TestVector {
    fn ok(id: &str, description: &str, input_hex: &str, expected_hex: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_hex: input_hex.into(),
            expected_hex: expected_hex.into(),
            expected_error: None,
        }
    }

    fn err(id: &str, description: &str, input_hex: &str, error: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_hex: input_hex.into(),
            expected_hex: String::new(),
            expected_error: Some(error.into()),
        }
    }

    /// Decoded input bytes.
    pub fn input(&self) -> Vec<u8> {
        hex_decode(&self.input_hex).expect("Invalid input hex")
    }

    /// Decoded expected bytes.
    pub fn expected(&self) -> Vec<u8> {
        hex_decode(&self.expected_hex).expect("Invalid expected hex")
    }
}

/// CBOR payloads: the value, and the bytes it must encode to.
pub fn cbor_value_vectors() -> Vec<(Value, &'static str)> {
    vec![
        (Value::Null, "f6"),
        (Value::Bool(true), "f5"),
        (Value::Bool(false), "f4"),
        (Value::Integer(0), "00"),
        (Value::Integer(23), "17"),
        (Value::Integer(24), "1818"),
        (Value::Integer(-1), "20"),
        (Value::Integer(1_000_000), "1a000f4240"),
        (Value::Integer(i64::MIN), "3b7fffffffffffffff"),
        (Value::Float(1.5), "fb3ff8000000000000"),
        (Value::Bytes(vec![1, 2, 3]), "43010203"),
        (Value::from("whut"), "6477687574"),
        (
            Value::Array(vec![Value::Integer(1), Value::from("a")]),
            "82016161",
        ),
        (
            Value::map([("abc", true), ("more", false)]),
            "a263616263f5646d6f7265f4",
        ),
    ]
}

/// CBOR inputs every decoder must reject.
pub fn cbor_rejection_vectors() -> Vec<TestVector> {
    vec![
        TestVector::err("cbor_empty", "empty input", "", "unexpected end"),
        TestVector::err("cbor_trailing", "bytes after the value", "f6f6", "trailing"),
        TestVector::err(
            "cbor_non_shortest",
            "integer 1 in two bytes",
            "1801",
            "shortest",
        ),
        TestVector::err(
            "cbor_indefinite",
            "indefinite-length array",
            "9f01ff",
            "indefinite",
        ),
        TestVector::err(
            "cbor_int_key",
            "map with an integer key",
            "a10101",
            "key",
        ),
        TestVector::err(
            "cbor_duplicate_key",
            "map with a repeated key",
            "a2616101616102",
            "duplicate",
        ),
        TestVector::err(
            "cbor_nan",
            "NaN as a double",
            "fb7ff8000000000000",
            "finite",
        ),
        TestVector::err("cbor_tag", "tagged value", "c001", "tag"),
    ]
}

/// Frames: payload in, framed bytes out.
pub fn frame_vectors() -> Vec<TestVector> {
    vec![
        TestVector::ok(
            "frame_abc",
            "three-byte payload",
            "616263",
            "0000000361626345bce84000000003",
        ),
        TestVector::ok(
            "frame_json_whut",
            "JSON string \"whut\"",
            "227768757422",
            "00000006227768757422b3574def00000006",
        ),
        TestVector::ok("frame_cbor_true", "CBOR true", "f5", "00000001f512eec0cf00000001"),
        TestVector::ok(
            "frame_cbor_map",
            "CBOR map {\"abc\":true,\"more\":false}",
            "a263616263f5646d6f7265f4",
            "0000000ca263616263f5646d6f7265f46bc550660000000c",
        ),
    ]
}

/// Start offsets of the demonstration values when appended with the JSON
/// codec, followed by the final write cursor.
pub const SAMPLE_JSON_OFFSETS: [u64; 8] = [0, 18, 49, 73, 89, 111, 134, 171];

/// Start offsets of the demonstration values when appended with the CBOR
/// codec, followed by the final write cursor.
pub const SAMPLE_CBOR_OFFSETS: [u64; 8] = [0, 17, 44, 64, 77, 96, 116, 140];

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hex, or returns None for malformed input.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
