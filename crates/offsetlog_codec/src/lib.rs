//! # offsetlog codec
//!
//! The value model stored in log records and the codecs that turn values into
//! record payloads.
//!
//! A [`Codec`] is a pair of pure functions between [`Value`] and bytes. The log
//! never looks inside a payload; it only requires that `decode(encode(v)) == v`
//! and that encoding is deterministic.
//!
//! Two codecs ship with the crate:
//!
//! - [`CborCodec`]: compact binary CBOR, shortest-form integers, 64-bit
//!   floats, definite lengths, text keys. Supports every [`Value`] variant.
//! - [`JsonCodec`]: JSON text. Byte strings are unsupported.
//!
//! Both preserve map key order and reject duplicate keys, non-finite floats
//! and nesting deeper than [`MAX_DEPTH`].
//!
//! ## Usage
//!
//! ```
//! use offsetlog_codec::{CborCodec, Codec, Value};
//!
//! let codec = CborCodec::new();
//! let value = Value::map([("greets", "hello!")]);
//!
//! let bytes = codec.encode(&value).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_cbor, CborDecoder};
pub use encoder::{to_cbor, CborEncoder};
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use value::Value;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maximum container nesting accepted by every codec.
///
/// Kept below `serde_json`'s own recursion limit so JSON reports the same
/// error as CBOR.
pub const MAX_DEPTH: usize = 100;

/// Default upper bound on a single encoded value, in bytes.
pub const DEFAULT_MAX_ENCODED_SIZE: usize = 16 * 1024 * 1024;

/// Converts record values to payload bytes and back.
///
/// Implementations must be deterministic and satisfy the round-trip law
/// `decode(encode(v)) == v` for every value they accept.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Short identifier, e.g. `"cbor"`.
    fn name(&self) -> &'static str;

    /// Encode a value into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value lies outside the codec's domain or the
    /// encoding exceeds the size limit.
    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>>;

    /// Decode payload bytes into a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Value>;
}

/// Binary CBOR codec.
#[derive(Debug, Clone, Copy)]
pub struct CborCodec {
    max_size: usize,
}

impl CborCodec {
    /// Creates a CBOR codec with the default size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_ENCODED_SIZE,
        }
    }

    /// Creates a CBOR codec that rejects encodings larger than `max_size`.
    #[must_use]
    pub const fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// The configured size limit.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for CborCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        let bytes = to_cbor(value)?;
        check_size(bytes.len(), self.max_size)?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        check_size(bytes.len(), self.max_size)?;
        from_cbor(bytes)
    }
}

pub(crate) fn check_size(size: usize, max: usize) -> CodecResult<()> {
    if size > max {
        return Err(CodecError::SizeLimitExceeded {
            size: size as u64,
            max: max as u64,
        });
    }
    Ok(())
}

/// Names a built-in codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecKind {
    /// [`CborCodec`].
    #[default]
    Cbor,
    /// [`JsonCodec`].
    Json,
}

impl CodecKind {
    /// Builds the named codec with the given size limit.
    #[must_use]
    pub fn build(self, max_size: usize) -> Arc<dyn Codec> {
        match self {
            CodecKind::Cbor => Arc::new(CborCodec::with_max_size(max_size)),
            CodecKind::Json => Arc::new(JsonCodec::with_max_size(max_size)),
        }
    }

    /// The codec's identifier, matching [`Codec::name`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CodecKind::Cbor => "cbor",
            CodecKind::Json => "json",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cbor" => Ok(CodecKind::Cbor),
            "json" => Ok(CodecKind::Json),
            other => Err(CodecError::unsupported_type("codec", other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::map([
            ("users", Value::Array(vec![
                Value::map([("name", Value::from("Alice")), ("age", Value::from(30i64))]),
                Value::map([("name", Value::from("Bob")), ("score", Value::from(0.75))]),
            ])),
            ("count", Value::Integer(2)),
            ("active", Value::Bool(true)),
            ("nothing", Value::Null),
        ])
    }

    #[test]
    fn cbor_roundtrip_nested() {
        let codec = CborCodec::new();
        let value = sample();
        assert_eq!(codec.decode(&codec.encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn cbor_roundtrip_bytes() {
        let codec = CborCodec::new();
        let value = Value::Bytes(vec![0, 1, 2, 255]);
        assert_eq!(codec.decode(&codec.encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn json_roundtrip_nested() {
        let codec = JsonCodec::new();
        let value = sample();
        assert_eq!(codec.decode(&codec.encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn cbor_size_limit() {
        let codec = CborCodec::with_max_size(8);
        assert!(matches!(
            codec.encode(&Value::Text("longer than eight".into())),
            Err(CodecError::SizeLimitExceeded { max: 8, .. })
        ));
        assert!(matches!(
            codec.decode(&[0u8; 9]),
            Err(CodecError::SizeLimitExceeded { size: 9, max: 8 })
        ));
    }

    #[test]
    fn codec_kind_parse_and_display() {
        assert_eq!("cbor".parse::<CodecKind>().unwrap(), CodecKind::Cbor);
        assert_eq!("JSON".parse::<CodecKind>().unwrap(), CodecKind::Json);
        assert!("xml".parse::<CodecKind>().is_err());
        assert_eq!(CodecKind::Json.to_string(), "json");
    }

    #[test]
    fn codec_kind_builds_named_codec() {
        for kind in [CodecKind::Cbor, CodecKind::Json] {
            let codec = kind.build(DEFAULT_MAX_ENCODED_SIZE);
            assert_eq!(codec.name(), kind.as_str());
        }
    }

    #[test]
    fn codecs_disagree_on_bytes() {
        let value = Value::Bytes(vec![1, 2, 3]);
        assert!(CborCodec::new().encode(&value).is_ok());
        assert!(JsonCodec::new().encode(&value).is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use proptest::prelude::prop;

        fn leaf() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Integer),
                (-1.0e12f64..1.0e12).prop_map(Value::Float),
                ".{0,12}".prop_map(Value::Text),
            ]
        }

        fn value() -> impl Strategy<Value = Value> {
            leaf().prop_recursive(4, 32, 6, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                    prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                        .prop_map(|m| Value::Map(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn cbor_roundtrips(v in value()) {
                let codec = CborCodec::new();
                prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
            }

            #[test]
            fn json_roundtrips(v in value()) {
                let codec = JsonCodec::new();
                prop_assert_eq!(codec.decode(&codec.encode(&v).unwrap()).unwrap(), v);
            }

            #[test]
            fn cbor_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
                let _ = CborCodec::new().decode(&bytes);
            }
        }
    }
}
