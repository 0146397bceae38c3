//! JSON codec and the serde impls behind it.
//!
//! `Value` serializes through serde in its own order, so a map written as
//! `{"b":1,"a":2}` reads back with `b` first.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::{Codec, DEFAULT_MAX_ENCODED_SIZE};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Encodes values as compact JSON text.
///
/// Byte strings have no JSON form and are rejected on encode.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    max_size: usize,
}

impl JsonCodec {
    /// Creates a JSON codec with the default size limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_ENCODED_SIZE,
        }
    }

    /// Creates a JSON codec that rejects encodings larger than `max_size`.
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

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        value.validate()?;
        reject_bytes(value)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        crate::check_size(bytes.len(), self.max_size)?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        crate::check_size(bytes.len(), self.max_size)?;
        let value: Value = serde_json::from_slice(bytes).map_err(map_json_error)?;
        value.validate()?;
        Ok(value)
    }
}

fn reject_bytes(value: &Value) -> CodecResult<()> {
    match value {
        Value::Bytes(_) => Err(CodecError::unsupported_type("json", "bytes")),
        Value::Array(items) => items.iter().try_for_each(reject_bytes),
        Value::Map(pairs) => pairs.iter().try_for_each(|(_, v)| reject_bytes(v)),
        _ => Ok(()),
    }
}

fn map_json_error(err: serde_json::Error) -> CodecError {
    match err.classify() {
        serde_json::error::Category::Eof => CodecError::UnexpectedEof,
        _ => CodecError::decoding_failed(err.to_string()),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-compatible value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Integer(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {n} out of i64 range")))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_bytes<E: de::Error>(self, b: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(b.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, b: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(b))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0).min(4096));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            pairs.push((key, value));
        }
        Ok(Value::Map(pairs))
    }
}
