//! Property-based test generators using proptest.
//!
//! Provides strategies for generating values every codec accepts: finite
//! floats, unique map keys, bounded nesting.

use offsetlog_codec::Value;
use proptest::prelude::*;

/// Strategy for map keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for finite floats.
///
/// Bounded so that JSON text keeps every float exactly.
pub fn float_strategy() -> impl Strategy<Value = f64> {
    -1.0e12f64..1.0e12
}

fn scalar_strategy(with_bytes: bool) -> BoxedStrategy<Value> {
    let scalars = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        float_strategy().prop_map(Value::Float),
        ".{0,16}".prop_map(Value::Text),
    ];
    if with_bytes {
        prop_oneof![
            5 => scalars,
            1 => prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        ]
        .boxed()
    } else {
        scalars.boxed()
    }
}

fn nested(leaf: BoxedStrategy<Value>) -> impl Strategy<Value = Value> {
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..6).prop_map(unique_keys),
        ]
    })
}

/// Keeps the first occurrence of each key, preserving order.
fn unique_keys(pairs: Vec<(String, Value)>) -> Value {
    let mut seen = std::collections::HashSet::new();
    Value::Map(
        pairs
            .into_iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect(),
    )
}

/// Strategy for any value the CBOR codec accepts.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    nested(scalar_strategy(true))
}

/// Strategy for values both codecs accept (no byte strings).
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    nested(scalar_strategy(false))
}

/// Strategy for a batch of values to append in order.
pub fn value_batch_strategy(
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(json_value_strategy(), min..max)
}

/// Strategy for raw record payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..1024)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
