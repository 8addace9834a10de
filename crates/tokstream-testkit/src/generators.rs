//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use tokstream::core::Digest;
use tokstream::Value;

/// Generate an integer value of any width.
pub fn int_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<i8>().prop_map(Value::Int8),
        any::<i16>().prop_map(Value::Int16),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        any::<u64>().prop_map(Value::Uint),
        any::<u8>().prop_map(Value::Uint8),
        any::<u16>().prop_map(Value::Uint16),
        any::<u32>().prop_map(Value::Uint32),
        any::<u64>().prop_map(Value::Uint64),
    ]
}

/// Generate a scalar value. Floats are finite; NaN has its own variant.
pub fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        ".{0,16}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(|b| Value::Bytes(Bytes::from(b))),
        int_value(),
        (-1.0e9f32..1.0e9f32).prop_map(Value::Float32),
        (-1.0e300f64..1.0e300f64).prop_map(Value::Float64),
        Just(Value::NaN),
        any::<[u8; 32]>().prop_map(|b| Value::Ref(Digest::from_slice(&b))),
    ]
}

/// Generate a value usable as a map key.
pub fn map_key() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,8}".prop_map(Value::String),
        int_value(),
    ]
}

/// Generate an arbitrarily nested value.
pub fn value() -> impl Strategy<Value = Value> {
    scalar_value().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Tuple),
            prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
            prop::collection::vec((map_key(), inner), 0..6).prop_map(Value::Map),
        ]
    })
}

/// Generate map entries with integer keys.
pub fn int_map_entries(max_len: usize) -> impl Strategy<Value = Vec<(i64, String)>> {
    prop::collection::btree_map(any::<i64>(), "[a-z0-9]{0,8}", 0..=max_len)
        .prop_map(|entries| entries.into_iter().collect())
}
