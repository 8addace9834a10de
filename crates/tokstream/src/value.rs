//! A dynamically shaped value mirroring every token kind.
//!
//! Decoding into [`Value`] accepts any well-formed stream, so it is the
//! destination to use when the shape is not known ahead of time.

use std::slice::Iter;

use bytes::Bytes;
use tokstream_core::{Ctx, Digest, Kind, Proc, Reason, Sink, Token};

use crate::marshal::{marshal_map, marshal_seq, marshal_value, Marshal};
use crate::unmarshal::{container_token, first_token, seq_items, unmarshal_value, Then, Unmarshal};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Int(i64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint(u64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    NaN,
    Array(Vec<Value>),
    /// Fields in stream order.
    Object(Vec<(String, Value)>),
    /// Entries in stream order; marshaling sorts them canonically.
    Map(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Ref(Digest),
}

impl Value {
    /// The value for a scalar or Ref token, or `None` for structural and
    /// tag tokens.
    pub fn from_scalar(token: &Token) -> Option<Value> {
        Some(match token {
            Token::Nil => Value::Nil,
            Token::Bool(v) => Value::Bool(*v),
            Token::String(v) => Value::String(v.clone()),
            Token::Bytes(v) => Value::Bytes(v.clone()),
            Token::Int(v) => Value::Int(*v),
            Token::Int8(v) => Value::Int8(*v),
            Token::Int16(v) => Value::Int16(*v),
            Token::Int32(v) => Value::Int32(*v),
            Token::Int64(v) => Value::Int64(*v),
            Token::Uint(v) => Value::Uint(*v),
            Token::Uint8(v) => Value::Uint8(*v),
            Token::Uint16(v) => Value::Uint16(*v),
            Token::Uint32(v) => Value::Uint32(*v),
            Token::Uint64(v) => Value::Uint64(*v),
            Token::Float32(v) => Value::Float32(*v),
            Token::Float64(v) => Value::Float64(*v),
            Token::NaN => Value::NaN,
            Token::Ref(v) => Value::Ref(Digest(v.clone())),
            _ => return None,
        })
    }

    /// The first token of this value: the scalar itself, or a begin token.
    pub fn head(&self) -> Token {
        match self {
            Value::Nil => Token::Nil,
            Value::Bool(v) => Token::Bool(*v),
            Value::String(v) => Token::String(v.clone()),
            Value::Bytes(v) => Token::Bytes(v.clone()),
            Value::Int(v) => Token::Int(*v),
            Value::Int8(v) => Token::Int8(*v),
            Value::Int16(v) => Token::Int16(*v),
            Value::Int32(v) => Token::Int32(*v),
            Value::Int64(v) => Token::Int64(*v),
            Value::Uint(v) => Token::Uint(*v),
            Value::Uint8(v) => Token::Uint8(*v),
            Value::Uint16(v) => Token::Uint16(*v),
            Value::Uint32(v) => Token::Uint32(*v),
            Value::Uint64(v) => Token::Uint64(*v),
            Value::Float32(v) => Token::float32(*v),
            Value::Float64(v) => Token::float64(*v),
            Value::NaN => Token::NaN,
            Value::Array(_) => Token::Array,
            Value::Object(_) => Token::Object,
            Value::Map(_) => Token::Map,
            Value::Tuple(_) => Token::Tuple,
            Value::Ref(d) => d.to_ref(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.head().kind()
    }

    /// Whether this value may key a map. NaN, arrays and maps may not, nor
    /// may anything containing them.
    pub fn is_comparable_key(&self) -> bool {
        match self {
            Value::NaN | Value::Array(_) | Value::Map(_) => false,
            Value::Float32(v) => !v.is_nan(),
            Value::Float64(v) => !v.is_nan(),
            Value::Object(fields) => fields.iter().all(|(_, v)| v.is_comparable_key()),
            Value::Tuple(items) => items.iter().all(Value::is_comparable_key),
            _ => true,
        }
    }

    /// Look up an object field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::NaN
        } else {
            Value::Float64(v)
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl Marshal for Value {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match self {
            Value::Array(items) => marshal_seq(Token::Array, Token::ArrayEnd, items.iter(), ctx, cont),
            Value::Tuple(items) => marshal_seq(Token::Tuple, Token::TupleEnd, items.iter(), ctx, cont),
            Value::Map(pairs) => marshal_map(pairs.iter().map(|(k, v)| (k, v)), ctx, cont),
            Value::Object(fields) => {
                Proc::once(Token::Object, Some(object_entries(fields.iter(), ctx.clone(), cont)))
            }
            scalar => Proc::once(scalar.head(), cont),
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(false) => true,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Int(v) | Value::Int64(v) => *v == 0,
            Value::Int8(v) => *v == 0,
            Value::Int16(v) => *v == 0,
            Value::Int32(v) => *v == 0,
            Value::Uint(v) | Value::Uint64(v) => *v == 0,
            Value::Uint8(v) => *v == 0,
            Value::Uint16(v) => *v == 0,
            Value::Uint32(v) => *v == 0,
            Value::Float32(v) => *v == 0.0,
            Value::Float64(v) => *v == 0.0,
            Value::Array(items) | Value::Tuple(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            Value::Map(pairs) => pairs.is_empty(),
            _ => false,
        }
    }
}

fn object_entries<'a>(mut fields: Iter<'a, (String, Value)>, ctx: Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
    Proc::new(move || {
        let skip_empty = ctx.options().skip_empty_fields;
        while let Some((name, value)) = fields.next() {
            if skip_empty && value.is_empty_value() {
                continue;
            }
            let field_ctx = ctx.with_field(name);
            let rest = object_entries(fields, ctx, cont);
            let value = marshal_value(value, &field_ctx, Some(rest));
            return Ok((Some(Token::String(name.clone())), Some(value)));
        }
        Ok((Some(Token::ObjectEnd), cont))
    })
}

impl Unmarshal for Value {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        first_token(ctx, move |ctx, token| {
            if let Some(value) = Value::from_scalar(token) {
                return then(value);
            }
            let ctx = ctx.clone();
            match token {
                Token::Array => Ok(Some(seq_items::<Value>(
                    ctx,
                    Kind::ArrayEnd,
                    Vec::new(),
                    Box::new(move |items: Vec<Value>| then(Value::Array(items))),
                ))),
                Token::Tuple => Ok(Some(seq_items::<Value>(
                    ctx,
                    Kind::TupleEnd,
                    Vec::new(),
                    Box::new(move |items: Vec<Value>| then(Value::Tuple(items))),
                ))),
                Token::Object => Ok(Some(object_fields(ctx, Vec::new(), then))),
                Token::Map => Ok(Some(map_pairs(ctx, Vec::new(), then))),
                t => Err(ctx.unmarshal_error(Reason::unexpected(Some(t), Kind::Nil))),
            }
        })
    }
}

fn object_fields<'a>(ctx: Ctx, mut fields: Vec<(String, Value)>, then: Then<'a, Value>) -> Sink<'a> {
    Sink::new(move |token| {
        let name = match token {
            Some(Token::ObjectEnd) => return then(Value::Object(fields)),
            Some(Token::String(name)) => name.clone(),
            Some(t) if t.is_end() => return Err(ctx.unmarshal_error(Reason::UnexpectedEndToken)),
            None => return Err(ctx.unmarshal_error(Reason::MissingEnd)),
            Some(t) => return Err(ctx.unmarshal_error(Reason::unexpected(Some(t), Kind::String))),
        };
        let field_ctx = ctx.with_field(&name);
        if fields.iter().any(|(seen, _)| *seen == name) {
            return Err(field_ctx.unmarshal_error(Reason::DuplicateField(name)));
        }
        Ok(Some(unmarshal_value::<Value>(
            &field_ctx,
            Box::new(move |value: Value| {
                fields.push((name, value));
                Ok(Some(object_fields(ctx, fields, then)))
            }),
        )))
    })
}

fn map_pairs<'a>(ctx: Ctx, mut pairs: Vec<(Value, Value)>, then: Then<'a, Value>) -> Sink<'a> {
    Sink::new(move |token| {
        if container_token(&ctx, token, Kind::MapEnd)? {
            return then(Value::Map(pairs));
        }
        let key_token = token.cloned().unwrap_or(Token::Nil);
        let key_ctx = ctx.clone();
        let sink = unmarshal_value::<Value>(
            &key_ctx,
            Box::new(move |key: Value| {
                let value_ctx = ctx.with_key(key_token);
                if !key.is_comparable_key() {
                    return Err(value_ctx.unmarshal_error(Reason::BadMapKey));
                }
                Ok(Some(unmarshal_value::<Value>(
                    &value_ctx,
                    Box::new(move |value: Value| {
                        pairs.push((key, value));
                        Ok(Some(map_pairs(ctx, pairs, then)))
                    }),
                )))
            }),
        );
        sink.feed(token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unmarshal::unmarshal;
    use std::collections::BTreeMap;
    use tokstream_core::collect;

    fn decode(tokens: Vec<Token>) -> tokstream_core::Result<Value> {
        unmarshal(&Ctx::new(), Proc::from_tokens(tokens))
    }

    #[test]
    fn test_typed_stream_decodes_dynamically() {
        let mut typed = BTreeMap::new();
        typed.insert("b".to_string(), vec![1u16, 2]);
        typed.insert("a".to_string(), vec![]);
        let ctx = Ctx::new();
        let value: Value = unmarshal(&ctx, marshal_value(&typed, &ctx, None)).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::from("a"), Value::Array(vec![])),
                (Value::from("b"), Value::Array(vec![Value::Uint16(1), Value::Uint16(2)])),
            ])
        );
    }

    #[test]
    fn test_roundtrip_keeps_stream() {
        let tokens = vec![
            Token::Object,
            Token::String("id".into()),
            Token::Int(7),
            Token::String("pair".into()),
            Token::Tuple,
            Token::NaN,
            Token::Bytes(Bytes::from_static(b"\x01")),
            Token::TupleEnd,
            Token::String("link".into()),
            Token::Ref(Bytes::from_static(&[9; 32])),
            Token::ObjectEnd,
        ];
        let value = decode(tokens.clone()).unwrap();
        assert_eq!(value.get("id"), Some(&Value::Int(7)));
        assert_eq!(collect(marshal_value(&value, &Ctx::new(), None)).unwrap(), tokens);
    }

    #[test]
    fn test_map_marshals_in_canonical_order() {
        let value = Value::Map(vec![
            (Value::Int(80), Value::Nil),
            (Value::Int(42), Value::Nil),
        ]);
        let out = collect(marshal_value(&value, &Ctx::new(), None)).unwrap();
        assert_eq!(out[1], Token::Int(42));
        assert_eq!(out[3], Token::Int(80));
    }

    #[test]
    fn test_bad_map_keys() {
        let nan_key = vec![Token::Map, Token::NaN, Token::Nil, Token::MapEnd];
        assert_eq!(decode(nan_key).unwrap_err().reason(), Some(&Reason::BadMapKey));

        let array_key = vec![
            Token::Map,
            Token::Array,
            Token::ArrayEnd,
            Token::Nil,
            Token::MapEnd,
        ];
        assert_eq!(decode(array_key).unwrap_err().reason(), Some(&Reason::BadMapKey));

        let tuple_key = vec![
            Token::Map,
            Token::Tuple,
            Token::Int(1),
            Token::TupleEnd,
            Token::Nil,
            Token::MapEnd,
        ];
        assert!(decode(tuple_key).is_ok());
    }

    #[test]
    fn test_duplicate_object_field() {
        let tokens = vec![
            Token::Object,
            Token::String("a".into()),
            Token::Nil,
            Token::String("a".into()),
            Token::Nil,
            Token::ObjectEnd,
        ];
        let err = decode(tokens).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::DuplicateField("a".into())));
        assert_eq!(err.path().unwrap().to_string(), "/a");
    }

    #[test]
    fn test_type_names_and_structural_errors() {
        let named = vec![Token::TypeName("point".into()), Token::Bool(true)];
        assert_eq!(decode(named).unwrap(), Value::Bool(true));

        let err = decode(vec![Token::Array, Token::Nil]).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::MissingEnd));

        let err = decode(vec![Token::Array, Token::MapEnd]).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::UnexpectedEndToken));

        let err = decode(vec![Token::Hash(Bytes::from_static(&[0; 32]))]).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::UnexpectedHashToken));
    }

    #[test]
    fn test_empty_values_skipped() {
        let value = Value::Object(vec![
            ("zero".into(), Value::Int(0)),
            ("list".into(), Value::Array(vec![])),
            ("name".into(), Value::from("x")),
        ]);
        let ctx = Ctx::new().skip_empty_fields(true);
        let out = collect(marshal_value(&value, &ctx, None)).unwrap();
        assert_eq!(
            out,
            vec![
                Token::Object,
                Token::String("name".into()),
                Token::String("x".into()),
                Token::ObjectEnd,
            ]
        );
    }
}
