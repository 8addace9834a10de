//! Token: the unit of every stream.
//!
//! A token pairs a [`Kind`] with the payload that kind determines. Streams
//! are flat sequences of tokens; structure is expressed by begin/end pairs.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a token, determining its payload and its sort position.
///
/// Values are gapped so new kinds can be inserted without renumbering.
/// End markers sort lowest so that a shorter container compares less than
/// a longer one sharing its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Kind {
    // End markers (10 - 19)
    ArrayEnd = 10,
    ObjectEnd = 11,
    MapEnd = 12,
    TupleEnd = 13,

    /// A present, empty value.
    Nil = 20,

    Bool = 30,

    // Byte-like scalars (40 - 49)
    String = 40,
    Bytes = 41,

    // Signed integers (50 - 59)
    Int = 50,
    Int8 = 51,
    Int16 = 52,
    Int32 = 53,
    Int64 = 54,

    // Unsigned integers (60 - 69)
    Uint = 60,
    Uint8 = 61,
    Uint16 = 62,
    Uint32 = 63,
    Uint64 = 64,

    // Floats (70 - 79)
    Float32 = 70,
    Float64 = 71,
    /// Every NaN payload is normalized to this kind.
    NaN = 72,

    // Structural begin markers (80 - 89)
    Array = 80,
    Object = 81,
    Map = 82,
    Tuple = 83,

    // Extensions (100+)
    /// A content hash standing in for a subtree.
    Ref = 100,
    /// A digest tag trailing the node it describes.
    Hash = 110,
    /// A registered type name preceding the value it names.
    TypeName = 120,
}

impl Kind {
    /// Convert to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            10 => Self::ArrayEnd,
            11 => Self::ObjectEnd,
            12 => Self::MapEnd,
            13 => Self::TupleEnd,
            20 => Self::Nil,
            30 => Self::Bool,
            40 => Self::String,
            41 => Self::Bytes,
            50 => Self::Int,
            51 => Self::Int8,
            52 => Self::Int16,
            53 => Self::Int32,
            54 => Self::Int64,
            60 => Self::Uint,
            61 => Self::Uint8,
            62 => Self::Uint16,
            63 => Self::Uint32,
            64 => Self::Uint64,
            70 => Self::Float32,
            71 => Self::Float64,
            72 => Self::NaN,
            80 => Self::Array,
            81 => Self::Object,
            82 => Self::Map,
            83 => Self::Tuple,
            100 => Self::Ref,
            110 => Self::Hash,
            120 => Self::TypeName,
            _ => return None,
        })
    }

    /// Check if this kind opens a container.
    pub fn is_begin(self) -> bool {
        matches!(self, Self::Array | Self::Object | Self::Map | Self::Tuple)
    }

    /// Check if this kind closes a container.
    pub fn is_end(self) -> bool {
        matches!(
            self,
            Self::ArrayEnd | Self::ObjectEnd | Self::MapEnd | Self::TupleEnd
        )
    }

    /// The end marker matching a begin marker.
    pub fn end_of(self) -> Option<Self> {
        match self {
            Self::Array => Some(Self::ArrayEnd),
            Self::Object => Some(Self::ObjectEnd),
            Self::Map => Some(Self::MapEnd),
            Self::Tuple => Some(Self::TupleEnd),
            _ => None,
        }
    }

    /// Check if this kind is out-of-band metadata rather than data.
    pub fn is_tag(self) -> bool {
        matches!(self, Self::Hash)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArrayEnd => "array end",
            Self::ObjectEnd => "object end",
            Self::MapEnd => "map end",
            Self::TupleEnd => "tuple end",
            Self::Nil => "nil",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::NaN => "nan",
            Self::Array => "array",
            Self::Object => "object",
            Self::Map => "map",
            Self::Tuple => "tuple",
            Self::Ref => "ref",
            Self::Hash => "hash",
            Self::TypeName => "type name",
        };
        f.write_str(name)
    }
}

/// One stream unit. The payload carried by each variant is fixed by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    ArrayEnd,
    ObjectEnd,
    MapEnd,
    TupleEnd,
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
    Array,
    Object,
    Map,
    Tuple,
    Ref(Bytes),
    Hash(Bytes),
    TypeName(String),
}

impl Token {
    /// The kind of this token.
    pub fn kind(&self) -> Kind {
        match self {
            Self::ArrayEnd => Kind::ArrayEnd,
            Self::ObjectEnd => Kind::ObjectEnd,
            Self::MapEnd => Kind::MapEnd,
            Self::TupleEnd => Kind::TupleEnd,
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::String(_) => Kind::String,
            Self::Bytes(_) => Kind::Bytes,
            Self::Int(_) => Kind::Int,
            Self::Int8(_) => Kind::Int8,
            Self::Int16(_) => Kind::Int16,
            Self::Int32(_) => Kind::Int32,
            Self::Int64(_) => Kind::Int64,
            Self::Uint(_) => Kind::Uint,
            Self::Uint8(_) => Kind::Uint8,
            Self::Uint16(_) => Kind::Uint16,
            Self::Uint32(_) => Kind::Uint32,
            Self::Uint64(_) => Kind::Uint64,
            Self::Float32(_) => Kind::Float32,
            Self::Float64(_) => Kind::Float64,
            Self::NaN => Kind::NaN,
            Self::Array => Kind::Array,
            Self::Object => Kind::Object,
            Self::Map => Kind::Map,
            Self::Tuple => Kind::Tuple,
            Self::Ref(_) => Kind::Ref,
            Self::Hash(_) => Kind::Hash,
            Self::TypeName(_) => Kind::TypeName,
        }
    }

    /// The token for a payload-less kind.
    ///
    /// Returns `None` for kinds that carry a payload.
    pub fn bare(kind: Kind) -> Option<Self> {
        Some(match kind {
            Kind::ArrayEnd => Self::ArrayEnd,
            Kind::ObjectEnd => Self::ObjectEnd,
            Kind::MapEnd => Self::MapEnd,
            Kind::TupleEnd => Self::TupleEnd,
            Kind::Nil => Self::Nil,
            Kind::NaN => Self::NaN,
            Kind::Array => Self::Array,
            Kind::Object => Self::Object,
            Kind::Map => Self::Map,
            Kind::Tuple => Self::Tuple,
            _ => return None,
        })
    }

    /// Build a Float64 token, normalizing NaN to [`Token::NaN`].
    pub fn float64(value: f64) -> Self {
        if value.is_nan() {
            Self::NaN
        } else {
            Self::Float64(value)
        }
    }

    /// Build a Float32 token, normalizing NaN to [`Token::NaN`].
    pub fn float32(value: f32) -> Self {
        if value.is_nan() {
            Self::NaN
        } else {
            Self::Float32(value)
        }
    }

    pub fn is_begin(&self) -> bool {
        self.kind().is_begin()
    }

    pub fn is_end(&self) -> bool {
        self.kind().is_end()
    }
}

impl fmt::Display for Token {
    /// Renders the payload, or the kind for payload-less tokens.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) | Self::TypeName(v) => f.write_str(v),
            Self::Bytes(v) | Self::Ref(v) | Self::Hash(v) => f.write_str(&hex::encode(v)),
            Self::Int(v) | Self::Int64(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Uint(v) | Self::Uint64(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_u8_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Some(kind) = Kind::from_u8(byte) {
                assert_eq!(kind.to_u8(), byte);
            }
        }
        assert_eq!(Kind::from_u8(0), None);
        assert_eq!(Kind::from_u8(14), None);
    }

    #[test]
    fn test_end_markers_sort_lowest() {
        for byte in 0..=u8::MAX {
            if let Some(kind) = Kind::from_u8(byte) {
                if !kind.is_end() {
                    assert!(kind > Kind::TupleEnd, "{kind} sorts below an end marker");
                }
            }
        }
    }

    #[test]
    fn test_begin_end_pairs() {
        assert_eq!(Kind::Array.end_of(), Some(Kind::ArrayEnd));
        assert_eq!(Kind::Object.end_of(), Some(Kind::ObjectEnd));
        assert_eq!(Kind::Map.end_of(), Some(Kind::MapEnd));
        assert_eq!(Kind::Tuple.end_of(), Some(Kind::TupleEnd));
        assert_eq!(Kind::Int.end_of(), None);
        assert!(Token::Map.is_begin());
        assert!(Token::MapEnd.is_end());
    }

    #[test]
    fn test_nan_normalized() {
        assert_eq!(Token::float64(f64::NAN), Token::NaN);
        assert_eq!(Token::float32(f32::NAN), Token::NaN);
        assert_eq!(Token::float64(1.5), Token::Float64(1.5));
    }

    #[test]
    fn test_bare_tokens() {
        assert_eq!(Token::bare(Kind::Tuple), Some(Token::Tuple));
        assert_eq!(Token::bare(Kind::Int), None);
        assert_eq!(Token::bare(Kind::Nil).map(|t| t.kind()), Some(Kind::Nil));
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Int(42).to_string(), "42");
        assert_eq!(Token::String("k".into()).to_string(), "k");
        assert_eq!(Token::Nil.to_string(), "nil");
    }
}
