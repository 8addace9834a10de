//! # tokstream
//!
//! Marshal Rust values to lazy token streams and unmarshal them back.
//!
//! A value becomes a [`Proc`](core::Proc) that yields one token per pull; a
//! destination becomes a [`Sink`](core::Sink) that accepts one token per
//! push. Everything in [`core`] consumes or produces the same streams: the
//! binary codec, the canonical comparator, Merkle hashing and ref
//! substitution.
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use tokstream::core::{Ctx, DefaultDigester};
//!
//! let mut scores = HashMap::new();
//! scores.insert("ada".to_string(), 3u32);
//! scores.insert("bob".to_string(), 5u32);
//!
//! // Maps are emitted in canonical key order, so bytes and digests are
//! // independent of iteration order.
//! let bytes = tokstream::to_bytes(&scores).unwrap();
//! let back: HashMap<String, u32> = tokstream::from_bytes(&bytes).unwrap();
//! assert_eq!(back, scores);
//!
//! let digest = tokstream::hash_of::<DefaultDigester, _>(&scores).unwrap();
//! assert_eq!(digest.as_bytes().len(), 32);
//!
//! // Decode without knowing the shape.
//! let value: tokstream::Value = tokstream::unmarshal(&Ctx::new(), tokstream::marshal(&Ctx::new(), &scores)).unwrap();
//! assert_eq!(value.kind(), tokstream::core::Kind::Map);
//! ```
//!
//! ## Modules
//!
//! - [`marshal`] / [`unmarshal`] - The traits and their built-in impls
//! - [`object`] - Structs, via the [`object!`] macro
//! - [`tuple`] - Tuples of arity 1 to 8
//! - [`value`] - Dynamically shaped values
//! - [`adapters`] - Text and binary fallbacks, functions
//! - [`registry`] - Type names carried in the stream

pub use tokstream_core as core;

pub mod adapters;
pub mod api;
pub mod error;
pub mod marshal;
pub mod object;
pub mod registry;
pub mod tuple;
pub mod unmarshal;
pub mod value;

pub use adapters::{call, Binary, BinaryMarshal, DynTuple, Text, Thunk};
pub use api::{compare_values, from_bytes, from_reader, hash_of, marshal, to_bytes, to_writer};
pub use error::{Error, RegistryError, Result};
pub use marshal::{marshal_map, marshal_seq, marshal_set, marshal_value, Marshal};
pub use object::{marshal_object, unmarshal_object, Object};
pub use registry::{name_of, register, AnyNamed, Named};
pub use unmarshal::{unmarshal, unmarshal_into, unmarshal_value, Then, Unmarshal};
pub use value::Value;
