//! # tokstream core
//!
//! Token streams and the machinery that consumes and produces them.
//!
//! This crate knows nothing about Rust value shapes. It defines the token
//! model, the producer/consumer step abstractions, and the generic consumers
//! built on them.
//!
//! ## Key Types
//!
//! - [`Token`] / [`Kind`] - One stream unit and its single-byte discriminator
//! - [`Proc`] / [`Sink`] - Suspended producer and consumer steps
//! - [`Ctx`] - Options, diagnostic path and cycle guard for a traversal
//! - [`Tree`] - A finished value retained for replay, hashing and lookup
//! - [`Digest`] - A content digest produced by a [`Digester`]
//!
//! ## Consumers
//!
//! - [`compare`] - Canonical total order over streams
//! - [`codec`] - Binary wire format
//! - [`hash`] - Streaming Merkle hashing
//! - [`reference`] - Ref resolution and subtree storage

pub mod codec;
pub mod compare;
pub mod ctx;
pub mod error;
pub mod hash;
pub mod reference;
pub mod stream;
pub mod token;
pub mod tree;

pub use codec::{decoder, encode_token, encoder, read_token, to_vec, token_bytes, MAX_LEN};
pub use compare::{cmp_token, compare, compare_bytes, compare_tokens};
pub use ctx::{Ctx, MarshalHook, Options, UnmarshalHook, DEFAULT_CYCLE_CHECK_DEPTH};
pub use error::{Error, Path, Reason, Result, Segment};
pub use hash::{
    container_digest, hash_proc, hash_sink, hash_sum, post_hash, scalar_digest, DefaultDigester,
    Digest, Digester,
};
pub use reference::{deref, InsertResult, MemoryRefStore, RefStore};
pub use stream::{
    alt_sink, collect, concat_procs, concat_sinks, copy, filter_proc, filter_sink, strip_tags,
    tee, Proc, Sink, SinkResult, Step,
};
pub use token::{Kind, Token};
pub use tree::{find_by_hash, Node, NodeId, Tree};
