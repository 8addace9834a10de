//! Streaming Merkle hashing over token streams.
//!
//! Node digests are defined bottom-up:
//! - scalar: `H(canonical bytes of the token)`
//! - container: `H(canonical bytes of the begin token || d(child_1) || ... || d(child_n))`
//! - ref: the referenced digest itself, so a ref-substituted stream hashes
//!   exactly like the stream it abbreviates
//!
//! The digest of a whole stream is `H(d(v_1) || ... || d(v_n))` over its
//! top-level values. Type names and existing hash tags are not hashed.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::token_bytes;
use crate::error::{Error, Path, Reason, Result};
use crate::stream::{Proc, Sink, SinkResult};
use crate::token::{Kind, Token};

/// A content digest of arbitrary width.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(pub Bytes);

impl Digest {
    /// Create from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(Bytes::from(hex::decode(s)?)))
    }

    /// The tag token carrying this digest.
    pub fn to_token(&self) -> Token {
        Token::Hash(self.0.clone())
    }

    /// The ref token standing in for the subtree with this digest.
    pub fn to_ref(&self) -> Token {
        Token::Ref(self.0.clone())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Digest({})", &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A fresh-per-node digest function.
pub trait Digester: Default {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Digest;
}

impl Digester for blake3::Hasher {
    fn update(&mut self, data: &[u8]) {
        blake3::Hasher::update(self, data);
    }

    fn finalize(self) -> Digest {
        Digest::from_slice(blake3::Hasher::finalize(&self).as_bytes())
    }
}

impl Digester for sha2::Sha256 {
    fn update(&mut self, data: &[u8]) {
        sha2::Digest::update(self, data);
    }

    fn finalize(self) -> Digest {
        Digest::from_slice(&sha2::Digest::finalize(self))
    }
}

/// The digest used when none is specified.
pub type DefaultDigester = blake3::Hasher;

/// Digest of a scalar token.
pub fn scalar_digest<D: Digester>(token: &Token) -> Digest {
    let mut d = D::default();
    d.update(&token_bytes(token));
    d.finalize()
}

/// Digest of a container from its begin token and its children's digests.
pub fn container_digest<'d, D, I>(begin: &Token, children: I) -> Digest
where
    D: Digester,
    I: IntoIterator<Item = &'d Digest>,
{
    let mut d = D::default();
    d.update(&token_bytes(begin));
    for child in children {
        d.update(child.as_bytes());
    }
    d.finalize()
}

fn shape_error(reason: Reason) -> Error {
    Error::Unmarshal {
        reason,
        path: Path::default(),
    }
}

/// Digest states for the open containers, plus the implicit top level.
struct HashState<D> {
    stack: Vec<(Kind, D)>,
    top: D,
}

impl<D: Digester> HashState<D> {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            top: D::default(),
        }
    }

    /// Mix in one token, returning the digest of the node it completes.
    fn push(&mut self, token: &Token) -> Result<Option<Digest>> {
        let digest = match token {
            Token::Hash(_) | Token::TypeName(_) => return Ok(None),
            Token::Ref(hash) => Digest(hash.clone()),
            t if t.is_begin() => {
                let mut d = D::default();
                d.update(&token_bytes(t));
                self.stack.push((t.kind(), d));
                return Ok(None);
            }
            t if t.is_end() => {
                let (begin, d) = self
                    .stack
                    .pop()
                    .ok_or_else(|| shape_error(Reason::UnexpectedEndToken))?;
                if begin.end_of() != Some(t.kind()) {
                    return Err(shape_error(Reason::UnexpectedEndToken));
                }
                d.finalize()
            }
            t => scalar_digest::<D>(t),
        };
        match self.stack.last_mut() {
            Some((_, parent)) => parent.update(digest.as_bytes()),
            None => self.top.update(digest.as_bytes()),
        }
        Ok(Some(digest))
    }

    fn finish(self) -> Result<Digest> {
        if !self.stack.is_empty() {
            return Err(shape_error(Reason::MissingEnd));
        }
        Ok(self.top.finalize())
    }
}

/// Digest of a whole stream.
pub fn hash_sum<D: Digester>(proc: Proc<'_>) -> Result<Digest> {
    let mut state = HashState::<D>::new();
    let mut proc = Some(proc);
    while let Some(current) = proc {
        let (token, next) = current.step()?;
        if let Some(token) = token {
            state.push(&token)?;
        }
        proc = next;
    }
    state.finish()
}

/// A sink hashing everything it receives, handing the digest to `then`.
pub fn hash_sink<'a, D, F>(then: F) -> Sink<'a>
where
    D: Digester + 'a,
    F: FnOnce(Digest) -> SinkResult<'a> + 'a,
{
    hash_sink_from(HashState::<D>::new(), then)
}

fn hash_sink_from<'a, D, F>(mut state: HashState<D>, then: F) -> Sink<'a>
where
    D: Digester + 'a,
    F: FnOnce(Digest) -> SinkResult<'a> + 'a,
{
    Sink::new(move |token| match token {
        Some(token) => {
            state.push(token)?;
            Ok(Some(hash_sink_from(state, then)))
        }
        None => then(state.finish()?),
    })
}

/// A stream of exactly one `Hash` token: the digest of `proc`.
pub fn hash_proc<'a, D: Digester + 'a>(proc: Proc<'a>) -> Proc<'a> {
    Proc::new(move || {
        let digest = hash_sum::<D>(proc)?;
        Ok((Some(digest.to_token()), None))
    })
}

/// Pass `proc` through, following every node with a `Hash` tag of its digest.
///
/// Scalars and refs are tagged right after themselves, containers right
/// after their end token. Incoming hash tags are dropped.
pub fn post_hash<'a, D: Digester + 'a>(proc: Proc<'a>) -> Proc<'a> {
    post_hash_from(proc, HashState::<D>::new())
}

fn post_hash_from<'a, D: Digester + 'a>(proc: Proc<'a>, mut state: HashState<D>) -> Proc<'a> {
    Proc::new(move || {
        let (token, next) = proc.next_token()?;
        let Some(token) = token else {
            state.finish()?;
            return Ok((None, None));
        };
        let digest = state.push(&token)?;
        let rest = post_hash_from(next.unwrap_or_else(Proc::empty), state);
        if token.kind() == Kind::Hash {
            return Ok((None, Some(rest)));
        }
        let rest = match digest {
            Some(digest) => Proc::once(digest.to_token(), Some(rest)),
            None => rest,
        };
        Ok((Some(token), Some(rest)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{collect, copy};
    use sha2::Sha256;

    fn map_tokens(first: (i64, &str), second: (i64, &str)) -> Vec<Token> {
        vec![
            Token::Map,
            Token::Int(first.0),
            Token::String(first.1.into()),
            Token::Int(second.0),
            Token::String(second.1.into()),
            Token::MapEnd,
        ]
    }

    #[test]
    fn test_sha256_fixture() {
        let tokens = map_tokens((42, "42"), (80, "80"));
        let digest = hash_sum::<Sha256>(Proc::from_tokens(tokens)).unwrap();
        assert_eq!(
            digest.to_hex(),
            "efd91aa0fbb2c33c539f10f9cae10c05f14d60cc1ff1c29a78c0ec020007fc59"
        );
    }

    #[test]
    fn test_scalar_digest_fixture() {
        let digest = scalar_digest::<Sha256>(&Token::Int(42));
        assert_eq!(
            digest.to_hex(),
            "69382b9935d7ff06405aedcae4cb2799f3d9c5936af272cbb78ade2b4dfefd61"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let tokens = map_tokens((1, "a"), (2, "b"));
        let a = hash_sum::<DefaultDigester>(Proc::from_tokens(tokens.clone())).unwrap();
        let b = hash_sum::<DefaultDigester>(Proc::from_tokens(tokens)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), 32);
    }

    #[test]
    fn test_post_hash_tags_every_node() {
        let tokens = map_tokens((42, "42"), (80, "80"));
        let tagged = collect(post_hash::<Sha256>(Proc::from_tokens(tokens))).unwrap();
        let kinds: Vec<Kind> = tagged.iter().map(Token::kind).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Map,
                Kind::Int,
                Kind::Hash,
                Kind::String,
                Kind::Hash,
                Kind::Int,
                Kind::Hash,
                Kind::String,
                Kind::Hash,
                Kind::MapEnd,
                Kind::Hash,
            ]
        );
        assert_eq!(
            tagged[10],
            Token::Hash(
                Digest::from_hex("76f2ef96e5e887ddf1ba1afda3310d893edb9832e8978a9cb7628e7ccec55f4b")
                    .unwrap()
                    .0
            )
        );
    }

    #[test]
    fn test_merkle_container_digest() {
        let tokens = map_tokens((42, "42"), (80, "80"));
        let children: Vec<Digest> = tokens[1..5].iter().map(scalar_digest::<Sha256>).collect();
        let expected = container_digest::<Sha256, _>(&Token::Map, &children);

        let tagged = collect(post_hash::<Sha256>(Proc::from_tokens(tokens))).unwrap();
        assert_eq!(tagged.last(), Some(&expected.to_token()));
    }

    #[test]
    fn test_leaf_change_touches_ancestors_only() {
        let nested = |leaf: i64| {
            vec![
                Token::Array,
                Token::Array,
                Token::Int(leaf),
                Token::ArrayEnd,
                Token::Array,
                Token::Int(7),
                Token::ArrayEnd,
                Token::ArrayEnd,
            ]
        };
        let digests = |leaf| -> Vec<Token> {
            collect(post_hash::<DefaultDigester>(Proc::from_tokens(nested(leaf))))
                .unwrap()
                .into_iter()
                .filter(|t| t.kind() == Kind::Hash)
                .collect()
        };
        // Order: leaf, inner left, 7, inner right, outer.
        let a = digests(1);
        let b = digests(2);
        assert_ne!(a[0], b[0]);
        assert_ne!(a[1], b[1]);
        assert_eq!(a[2], b[2]);
        assert_eq!(a[3], b[3]);
        assert_ne!(a[4], b[4]);
    }

    #[test]
    fn test_ref_hashes_as_its_target() {
        let inner = vec![Token::Array, Token::Int(1), Token::ArrayEnd];
        let inner_digest = {
            let tagged = collect(post_hash::<DefaultDigester>(Proc::from_tokens(inner.clone()))).unwrap();
            match tagged.last() {
                Some(Token::Hash(h)) => Digest(h.clone()),
                other => panic!("expected hash, got {other:?}"),
            }
        };

        let mut full = vec![Token::Tuple];
        full.extend(inner);
        full.push(Token::TupleEnd);
        let abbreviated = vec![Token::Tuple, inner_digest.to_ref(), Token::TupleEnd];

        let a = hash_sum::<DefaultDigester>(Proc::from_tokens(full)).unwrap();
        let b = hash_sum::<DefaultDigester>(Proc::from_tokens(abbreviated)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_sink_and_proc_agree() {
        let tokens = map_tokens((3, "c"), (4, "d"));
        let mut from_sink = None;
        copy(
            Proc::from_tokens(tokens.clone()),
            vec![hash_sink::<DefaultDigester, _>(|d| {
                from_sink = Some(d);
                Ok(None)
            })],
        )
        .unwrap();
        let from_proc = collect(hash_proc::<DefaultDigester>(Proc::from_tokens(tokens))).unwrap();
        assert_eq!(from_proc, vec![from_sink.unwrap().to_token()]);
    }

    #[test]
    fn test_structural_errors() {
        let err = hash_sum::<DefaultDigester>(Proc::from_tokens(vec![Token::ArrayEnd])).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::UnexpectedEndToken));

        let err = hash_sum::<DefaultDigester>(Proc::from_tokens(vec![Token::Array, Token::MapEnd]))
            .unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::UnexpectedEndToken));

        let err = hash_sum::<DefaultDigester>(Proc::from_tokens(vec![Token::Array])).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::MissingEnd));
    }

    #[test]
    fn test_existing_tags_are_replaced() {
        let once = collect(post_hash::<DefaultDigester>(Proc::from_tokens(vec![Token::Nil]))).unwrap();
        let twice = collect(post_hash::<DefaultDigester>(Proc::from_tokens(once.clone()))).unwrap();
        assert_eq!(once, twice);
    }
}
