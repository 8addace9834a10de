//! Unmarshal engine: token streams to Rust values.
//!
//! Decoding a value returns a [`Sink`]. The finished value is handed to a
//! `then` continuation, which returns the sink for whatever follows it.
//! Containers therefore consume any number of children without recursing on
//! the call stack.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use tokstream_core::{copy, Ctx, Kind, Proc, Reason, Result, Sink, SinkResult, Token};

/// Receives a finished value and returns the sink for what follows.
pub type Then<'a, T> = Box<dyn FnOnce(T) -> SinkResult<'a> + 'a>;

/// A destination that can be built from a token stream.
pub trait Unmarshal: Sized + 'static {
    /// A sink decoding one value of this type.
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a>;

    /// A sink decoding a sequence of this type. Defaults to an Array.
    fn unmarshal_vec<'a>(ctx: &Ctx, then: Then<'a, Vec<Self>>) -> Sink<'a> {
        expect_begin(ctx, Kind::Array, move |ctx| seq_items(ctx, Kind::ArrayEnd, Vec::new(), then))
    }

    /// A sink decoding this type as the results of a function call: a
    /// Tuple of exactly one element. Tuples decode themselves.
    fn unmarshal_results<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        expect_begin(ctx, Kind::Tuple, move |ctx| {
            let item_ctx = ctx.with_index(0);
            Sink::new(move |token| {
                if container_token(&item_ctx, token, Kind::TupleEnd)? {
                    return Err(item_ctx.unmarshal_error(Reason::ExpectingValue));
                }
                let sink = unmarshal_value::<Self>(
                    &item_ctx,
                    Box::new(move |value| Ok(Some(tuple_end(ctx, 1, value, then)))),
                );
                sink.feed(token)
            })
        })
    }
}

/// Expect the TupleEnd closing a result list of `len` elements.
fn tuple_end<'a, T: 'a>(ctx: Ctx, len: usize, value: T, then: Then<'a, T>) -> Sink<'a> {
    Sink::new(move |token| {
        if container_token(&ctx, token, Kind::TupleEnd)? {
            then(value)
        } else {
            Err(ctx.with_index(len).unmarshal_error(Reason::TooManyElement))
        }
    })
}

/// Decode one value, passing its sink through the context's hook.
pub fn unmarshal_value<'a, T: Unmarshal>(ctx: &Ctx, then: Then<'a, T>) -> Sink<'a> {
    let sink = T::unmarshal(ctx, then);
    match ctx.unmarshal_hook() {
        Some(hook) => hook(ctx, sink),
        None => sink,
    }
}

/// Decode exactly one value from `proc`.
///
/// Fails with `MoreThanOneValue` if anything but end-of-stream follows.
pub fn unmarshal<T: Unmarshal>(ctx: &Ctx, proc: Proc<'_>) -> Result<T> {
    let mut out = None;
    copy(proc, vec![unmarshal_into(ctx, &mut out)])?;
    out.ok_or_else(|| ctx.unmarshal_error(Reason::ExpectingValue))
}

/// A sink storing exactly one decoded value into `out`.
pub fn unmarshal_into<'a, T: Unmarshal>(ctx: &Ctx, out: &'a mut Option<T>) -> Sink<'a> {
    let end_ctx = ctx.clone();
    unmarshal_value(
        ctx,
        Box::new(move |value| {
            *out = Some(value);
            Ok(Some(expect_end(end_ctx)))
        }),
    )
}

fn expect_end<'a>(ctx: Ctx) -> Sink<'a> {
    Sink::new(move |token| match token {
        None => Ok(None),
        Some(t) if t.kind() == Kind::Hash => Err(ctx.unmarshal_error(Reason::UnexpectedHashToken)),
        Some(_) => Err(ctx.unmarshal_error(Reason::MoreThanOneValue)),
    })
}

/// A sink for the first token of a value. Type names ahead of it are
/// annotations and are skipped.
pub fn first_token<'a, F>(ctx: &Ctx, f: F) -> Sink<'a>
where
    F: FnOnce(&Ctx, &Token) -> SinkResult<'a> + 'a,
{
    let ctx = ctx.clone();
    Sink::new(move |token| match token {
        Some(Token::TypeName(_)) => Ok(Some(first_token(&ctx, f))),
        Some(token) => f(&ctx, token),
        None => Err(ctx.unmarshal_error(Reason::ExpectingValue)),
    })
}

/// A sink accepting one scalar token that `convert` maps to a value.
pub fn scalar<'a, T, F>(ctx: &Ctx, expected: Kind, convert: F, then: Then<'a, T>) -> Sink<'a>
where
    T: 'a,
    F: FnOnce(&Token) -> Option<T> + 'a,
{
    first_token(ctx, move |ctx, token| match convert(token) {
        Some(value) => then(value),
        None => Err(ctx.unmarshal_error(Reason::unexpected(Some(token), expected))),
    })
}

/// A sink that checks for a `kind` begin token, then continues with `body`.
pub fn expect_begin<'a, F>(ctx: &Ctx, kind: Kind, body: F) -> Sink<'a>
where
    F: FnOnce(Ctx) -> Sink<'a> + 'a,
{
    first_token(ctx, move |ctx, token| {
        if token.kind() == kind {
            Ok(Some(body(ctx.clone())))
        } else {
            Err(ctx.unmarshal_error(Reason::unexpected(Some(token), kind)))
        }
    })
}

/// Reject a token that cannot start a child value inside a container.
///
/// Returns `Ok(true)` when `token` is the container's own `end`.
pub fn container_token(ctx: &Ctx, token: Option<&Token>, end: Kind) -> Result<bool> {
    match token {
        None => Err(ctx.unmarshal_error(Reason::MissingEnd)),
        Some(t) if t.kind() == end => Ok(true),
        Some(t) if t.is_end() => Err(ctx.unmarshal_error(Reason::UnexpectedEndToken)),
        Some(_) => Ok(false),
    }
}

/// Decode elements until `end`, after the begin token has been consumed.
pub fn seq_items<'a, T: Unmarshal>(ctx: Ctx, end: Kind, acc: Vec<T>, then: Then<'a, Vec<T>>) -> Sink<'a> {
    Sink::new(move |token| {
        if container_token(&ctx, token, end)? {
            return then(acc);
        }
        let item_ctx = ctx.with_index(acc.len());
        let mut acc = acc;
        let sink = unmarshal_value::<T>(
            &item_ctx,
            Box::new(move |item| {
                acc.push(item);
                Ok(Some(seq_items(ctx, end, acc, then)))
            }),
        );
        sink.feed(token)
    })
}

/// Decode key/value pairs until MapEnd, after the Map token has been consumed.
pub fn map_entries<'a, K, V>(ctx: Ctx, acc: Vec<(K, V)>, then: Then<'a, Vec<(K, V)>>) -> Sink<'a>
where
    K: Unmarshal,
    V: Unmarshal,
{
    Sink::new(move |token| {
        if container_token(&ctx, token, Kind::MapEnd)? {
            return then(acc);
        }
        let key_token = token.cloned().unwrap_or(Token::Nil);
        let key_ctx = ctx.clone();
        let mut acc = acc;
        let sink = unmarshal_value::<K>(
            &key_ctx,
            Box::new(move |key| {
                let value_ctx = ctx.with_key(key_token);
                Ok(Some(unmarshal_value::<V>(
                    &value_ctx,
                    Box::new(move |value| {
                        acc.push((key, value));
                        Ok(Some(map_entries(ctx, acc, then)))
                    }),
                )))
            }),
        );
        sink.feed(token)
    })
}

macro_rules! scalar_impls {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Unmarshal for $ty {
            fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
                scalar(ctx, Kind::$variant, |t| match t {
                    Token::$variant(v) => Some(*v),
                    _ => None,
                }, then)
            }
        }
    )*};
}

scalar_impls! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
}

impl Unmarshal for u8 {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::Uint8, |t| match t {
            Token::Uint8(v) => Some(*v),
            _ => None,
        }, then)
    }

    /// Byte sequences arrive as one Bytes token, or as an Array of Uint8.
    fn unmarshal_vec<'a>(ctx: &Ctx, then: Then<'a, Vec<Self>>) -> Sink<'a> {
        first_token(ctx, move |ctx, token| match token {
            Token::Bytes(b) => then(b.to_vec()),
            Token::Array => Ok(Some(seq_items(ctx.clone(), Kind::ArrayEnd, Vec::new(), then))),
            t => Err(ctx.unmarshal_error(Reason::unexpected(Some(t), Kind::Bytes))),
        })
    }
}

impl Unmarshal for isize {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let ctx = ctx.clone();
        scalar(&ctx.clone(), Kind::Int, |t| match t {
            Token::Int(v) => Some(*v),
            _ => None,
        }, Box::new(move |v: i64| {
            let v = isize::try_from(v).map_err(|e| ctx.unmarshal_error(Reason::Rejected(e.to_string())))?;
            then(v)
        }))
    }
}

impl Unmarshal for usize {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let ctx = ctx.clone();
        scalar(&ctx.clone(), Kind::Uint, |t| match t {
            Token::Uint(v) => Some(*v),
            _ => None,
        }, Box::new(move |v: u64| {
            let v = usize::try_from(v).map_err(|e| ctx.unmarshal_error(Reason::Rejected(e.to_string())))?;
            then(v)
        }))
    }
}

impl Unmarshal for f32 {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::Float32, |t| match t {
            Token::Float32(v) => Some(*v),
            Token::NaN => Some(f32::NAN),
            _ => None,
        }, then)
    }
}

impl Unmarshal for f64 {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::Float64, |t| match t {
            Token::Float64(v) => Some(*v),
            Token::NaN => Some(f64::NAN),
            _ => None,
        }, then)
    }
}

impl Unmarshal for () {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::Nil, |t| matches!(t, Token::Nil).then_some(()), then)
    }

    /// No results: an empty Tuple.
    fn unmarshal_results<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        expect_begin(ctx, Kind::Tuple, move |ctx| tuple_end(ctx, 0, (), then))
    }
}

impl Unmarshal for String {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::String, |t| match t {
            Token::String(s) => Some(s.clone()),
            _ => None,
        }, then)
    }
}

impl Unmarshal for char {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let ctx = ctx.clone();
        String::unmarshal(&ctx.clone(), Box::new(move |s: String| {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => then(c),
                _ => Err(ctx.unmarshal_error(Reason::Rejected(format!("not a single character: {s:?}")))),
            }
        }))
    }
}

impl Unmarshal for Bytes {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        scalar(ctx, Kind::Bytes, |t| match t {
            Token::Bytes(b) => Some(b.clone()),
            _ => None,
        }, then)
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal_vec(ctx, then)
    }
}

impl<T: Unmarshal> Unmarshal for VecDeque<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal_vec(ctx, Box::new(move |items: Vec<T>| then(items.into())))
    }
}

/// Missing trailing elements keep their default.
impl<T: Unmarshal + Default, const N: usize> Unmarshal for [T; N] {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let fill_ctx = ctx.clone();
        let sink = T::unmarshal_vec(ctx, Box::new(move |mut items: Vec<T>| {
            if items.len() > N {
                return Err(fill_ctx.with_index(N).unmarshal_error(Reason::TooManyElement));
            }
            items.resize_with(N, T::default);
            let array: [T; N] = items
                .try_into()
                .map_err(|_| fill_ctx.unmarshal_error(Reason::TooManyElement))?;
            then(array)
        }));
        limit_elements(ctx.clone(), N, 0, 0, sink)
    }
}

/// Forward tokens to `sink`, failing as soon as the Array it decodes
/// starts element `max`.
fn limit_elements<'a>(ctx: Ctx, max: usize, mut depth: usize, mut count: usize, sink: Sink<'a>) -> Sink<'a> {
    Sink::new(move |token| {
        if let Some(t) = token {
            let kind = t.kind();
            if depth == 1 && !kind.is_end() && !kind.is_tag() && kind != Kind::TypeName {
                if count == max {
                    return Err(ctx.with_index(max).unmarshal_error(Reason::TooManyElement));
                }
                count += 1;
            }
            if kind.is_begin() {
                depth += 1;
            } else if kind.is_end() {
                depth = depth.saturating_sub(1);
            }
        }
        Ok(sink.feed(token)?.map(|next| limit_elements(ctx, max, depth, count, next)))
    })
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        first_token(ctx, move |ctx, token| match token {
            Token::Nil => then(None),
            _ => T::unmarshal(ctx, Box::new(move |v| then(Some(v)))).feed(Some(token)),
        })
    }
}

impl<T: Unmarshal> Unmarshal for OnceCell<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        Option::<T>::unmarshal(ctx, Box::new(move |v| {
            then(v.map(OnceCell::from).unwrap_or_default())
        }))
    }
}

impl<T: Unmarshal> Unmarshal for Box<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal(ctx, Box::new(move |v| then(Box::new(v))))
    }
}

impl<T: Unmarshal> Unmarshal for Rc<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal(ctx, Box::new(move |v| then(Rc::new(v))))
    }
}

impl<T: Unmarshal> Unmarshal for Arc<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal(ctx, Box::new(move |v| then(Arc::new(v))))
    }
}

impl<K, V, S> Unmarshal for HashMap<K, V, S>
where
    K: Unmarshal + Eq + Hash,
    V: Unmarshal,
    S: BuildHasher + Default + 'static,
{
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        expect_begin(ctx, Kind::Map, move |ctx| {
            map_entries(ctx, Vec::new(), Box::new(move |entries: Vec<(K, V)>| then(entries.into_iter().collect())))
        })
    }
}

impl<K: Unmarshal + Ord, V: Unmarshal> Unmarshal for BTreeMap<K, V> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        expect_begin(ctx, Kind::Map, move |ctx| {
            map_entries(ctx, Vec::new(), Box::new(move |entries: Vec<(K, V)>| then(entries.into_iter().collect())))
        })
    }
}

impl<T, S> Unmarshal for HashSet<T, S>
where
    T: Unmarshal + Eq + Hash,
    S: BuildHasher + Default + 'static,
{
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal_vec(ctx, Box::new(move |items: Vec<T>| then(items.into_iter().collect())))
    }
}

impl<T: Unmarshal + Ord> Unmarshal for BTreeSet<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal_vec(ctx, Box::new(move |items: Vec<T>| then(items.into_iter().collect())))
    }
}
