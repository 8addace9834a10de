//! Wrappers for values that carry their own encoding, and for functions.
//!
//! - [`Text`] encodes through `Display` / `FromStr` as a String token
//! - [`Binary`] encodes through [`BinaryMarshal`] as a Bytes token
//! - [`Thunk`] is a nullary function; its results form a Tuple
//! - [`call`] decodes arguments and calls a function with them
//! - [`DynTuple`] is a tuple of any arity

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use bytes::Bytes;
use tokstream_core::{Ctx, Error, Kind, Proc, Reason, Sink, Token};

use crate::marshal::{marshal_seq, Marshal};
use crate::unmarshal::{expect_begin, scalar, seq_items, Then, Unmarshal};
use crate::value::Value;

/// Encodes `T` as its `Display` text; decodes with `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Text<T>(pub T);

impl<T: fmt::Display> Marshal for Text<T> {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::String(self.0.to_string()), cont)
    }
}

impl<T> Unmarshal for Text<T>
where
    T: FromStr + 'static,
    T::Err: fmt::Display,
{
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let parse_ctx = ctx.clone();
        scalar(
            ctx,
            Kind::String,
            |t| match t {
                Token::String(s) => Some(s.clone()),
                _ => None,
            },
            Box::new(move |s: String| match s.parse::<T>() {
                Ok(value) => then(Text(value)),
                Err(e) => Err(parse_ctx.unmarshal_error(Reason::Rejected(e.to_string()))),
            }),
        )
    }
}

/// A type with its own binary form.
pub trait BinaryMarshal: Sized {
    type Error: fmt::Display;

    fn to_binary(&self) -> Result<Vec<u8>, Self::Error>;

    fn from_binary(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Encodes `T` through [`BinaryMarshal`] as one Bytes token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binary<T>(pub T);

impl<T: BinaryMarshal> Marshal for Binary<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match self.0.to_binary() {
            Ok(bytes) => Proc::once(Token::Bytes(Bytes::from(bytes)), cont),
            Err(e) => Proc::fail(ctx.marshal_error(Reason::Rejected(e.to_string()))),
        }
    }
}

impl<T: BinaryMarshal + 'static> Unmarshal for Binary<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let parse_ctx = ctx.clone();
        scalar(
            ctx,
            Kind::Bytes,
            |t| match t {
                Token::Bytes(b) => Some(b.clone()),
                _ => None,
            },
            Box::new(move |bytes: Bytes| match T::from_binary(&bytes) {
                Ok(value) => then(Binary(value)),
                Err(e) => Err(parse_ctx.unmarshal_error(Reason::Rejected(e.to_string()))),
            }),
        )
    }
}

/// A nullary function. Marshaling calls it and emits its results as a
/// Tuple: one element for a single value, one per field for a tuple, none
/// for `()`. The result is kept with the thunk once computed.
///
/// Decoding builds a thunk returning the decoded results.
pub struct Thunk<T> {
    f: Rc<dyn Fn() -> T>,
    result: OnceCell<T>,
}

impl<T> Thunk<T> {
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Thunk {
            f: Rc::new(f),
            result: OnceCell::new(),
        }
    }

    pub fn call(&self) -> T {
        (self.f)()
    }
}

impl<T> Clone for Thunk<T> {
    fn clone(&self) -> Self {
        Thunk {
            f: Rc::clone(&self.f),
            result: OnceCell::new(),
        }
    }
}

impl<T> fmt::Debug for Thunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk")
    }
}

impl<T: Marshal> Marshal for Thunk<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        let ctx = ctx.clone();
        Proc::new(move || {
            let result = self.result.get_or_init(|| self.call());
            Ok((None, Some(result.marshal_results(&ctx, cont))))
        })
    }
}

impl<T: Unmarshal + Clone> Unmarshal for Thunk<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        T::unmarshal_results(
            ctx,
            Box::new(move |value: T| then(Thunk::new(move || value.clone()))),
        )
    }
}

/// A sink that decodes a tuple of arguments and calls `f` with them.
///
/// Arguments are read as a result list, so a lone argument is a one-element
/// Tuple and `()` is an empty one. An error returned by `f` aborts the
/// stream as [`Error::Callback`].
pub fn call<'a, A, E, F>(ctx: &Ctx, f: F) -> Sink<'a>
where
    A: Unmarshal,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: FnOnce(A) -> Result<(), E> + 'a,
{
    A::unmarshal_results(
        ctx,
        Box::new(move |args: A| {
            f(args).map_err(|e| Error::Callback(e.into()))?;
            Ok(None)
        }),
    )
}

/// A tuple of any arity with dynamically shaped elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynTuple(pub Vec<Value>);

impl Marshal for DynTuple {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_seq(Token::Tuple, Token::TupleEnd, self.0.iter(), ctx, cont)
    }

    fn marshal_results<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        self.marshal(ctx, cont)
    }
}

impl Unmarshal for DynTuple {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        expect_begin(ctx, Kind::Tuple, move |ctx| {
            seq_items::<Value>(
                ctx,
                Kind::TupleEnd,
                Vec::new(),
                Box::new(move |items: Vec<Value>| then(DynTuple(items))),
            )
        })
    }

    fn unmarshal_results<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        Self::unmarshal(ctx, then)
    }
}
