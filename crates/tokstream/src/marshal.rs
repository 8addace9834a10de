//! Marshal engine: Rust values to token streams.
//!
//! Every impl returns a lazy [`Proc`]. Containers emit their begin token and
//! hand back a continuation for the children, so nesting depth is paid for
//! in heap-allocated steps rather than call-stack frames.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use tokstream_core::{collect, compare_tokens, Ctx, Proc, Token};

/// A value that can produce its own token stream.
pub trait Marshal {
    /// Emit this value's tokens, then continue with `cont`.
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a>;

    /// Emit a slice of this type. Defaults to an Array of elements.
    fn marshal_slice<'a>(items: &'a [Self], ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a>
    where
        Self: Sized,
    {
        marshal_seq(Token::Array, Token::ArrayEnd, items.iter(), ctx, cont)
    }

    /// Whether a struct field holding this value is omitted under
    /// `skip_empty_fields`.
    fn is_empty_value(&self) -> bool {
        false
    }

    /// Emit this value as the results of a function call: a Tuple holding
    /// the value. Tuples are already a result list and emit themselves.
    fn marshal_results<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        let end = Proc::once(Token::TupleEnd, cont);
        Proc::once(Token::Tuple, Some(marshal_value(self, &ctx.with_index(0), Some(end))))
    }
}

/// Marshal one value, passing its stream through the context's hook.
pub fn marshal_value<'a, T: Marshal + ?Sized>(
    value: &'a T,
    ctx: &Ctx,
    cont: Option<Proc<'a>>,
) -> Proc<'a> {
    match ctx.marshal_hook() {
        Some(hook) => hook(ctx, value.marshal(ctx, None)).chain(cont),
        None => value.marshal(ctx, cont),
    }
}

/// Emit `begin`, each item at its index, then `end`.
pub fn marshal_seq<'a, T, I>(
    begin: Token,
    end: Token,
    items: I,
    ctx: &Ctx,
    cont: Option<Proc<'a>>,
) -> Proc<'a>
where
    T: Marshal + ?Sized + 'a,
    I: Iterator<Item = &'a T> + 'a,
{
    Proc::once(begin, Some(seq_items(items, 0, ctx.clone(), end, cont)))
}

fn seq_items<'a, T, I>(
    mut items: I,
    index: usize,
    ctx: Ctx,
    end: Token,
    cont: Option<Proc<'a>>,
) -> Proc<'a>
where
    T: Marshal + ?Sized + 'a,
    I: Iterator<Item = &'a T> + 'a,
{
    Proc::new(move || match items.next() {
        Some(item) => {
            let item_ctx = ctx.with_index(index);
            let rest = seq_items(items, index + 1, ctx, end, cont);
            Ok((None, Some(marshal_value(item, &item_ctx, Some(rest)))))
        }
        None => Ok((Some(end), cont)),
    })
}

/// Emit a Map with entries in canonical key order.
///
/// Each key is marshaled into a buffer first; the buffers are sorted with
/// the canonical comparator and replayed ahead of their values.
pub fn marshal_map<'a, K, V, I>(entries: I, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a>
where
    K: Marshal + ?Sized + 'a,
    V: Marshal + ?Sized + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)> + 'a,
{
    let ctx = ctx.clone();
    Proc::new(move || {
        let mut sorted = Vec::new();
        for (key, value) in entries {
            sorted.push((collect(marshal_value(key, &ctx, None))?, value));
        }
        sorted.sort_by(|a, b| compare_tokens(&a.0, &b.0));
        Ok((Some(Token::Map), Some(map_entries(sorted.into_iter(), ctx, cont))))
    })
}

fn map_entries<'a, V, I>(mut entries: I, ctx: Ctx, cont: Option<Proc<'a>>) -> Proc<'a>
where
    V: Marshal + ?Sized + 'a,
    I: Iterator<Item = (Vec<Token>, &'a V)> + 'a,
{
    Proc::new(move || {
        let Some((key, value)) = entries.next() else {
            return Ok((Some(Token::MapEnd), cont));
        };
        let value_ctx = ctx.with_key(key.first().cloned().unwrap_or(Token::Nil));
        let rest = map_entries(entries, ctx, cont);
        let value = marshal_value(value, &value_ctx, Some(rest));
        Ok((None, Some(Proc::from_tokens(key).chain(Some(value)))))
    })
}

/// Emit an Array of set members in canonical order.
pub fn marshal_set<'a, T, I>(members: I, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a>
where
    T: Marshal + ?Sized + 'a,
    I: IntoIterator<Item = &'a T> + 'a,
{
    let ctx = ctx.clone();
    Proc::new(move || {
        let mut sorted = Vec::new();
        for (index, member) in members.into_iter().enumerate() {
            sorted.push(collect(marshal_value(member, &ctx.with_index(index), None))?);
        }
        sorted.sort_by(|a, b| compare_tokens(a, b));
        let tokens = std::iter::once(Token::Array)
            .chain(sorted.into_iter().flatten())
            .chain(std::iter::once(Token::ArrayEnd));
        Ok((None, Some(Proc::from_iterator(tokens).chain(cont))))
    })
}

macro_rules! scalar_impls {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Marshal for $ty {
            fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
                Proc::once(Token::$variant((*self).into()), cont)
            }

            fn is_empty_value(&self) -> bool {
                *self == <$ty>::default()
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

impl Marshal for u8 {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Uint8(*self), cont)
    }

    /// Byte slices are a single Bytes token.
    fn marshal_slice<'a>(items: &'a [Self], _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Bytes(Bytes::copy_from_slice(items)), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Marshal for isize {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Int(*self as i64), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Marshal for usize {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Uint(*self as u64), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Marshal for f32 {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::float32(*self), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Marshal for f64 {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::float64(*self), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Marshal for () {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Nil, cont)
    }

    fn is_empty_value(&self) -> bool {
        true
    }

    /// No results: an empty Tuple.
    fn marshal_results<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Tuple, Some(Proc::once(Token::TupleEnd, cont)))
    }
}

impl Marshal for char {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::String(self.to_string()), cont)
    }

    fn is_empty_value(&self) -> bool {
        *self == '\0'
    }
}

impl Marshal for str {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::String(self.to_string()), cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Marshal for String {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        self.as_str().marshal(ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Marshal for Bytes {
    fn marshal<'a>(&'a self, _ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        Proc::once(Token::Bytes(self.clone()), cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal> Marshal for [T] {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        T::marshal_slice(self, ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        T::marshal_slice(self, ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        T::marshal_slice(self, ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal> Marshal for VecDeque<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_seq(Token::Array, Token::ArrayEnd, self.iter(), ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal> Marshal for Option<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match self {
            Some(value) => value.marshal(ctx, cont),
            None => Proc::once(Token::Nil, cont),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: Marshal> Marshal for OnceCell<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match self.get() {
            Some(value) => value.marshal(ctx, cont),
            None => Proc::once(Token::Nil, cont),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.get().is_none()
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        (**self).marshal(ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        (**self).marshal(ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

/// Follow a shared pointer, failing on a cycle once tracking is active.
fn marshal_shared<'a, T: Marshal + ?Sized>(
    target: &'a T,
    addr: usize,
    ctx: &Ctx,
    cont: Option<Proc<'a>>,
) -> Proc<'a> {
    match ctx.enter_pointer(addr) {
        Ok(inner) => target.marshal(&inner, cont),
        Err(err) => Proc::fail(err),
    }
}

impl<T: Marshal + ?Sized> Marshal for Rc<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_shared(&**self, Rc::as_ptr(self).cast::<()>() as usize, ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: Marshal + ?Sized> Marshal for Arc<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_shared(&**self, Arc::as_ptr(self).cast::<()>() as usize, ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<K: Marshal, V: Marshal, S> Marshal for HashMap<K, V, S> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_map(self.iter(), ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Marshal, V: Marshal> Marshal for BTreeMap<K, V> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_map(self.iter(), ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal, S> Marshal for HashSet<T, S> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_set(self.iter(), ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Marshal> Marshal for BTreeSet<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        marshal_set(self.iter(), ctx, cont)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}
