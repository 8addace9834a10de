//! Tuples: a fixed sequence of heterogeneous values between Tuple and
//! TupleEnd.
//!
//! Elements are decoded through type-erased decoders so one engine serves
//! every arity.

use std::any::Any;
use std::vec::IntoIter;

use tokstream_core::{Ctx, Kind, Proc, Reason, Result, Sink, Token};

use crate::marshal::{marshal_seq, Marshal};
use crate::unmarshal::{container_token, expect_begin, unmarshal_value, Then, Unmarshal};

/// Decodes one value of a fixed type, boxed as `Any`.
pub type AnyDecoder = for<'a> fn(&Ctx, Then<'a, Box<dyn Any>>) -> Sink<'a>;

/// The [`AnyDecoder`] for `T`.
pub fn decode_any<'a, T: Unmarshal>(ctx: &Ctx, then: Then<'a, Box<dyn Any>>) -> Sink<'a> {
    unmarshal_value::<T>(ctx, Box::new(move |value: T| then(Box::new(value))))
}

/// Decode a tuple whose elements are read, in order, by `decoders`.
///
/// Fewer elements than decoders fails with `ExpectingValue`; more fails
/// with `TooManyElement`.
pub fn unmarshal_tuple<'a>(
    ctx: &Ctx,
    decoders: Vec<AnyDecoder>,
    then: Then<'a, Vec<Box<dyn Any>>>,
) -> Sink<'a> {
    expect_begin(ctx, Kind::Tuple, move |ctx| {
        let capacity = decoders.len();
        tuple_items(ctx, decoders.into_iter(), Vec::with_capacity(capacity), then)
    })
}

fn tuple_items<'a>(
    ctx: Ctx,
    mut decoders: IntoIter<AnyDecoder>,
    mut acc: Vec<Box<dyn Any>>,
    then: Then<'a, Vec<Box<dyn Any>>>,
) -> Sink<'a> {
    Sink::new(move |token| {
        let at_end = container_token(&ctx, token, Kind::TupleEnd)?;
        let item_ctx = ctx.with_index(acc.len());
        match (decoders.next(), at_end) {
            (None, true) => then(acc),
            (None, false) => Err(item_ctx.unmarshal_error(Reason::TooManyElement)),
            (Some(_), true) => Err(item_ctx.unmarshal_error(Reason::ExpectingValue)),
            (Some(decode), false) => {
                let sink = decode(
                    &item_ctx,
                    Box::new(move |value| {
                        acc.push(value);
                        Ok(Some(tuple_items(ctx, decoders, acc, then)))
                    }),
                );
                sink.feed(token)
            }
        }
    })
}

/// Take the next decoded element as a `T`.
pub fn take<T: 'static>(ctx: &Ctx, values: &mut IntoIter<Box<dyn Any>>) -> Result<T> {
    values
        .next()
        .and_then(|value| value.downcast::<T>().ok())
        .map(|value| *value)
        .ok_or_else(|| ctx.unmarshal_error(Reason::ExpectingValue))
}

macro_rules! tuple_impls {
    ($( ($($idx:tt $name:ident)+) )+) => {$(
        impl<$($name: Marshal),+> Marshal for ($($name,)+) {
            fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
                let items = [$(&self.$idx as &'a dyn Marshal),+];
                marshal_seq(Token::Tuple, Token::TupleEnd, items.into_iter(), ctx, cont)
            }

            fn marshal_results<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
                self.marshal(ctx, cont)
            }
        }

        impl<$($name: Unmarshal),+> Unmarshal for ($($name,)+) {
            fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
                let decoders: Vec<AnyDecoder> = vec![$(decode_any::<$name> as AnyDecoder),+];
                let outer = ctx.clone();
                unmarshal_tuple(ctx, decoders, Box::new(move |values: Vec<Box<dyn Any>>| {
                    let mut values = values.into_iter();
                    then(($(take::<$name>(&outer, &mut values)?,)+))
                }))
            }

            fn unmarshal_results<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
                Self::unmarshal(ctx, then)
            }
        }
    )+};
}

tuple_impls! {
    (0 A)
    (0 A 1 B)
    (0 A 1 B 2 C)
    (0 A 1 B 2 C 3 D)
    (0 A 1 B 2 C 3 D 4 E)
    (0 A 1 B 2 C 3 D 4 E 5 F)
    (0 A 1 B 2 C 3 D 4 E 5 F 6 G)
    (0 A 1 B 2 C 3 D 4 E 5 F 6 G 7 H)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::marshal_value;
    use crate::unmarshal::unmarshal;
    use tokstream_core::collect;

    #[test]
    fn test_marshal_tuple() {
        let value = (1i8, "two".to_string(), (true,));
        let out = collect(marshal_value(&value, &Ctx::new(), None)).unwrap();
        assert_eq!(
            out,
            vec![
                Token::Tuple,
                Token::Int8(1),
                Token::String("two".into()),
                Token::Tuple,
                Token::Bool(true),
                Token::TupleEnd,
                Token::TupleEnd,
            ]
        );
    }

    #[test]
    fn test_roundtrip_tuple() {
        let ctx = Ctx::new();
        let value = (7u32, vec![1i16, 2], Some("x".to_string()), 0.5f64);
        let back: (u32, Vec<i16>, Option<String>, f64) =
            unmarshal(&ctx, marshal_value(&value, &ctx, None)).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_arity_mismatch() {
        let ctx = Ctx::new();
        let short = vec![Token::Tuple, Token::Int8(1), Token::TupleEnd];
        let err = unmarshal::<(i8, i8)>(&ctx, Proc::from_tokens(short)).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::ExpectingValue));
        assert_eq!(err.path().unwrap().to_string(), "/1");

        let long = vec![Token::Tuple, Token::Int8(1), Token::Int8(2), Token::TupleEnd];
        let err = unmarshal::<(i8,)>(&ctx, Proc::from_tokens(long)).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::TooManyElement));
    }

    #[test]
    fn test_element_error_path() {
        let tokens = vec![Token::Tuple, Token::Int8(1), Token::Nil, Token::TupleEnd];
        let err = unmarshal::<(i8, bool)>(&Ctx::new(), Proc::from_tokens(tokens)).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::ExpectingKind(Kind::Bool)));
        assert_eq!(err.path().unwrap().to_string(), "/1");
    }
}
