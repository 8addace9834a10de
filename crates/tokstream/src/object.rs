//! Struct support.
//!
//! A struct is an Object: its begin token, then a field name (String token)
//! and value for each field, then its end token. Implement [`Object`] with
//! the [`object!`](crate::object!) macro; hand-written impls work too.

use tokstream_core::{Ctx, Kind, Proc, Reason, Sink, Token};

use crate::unmarshal::{expect_begin, Then};

/// Applies one decoded field to a struct under construction.
pub type Setter<T> = Box<dyn FnOnce(&mut T)>;

/// A struct with named fields, decoded starting from `Default`.
///
/// Fields not named in `FIELDS` are never emitted and keep their default
/// when decoding.
pub trait Object: Default + 'static {
    /// Field names in emission order.
    const FIELDS: &'static [&'static str];

    /// Retired field names. Decoding skips them silently even in strict mode.
    fn deprecated_fields() -> &'static [&'static str] {
        &[]
    }

    /// Marshal the named field, or `None` if there is no such field.
    fn marshal_field<'a>(&'a self, name: &str, ctx: &Ctx, cont: Option<Proc<'a>>) -> Option<Proc<'a>>;

    /// Whether the named field is empty, for `skip_empty_fields`.
    fn field_is_empty(&self, name: &str) -> bool;

    /// A sink decoding the named field into a setter, or `None` if there is
    /// no such field.
    fn unmarshal_field<'a>(name: &str, ctx: &Ctx, then: Then<'a, Setter<Self>>) -> Option<Sink<'a>>;
}

/// Emit an object's fields in declaration order.
pub fn marshal_object<'a, T: Object>(obj: &'a T, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
    Proc::once(Token::Object, Some(object_fields(obj, 0, ctx.clone(), cont)))
}

fn object_fields<'a, T: Object>(obj: &'a T, mut index: usize, ctx: Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
    Proc::new(move || {
        let skip_empty = ctx.options().skip_empty_fields;
        while let Some(name) = T::FIELDS.get(index) {
            index += 1;
            if skip_empty && obj.field_is_empty(name) {
                continue;
            }
            let field_ctx = ctx.with_field(name);
            let rest = object_fields(obj, index, ctx, cont);
            return match obj.marshal_field(name, &field_ctx, Some(rest)) {
                Some(value) => Ok((Some(Token::String(name.to_string())), Some(value))),
                None => Err(field_ctx.marshal_error(Reason::UnknownFieldName(name.to_string()))),
            };
        }
        Ok((Some(Token::ObjectEnd), cont))
    })
}

/// Decode an object into `T`, starting from `T::default()`.
pub fn unmarshal_object<'a, T: Object>(ctx: &Ctx, then: Then<'a, T>) -> Sink<'a> {
    expect_begin(ctx, Kind::Object, move |ctx| object_entries(ctx, T::default(), Vec::new(), then))
}

fn object_entries<'a, T: Object>(
    ctx: Ctx,
    mut obj: T,
    mut seen: Vec<&'static str>,
    then: Then<'a, T>,
) -> Sink<'a> {
    Sink::new(move |token| {
        let name = match token {
            Some(Token::ObjectEnd) => return then(obj),
            Some(Token::String(name)) => name,
            Some(t) if t.is_end() => return Err(ctx.unmarshal_error(Reason::UnexpectedEndToken)),
            None => return Err(ctx.unmarshal_error(Reason::MissingEnd)),
            Some(t) => return Err(ctx.unmarshal_error(Reason::unexpected(Some(t), Kind::String))),
        };
        let field_ctx = ctx.with_field(name);

        if let Some(field) = T::FIELDS.iter().copied().find(|f| *f == name.as_str()) {
            if seen.contains(&field) {
                return Err(field_ctx.unmarshal_error(Reason::DuplicateField(name.clone())));
            }
            seen.push(field);
            let sink = T::unmarshal_field(
                field,
                &field_ctx,
                Box::new(move |set: Setter<T>| {
                    set(&mut obj);
                    Ok(Some(object_entries(ctx, obj, seen, then)))
                }),
            );
            return match sink {
                Some(sink) => Ok(Some(sink)),
                None => Err(field_ctx.unmarshal_error(Reason::UnknownFieldName(name.clone()))),
            };
        }

        let deprecated = T::deprecated_fields().contains(&name.as_str());
        if !deprecated && ctx.options().disallow_unknown_fields {
            return Err(field_ctx.unmarshal_error(Reason::UnknownFieldName(name.clone())));
        }
        Ok(Some(Sink::discard(&field_ctx, move || {
            Ok(Some(object_entries(ctx, obj, seen, then)))
        })))
    })
}

/// Implement [`Object`], [`Marshal`](crate::Marshal) and [`Unmarshal`](crate::Unmarshal) for
/// a struct with named fields.
///
/// ```
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
///     label: String,
/// }
///
/// tokstream::object!(Point { x: i32, y: i32, label: String } deprecated ["z"]);
///
/// let p = Point { x: 1, y: 2, label: "a".into() };
/// let bytes = tokstream::to_bytes(&p).unwrap();
/// assert_eq!(tokstream::from_bytes::<Point>(&bytes).unwrap(), p);
/// ```
#[macro_export]
macro_rules! object {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? } $(deprecated [$($old:literal),* $(,)?])?) => {
        impl $crate::object::Object for $ty {
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn deprecated_fields() -> &'static [&'static str] {
                &[$($($old),*)?]
            }

            fn marshal_field<'a>(
                &'a self,
                name: &str,
                ctx: &$crate::core::Ctx,
                cont: ::std::option::Option<$crate::core::Proc<'a>>,
            ) -> ::std::option::Option<$crate::core::Proc<'a>> {
                match name {
                    $(stringify!($field) => Some($crate::marshal::marshal_value(&self.$field, ctx, cont)),)*
                    _ => None,
                }
            }

            fn field_is_empty(&self, name: &str) -> bool {
                match name {
                    $(stringify!($field) => $crate::marshal::Marshal::is_empty_value(&self.$field),)*
                    _ => false,
                }
            }

            fn unmarshal_field<'a>(
                name: &str,
                ctx: &$crate::core::Ctx,
                then: $crate::unmarshal::Then<'a, $crate::object::Setter<Self>>,
            ) -> ::std::option::Option<$crate::core::Sink<'a>> {
                match name {
                    $(stringify!($field) => Some($crate::unmarshal::unmarshal_value::<$fty>(
                        ctx,
                        Box::new(move |value: $fty| {
                            then(Box::new(move |obj: &mut Self| obj.$field = value))
                        }),
                    )),)*
                    _ => {
                        let _ = (ctx, then);
                        None
                    }
                }
            }
        }

        impl $crate::marshal::Marshal for $ty {
            fn marshal<'a>(
                &'a self,
                ctx: &$crate::core::Ctx,
                cont: ::std::option::Option<$crate::core::Proc<'a>>,
            ) -> $crate::core::Proc<'a> {
                $crate::object::marshal_object(self, ctx, cont)
            }
        }

        impl $crate::unmarshal::Unmarshal for $ty {
            fn unmarshal<'a>(
                ctx: &$crate::core::Ctx,
                then: $crate::unmarshal::Then<'a, Self>,
            ) -> $crate::core::Sink<'a> {
                $crate::object::unmarshal_object(ctx, then)
            }
        }
    };
}
