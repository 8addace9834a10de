//! Process-wide type-name registry.
//!
//! A registered type can travel with its name: [`Named`] emits a TypeName
//! token ahead of the value and checks it on the way back, and [`AnyNamed`]
//! picks the decoder from whatever name arrives.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use tokstream_core::{Ctx, Kind, Proc, Reason, Sink, Token};

use crate::error::RegistryError;
use crate::marshal::{marshal_value, Marshal};
use crate::tuple::{decode_any, AnyDecoder};
use crate::unmarshal::{Then, Unmarshal};

/// Marshals a value known only as `Any`.
pub type AnyEncoder = for<'a> fn(&'a (dyn Any + 'static), &Ctx, Option<Proc<'a>>) -> Proc<'a>;

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    type_name: &'static str,
    decode: AnyDecoder,
    encode: AnyEncoder,
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, Entry>,
    by_name: HashMap<&'static str, Entry>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(RwLock::default)
}

fn by_type(type_id: TypeId) -> Option<Entry> {
    let reg = registry().read().unwrap_or_else(PoisonError::into_inner);
    reg.by_type.get(&type_id).copied()
}

fn by_name(name: &str) -> Option<Entry> {
    let reg = registry().read().unwrap_or_else(PoisonError::into_inner);
    reg.by_name.get(name).copied()
}

/// Register `T` under `name`.
///
/// Registering the same pair again is a no-op. A type can hold one name
/// and a name one type.
pub fn register<T: Marshal + Unmarshal>(name: &'static str) -> Result<(), RegistryError> {
    let mut reg = registry().write().unwrap_or_else(PoisonError::into_inner);
    let type_id = TypeId::of::<T>();

    if let Some(existing) = reg.by_type.get(&type_id) {
        if existing.name == name {
            return Ok(());
        }
        return Err(RegistryError::AlreadyNamed {
            type_name: type_name::<T>(),
            existing: existing.name,
        });
    }
    if let Some(existing) = reg.by_name.get(name) {
        return Err(RegistryError::NameTaken {
            name,
            type_name: existing.type_name,
        });
    }

    let entry = Entry {
        name,
        type_name: type_name::<T>(),
        decode: decode_any::<T>,
        encode: encode_any::<T>,
    };
    reg.by_type.insert(type_id, entry);
    reg.by_name.insert(name, entry);
    tracing::debug!(name, type_name = entry.type_name, "registered type name");
    Ok(())
}

/// The name `T` is registered under.
pub fn name_of<T: 'static>() -> Option<&'static str> {
    by_type(TypeId::of::<T>()).map(|entry| entry.name)
}

fn encode_any<'a, T: Marshal + 'static>(
    value: &'a (dyn Any + 'static),
    ctx: &Ctx,
    cont: Option<Proc<'a>>,
) -> Proc<'a> {
    match value.downcast_ref::<T>() {
        Some(value) => marshal_value(value, ctx, cont),
        None => Proc::fail(ctx.marshal_error(Reason::UnregisteredType(type_name::<T>().to_string()))),
    }
}

/// A value preceded by its registered type name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Named<T>(pub T);

impl<T: Marshal + 'static> Marshal for Named<T> {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match name_of::<T>() {
            Some(name) => Proc::once(
                Token::TypeName(name.to_string()),
                Some(marshal_value(&self.0, ctx, cont)),
            ),
            None => Proc::fail(ctx.marshal_error(Reason::UnregisteredType(type_name::<T>().to_string()))),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty_value()
    }
}

impl<T: Unmarshal> Unmarshal for Named<T> {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let ctx = ctx.clone();
        Sink::new(move |token| match token {
            Some(Token::TypeName(got)) => {
                let Some(expected) = name_of::<T>() else {
                    return Err(ctx.unmarshal_error(Reason::UnregisteredType(type_name::<T>().to_string())));
                };
                if got != expected {
                    return Err(ctx.unmarshal_error(Reason::TypeNameMismatch {
                        expected: expected.to_string(),
                        got: got.clone(),
                    }));
                }
                Ok(Some(T::unmarshal(&ctx, Box::new(move |value: T| then(Named(value))))))
            }
            t => Err(ctx.unmarshal_error(Reason::unexpected(t, Kind::TypeName))),
        })
    }
}

/// A value of any registered type, decoded by the name in front of it.
pub struct AnyNamed(pub Box<dyn Any>);

impl AnyNamed {
    pub fn new<T: 'static>(value: T) -> Self {
        AnyNamed(Box::new(value))
    }

    /// The registered name of the held value's type.
    pub fn name(&self) -> Option<&'static str> {
        by_type(self.0.as_ref().type_id()).map(|entry| entry.name)
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|value| *value).map_err(AnyNamed)
    }
}

impl fmt::Debug for AnyNamed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyNamed").field(&self.name()).finish()
    }
}

impl Marshal for AnyNamed {
    fn marshal<'a>(&'a self, ctx: &Ctx, cont: Option<Proc<'a>>) -> Proc<'a> {
        match by_type(self.0.as_ref().type_id()) {
            Some(entry) => Proc::once(
                Token::TypeName(entry.name.to_string()),
                Some((entry.encode)(self.0.as_ref(), ctx, cont)),
            ),
            None => Proc::fail(ctx.marshal_error(Reason::UnregisteredType("unnamed value".to_string()))),
        }
    }
}

impl Unmarshal for AnyNamed {
    fn unmarshal<'a>(ctx: &Ctx, then: Then<'a, Self>) -> Sink<'a> {
        let ctx = ctx.clone();
        Sink::new(move |token| match token {
            Some(Token::TypeName(name)) => match by_name(name) {
                Some(entry) => Ok(Some((entry.decode)(
                    &ctx,
                    Box::new(move |value: Box<dyn Any>| then(AnyNamed(value))),
                ))),
                None => Err(ctx.unmarshal_error(Reason::UnregisteredType(name.clone()))),
            },
            t => Err(ctx.unmarshal_error(Reason::unexpected(t, Kind::TypeName))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unmarshal::unmarshal;
    use tokstream_core::collect;

    #[derive(Debug, Default, PartialEq)]
    struct Celsius {
        degrees: i32,
    }

    crate::object!(Celsius { degrees: i32 });

    #[derive(Debug, Default, PartialEq)]
    struct Fahrenheit {
        degrees: i32,
    }

    crate::object!(Fahrenheit { degrees: i32 });

    #[derive(Debug, Default, PartialEq)]
    struct Kelvin {
        degrees: u32,
    }

    crate::object!(Kelvin { degrees: u32 });

    #[derive(Debug, Default, PartialEq)]
    struct Unlisted;

    crate::object!(Unlisted {});

    #[test]
    fn test_register_is_idempotent_and_exclusive() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        register::<Celsius>("test.celsius").unwrap();
        register::<Celsius>("test.celsius").unwrap();
        assert_eq!(name_of::<Celsius>(), Some("test.celsius"));

        let err = register::<Celsius>("test.other").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyNamed { existing: "test.celsius", .. }));

        let err = register::<Kelvin>("test.celsius").unwrap_err();
        assert!(matches!(err, RegistryError::NameTaken { name: "test.celsius", .. }));
    }

    #[test]
    fn test_named_roundtrip() {
        register::<Fahrenheit>("test.fahrenheit").unwrap();
        let ctx = Ctx::new();
        let value = Named(Fahrenheit { degrees: 451 });
        let out = collect(marshal_value(&value, &ctx, None)).unwrap();
        assert_eq!(out[0], Token::TypeName("test.fahrenheit".into()));

        let back: Named<Fahrenheit> = unmarshal(&ctx, Proc::from_tokens(out)).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_named_mismatch_and_unregistered() {
        register::<Fahrenheit>("test.fahrenheit").unwrap();
        let ctx = Ctx::new();
        let tokens = vec![
            Token::TypeName("test.kelvin".into()),
            Token::Object,
            Token::ObjectEnd,
        ];
        let err = unmarshal::<Named<Fahrenheit>>(&ctx, Proc::from_tokens(tokens)).unwrap_err();
        assert!(matches!(err.reason(), Some(Reason::TypeNameMismatch { .. })));

        let err = collect(marshal_value(&Named(Unlisted), &ctx, None)).unwrap_err();
        assert!(matches!(err.reason(), Some(Reason::UnregisteredType(_))));
    }

    #[test]
    fn test_any_named_dispatches_on_name() {
        register::<Celsius>("test.celsius").unwrap();
        let ctx = Ctx::new();
        let value = AnyNamed::new(Celsius { degrees: -4 });
        assert_eq!(value.name(), Some("test.celsius"));

        let out = collect(marshal_value(&value, &ctx, None)).unwrap();
        let back: AnyNamed = unmarshal(&ctx, Proc::from_tokens(out)).unwrap();
        assert_eq!(back.downcast_ref::<Celsius>(), Some(&Celsius { degrees: -4 }));

        let unknown = vec![Token::TypeName("test.nowhere".into()), Token::Nil];
        let err = unmarshal::<AnyNamed>(&ctx, Proc::from_tokens(unknown)).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::UnregisteredType("test.nowhere".into())));
    }
}
