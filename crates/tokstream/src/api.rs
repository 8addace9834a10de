//! One-call entry points over the marshal and unmarshal engines.

use std::cmp::Ordering;
use std::io::{Read, Write};

use tokstream_core::{
    compare, copy, decoder, encoder, hash_sum, to_vec, Ctx, Digest, Digester, Proc, Result,
};

use crate::marshal::{marshal_value, Marshal};
use crate::unmarshal::{unmarshal, Unmarshal};

/// The token stream for `value`.
pub fn marshal<'a, T: Marshal + ?Sized>(ctx: &Ctx, value: &'a T) -> Proc<'a> {
    marshal_value(value, ctx, None)
}

/// Encode `value` in the binary wire format.
pub fn to_bytes<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>> {
    to_vec(marshal(&Ctx::new(), value))
}

/// Encode `value` into `writer`.
pub fn to_writer<T: Marshal + ?Sized, W: Write>(ctx: &Ctx, value: &T, writer: W) -> Result<()> {
    copy(marshal(ctx, value), vec![encoder(writer)])
}

/// Decode one value from wire bytes.
pub fn from_bytes<T: Unmarshal>(bytes: &[u8]) -> Result<T> {
    unmarshal(&Ctx::new(), decoder(bytes))
}

/// Decode one value from `reader`, which must hold nothing after it.
pub fn from_reader<T: Unmarshal, R: Read>(ctx: &Ctx, reader: R) -> Result<T> {
    unmarshal(ctx, decoder(reader))
}

/// The Merkle digest of `value`.
pub fn hash_of<D: Digester, T: Marshal + ?Sized>(value: &T) -> Result<Digest> {
    hash_sum::<D>(marshal(&Ctx::new(), value))
}

/// Order two values by their canonical token streams.
pub fn compare_values<A, B>(a: &A, b: &B) -> Result<Ordering>
where
    A: Marshal + ?Sized,
    B: Marshal + ?Sized,
{
    let ctx = Ctx::new();
    compare(marshal(&ctx, a), marshal(&ctx, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokstream_core::{DefaultDigester, Error, Reason};

    #[test]
    fn test_bytes_roundtrip() {
        let value = (vec![1u32, 2, 3], Some("s".to_string()), -7i64);
        let bytes = to_bytes(&value).unwrap();
        let back: (Vec<u32>, Option<String>, i64) = from_bytes(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_writer_reader() {
        let mut buf = Vec::new();
        to_writer(&Ctx::new(), &[true, false], &mut buf).unwrap();
        let back: [bool; 2] = from_reader(&Ctx::new(), buf.as_slice()).unwrap();
        assert_eq!(back, [true, false]);
    }

    #[test]
    fn test_trailing_value_rejected() {
        let mut bytes = to_bytes(&1i8).unwrap();
        bytes.extend(to_bytes(&2i8).unwrap());
        let err = from_bytes::<i8>(&bytes).unwrap_err();
        assert!(matches!(err, Error::Unmarshal { reason: Reason::MoreThanOneValue, .. }));
    }

    #[test]
    fn test_hash_ignores_map_iteration_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..64i32 {
            a.insert(i, i.to_string());
            b.insert(63 - i, (63 - i).to_string());
        }
        assert_eq!(
            hash_of::<DefaultDigester, _>(&a).unwrap(),
            hash_of::<DefaultDigester, _>(&b).unwrap()
        );
        assert_eq!(to_bytes(&a).unwrap(), to_bytes(&b).unwrap());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&vec![1i8], &vec![1i8, 0]).unwrap(), Ordering::Less);
        assert_eq!(compare_values("b", "a").unwrap(), Ordering::Greater);
        assert_eq!(compare_values(&2u8, &2u8).unwrap(), Ordering::Equal);
    }

    proptest::proptest! {
        #[test]
        fn test_compare_values_matches_native_order(a: i64, b: i64, x: String, y: String) {
            proptest::prop_assert_eq!(compare_values(&a, &b).unwrap(), a.cmp(&b));
            proptest::prop_assert_eq!(compare_values(&x, &y).unwrap(), x.as_bytes().cmp(y.as_bytes()));
        }
    }
}
