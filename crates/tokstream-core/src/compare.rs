//! Canonical comparator: a total order over token streams.
//!
//! Streams are compared token by token without materializing either side.
//! End-of-stream sorts least. Tokens of different kinds order by the kind's
//! numeric value; tokens of the same kind order by their payload.

use std::cmp::Ordering;
use std::io::Read;

use crate::codec::decoder;
use crate::error::Result;
use crate::stream::Proc;
use crate::token::Token;

/// Compare two tokens.
pub fn cmp_token(a: &Token, b: &Token) -> Ordering {
    use Token::*;

    match (a, b) {
        (Bool(x), Bool(y)) => x.cmp(y),
        (String(x), String(y)) | (TypeName(x), TypeName(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Bytes(x), Bytes(y)) | (Ref(x), Ref(y)) | (Hash(x), Hash(y)) => x.cmp(y),
        (Int(x), Int(y)) | (Int64(x), Int64(y)) => x.cmp(y),
        (Int8(x), Int8(y)) => x.cmp(y),
        (Int16(x), Int16(y)) => x.cmp(y),
        (Int32(x), Int32(y)) => x.cmp(y),
        (Uint(x), Uint(y)) | (Uint64(x), Uint64(y)) => x.cmp(y),
        (Uint8(x), Uint8(y)) => x.cmp(y),
        (Uint16(x), Uint16(y)) => x.cmp(y),
        (Uint32(x), Uint32(y)) => x.cmp(y),
        (Float32(x), Float32(y)) => x.total_cmp(y),
        (Float64(x), Float64(y)) => x.total_cmp(y),
        _ => a.kind().cmp(&b.kind()),
    }
}

/// Compare two optional tokens, with `None` (end-of-stream) sorting least.
fn cmp_step(a: Option<&Token>, b: Option<&Token>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp_token(a, b),
    }
}

/// Compare two streams.
pub fn compare(a: Proc<'_>, b: Proc<'_>) -> Result<Ordering> {
    let mut a = Some(a);
    let mut b = Some(b);
    loop {
        let (ta, next_a) = match a.take() {
            Some(p) => p.next_token()?,
            None => (None, None),
        };
        let (tb, next_b) = match b.take() {
            Some(p) => p.next_token()?,
            None => (None, None),
        };
        match cmp_step(ta.as_ref(), tb.as_ref()) {
            Ordering::Equal if ta.is_none() => return Ok(Ordering::Equal),
            Ordering::Equal => {
                a = next_a;
                b = next_b;
            }
            order => return Ok(order),
        }
    }
}

/// Compare two buffered token sequences.
pub fn compare_tokens(a: &[Token], b: &[Token]) -> Ordering {
    let mut a = a.iter();
    let mut b = b.iter();
    loop {
        let (ta, tb) = (a.next(), b.next());
        match cmp_step(ta, tb) {
            Ordering::Equal if ta.is_none() => return Ordering::Equal,
            Ordering::Equal => {}
            order => return order,
        }
    }
}

/// Compare a stream against previously encoded bytes.
pub fn compare_bytes<R: Read>(proc: Proc<'_>, encoded: R) -> Result<Ordering> {
    compare(proc, decoder(encoded))
}
