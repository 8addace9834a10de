//! Binary codec: the canonical wire format.
//!
//! Each token is one kind byte followed by a kind-determined payload:
//! - Fixed-width little-endian for integers and floats (Int/Uint are 8 bytes)
//! - A single 0/1 byte for bool
//! - A length prefix then raw bytes for string, bytes, ref, hash and type name
//! - Nothing for nil, NaN and structural markers
//!
//! Length prefix: lengths below 128 are a single byte. Longer lengths are one
//! byte holding the bit-complement of the varint's byte count, followed by the
//! length as an unsigned LEB128 varint.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::stream::{copy, Proc, Sink};
use crate::token::{Kind, Token};

/// Decode ceiling for string and bytes payloads (128 MiB).
pub const MAX_LEN: u64 = 128 * 1024 * 1024;

/// Longest valid LEB128 encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

/// Append the canonical bytes of one token.
pub fn encode_token(token: &Token, buf: &mut Vec<u8>) {
    buf.push(token.kind().to_u8());
    match token {
        Token::Bool(v) => buf.push(u8::from(*v)),
        Token::String(s) | Token::TypeName(s) => encode_payload(buf, s.as_bytes()),
        Token::Bytes(b) | Token::Ref(b) | Token::Hash(b) => encode_payload(buf, b),
        Token::Int(v) | Token::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Int8(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Int16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Uint(v) | Token::Uint64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Uint8(v) => buf.push(*v),
        Token::Uint16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Uint32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Token::Float32(v) => buf.extend_from_slice(&v.to_bits().to_le_bytes()),
        Token::Float64(v) => buf.extend_from_slice(&v.to_bits().to_le_bytes()),
        _ => {}
    }
}

/// Canonical bytes of one token.
pub fn token_bytes(token: &Token) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_token(token, &mut buf);
    buf
}

fn encode_payload(buf: &mut Vec<u8>, payload: &[u8]) {
    encode_len(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

fn encode_len(buf: &mut Vec<u8>, len: u64) {
    if len < 128 {
        buf.push(len as u8);
        return;
    }
    let mut varint = [0u8; MAX_VARINT_LEN];
    let n = put_uvarint(&mut varint, len);
    buf.push(!(n as u8));
    buf.extend_from_slice(&varint[..n]);
}

/// Write `value` as an unsigned LEB128 varint, returning the byte count.
fn put_uvarint(buf: &mut [u8; MAX_VARINT_LEN], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// A sink writing the canonical bytes of every token to `writer`.
///
/// The writer is flushed at end-of-stream.
pub fn encoder<'a, W: Write + 'a>(writer: W) -> Sink<'a> {
    encode_into(writer, Vec::new())
}

fn encode_into<'a, W: Write + 'a>(mut writer: W, mut buf: Vec<u8>) -> Sink<'a> {
    Sink::new(move |token| match token {
        Some(token) => {
            buf.clear();
            encode_token(token, &mut buf);
            writer.write_all(&buf)?;
            Ok(Some(encode_into(writer, buf)))
        }
        None => {
            writer.flush()?;
            Ok(None)
        }
    })
}

/// Encode a whole stream to bytes.
pub fn to_vec(proc: Proc<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    copy(proc, vec![encoder(&mut out)])?;
    Ok(out)
}

/// A stream of tokens decoded from `reader`.
///
/// A clean end of input before a kind byte ends the stream; any other read
/// failure is an error.
pub fn decoder<'a, R: Read + 'a>(reader: R) -> Proc<'a> {
    Proc::new(move || {
        let mut reader = reader;
        match read_token(&mut reader)? {
            Some(token) => Ok((Some(token), Some(decoder(reader)))),
            None => Ok((None, None)),
        }
    })
}

/// Read one token, or `None` at a clean end of input.
pub fn read_token<R: Read>(reader: &mut R) -> Result<Option<Token>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let kind = Kind::from_u8(byte[0]).ok_or(Error::UnknownKind(byte[0]))?;

    let token = match kind {
        Kind::Bool => Token::Bool(read_array::<1, _>(reader)?[0] != 0),
        Kind::String => Token::String(read_string(reader)?),
        Kind::TypeName => Token::TypeName(read_string(reader)?),
        Kind::Bytes => Token::Bytes(read_payload(reader)?),
        Kind::Ref => Token::Ref(read_payload(reader)?),
        Kind::Hash => Token::Hash(read_payload(reader)?),
        Kind::Int => Token::Int(i64::from_le_bytes(read_array(reader)?)),
        Kind::Int8 => Token::Int8(i8::from_le_bytes(read_array(reader)?)),
        Kind::Int16 => Token::Int16(i16::from_le_bytes(read_array(reader)?)),
        Kind::Int32 => Token::Int32(i32::from_le_bytes(read_array(reader)?)),
        Kind::Int64 => Token::Int64(i64::from_le_bytes(read_array(reader)?)),
        Kind::Uint => Token::Uint(u64::from_le_bytes(read_array(reader)?)),
        Kind::Uint8 => Token::Uint8(read_array::<1, _>(reader)?[0]),
        Kind::Uint16 => Token::Uint16(u16::from_le_bytes(read_array(reader)?)),
        Kind::Uint32 => Token::Uint32(u32::from_le_bytes(read_array(reader)?)),
        Kind::Uint64 => Token::Uint64(u64::from_le_bytes(read_array(reader)?)),
        Kind::Float32 => {
            Token::float32(f32::from_bits(u32::from_le_bytes(read_array(reader)?)))
        }
        Kind::Float64 => {
            Token::float64(f64::from_bits(u64::from_le_bytes(read_array(reader)?)))
        }
        other => Token::bare(other).ok_or(Error::UnknownKind(byte[0]))?,
    };
    Ok(Some(token))
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_len<R: Read>(reader: &mut R) -> Result<u64> {
    let first = read_array::<1, _>(reader)?[0];
    if first < 128 {
        return Ok(u64::from(first));
    }
    let count = usize::from(!first);
    if count == 0 || count > MAX_VARINT_LEN {
        return Err(Error::MalformedVarint);
    }
    let mut value = 0u64;
    for i in 0..count {
        let byte = read_array::<1, _>(reader)?[0];
        let last = i + 1 == count;
        if (byte & 0x80 == 0) != last {
            return Err(Error::MalformedVarint);
        }
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(Error::MalformedVarint);
        }
        // A zero final byte is padding the encoder never writes.
        if last && i > 0 && byte == 0 {
            return Err(Error::MalformedVarint);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
    }
    // Short lengths have exactly one encoding.
    if value < 128 {
        return Err(Error::MalformedVarint);
    }
    Ok(value)
}

fn read_payload<R: Read>(reader: &mut R) -> Result<Bytes> {
    let len = read_len(reader)?;
    if len > MAX_LEN {
        return Err(Error::TooLong { len });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(Bytes::from(buf))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let payload = read_payload(reader)?;
    String::from_utf8(payload.to_vec()).map_err(|_| Error::InvalidUtf8)
}
