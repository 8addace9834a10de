//! Golden vectors for the wire format and Merkle digests.
//!
//! Each vector pairs a token stream with its exact wire bytes and its
//! SHA-256 stream digest. Any implementation of the format must reproduce
//! both.

use bytes::Bytes;
use sha2::Sha256;
use tokstream_core::{collect, decoder, hash_sum, to_vec, Proc, Token};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The stream.
    pub tokens: Vec<Token>,
    /// Expected wire bytes (hex).
    pub wire_hex: String,
    /// Expected SHA-256 stream digest (hex).
    pub sha256_hex: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "int map in canonical order",
            tokens: vec![
                Token::Map,
                Token::Int(42),
                Token::String("42".into()),
                Token::Int(80),
                Token::String("80".into()),
                Token::MapEnd,
            ],
            wire_hex: "52322a0000000000000028023432325000000000000000280238300c".into(),
            sha256_hex: "efd91aa0fbb2c33c539f10f9cae10c05f14d60cc1ff1c29a78c0ec020007fc59",
        },
        GoldenVector {
            name: "single int",
            tokens: vec![Token::Int(42)],
            wire_hex: "322a00000000000000".into(),
            sha256_hex: "40e621cb582e72039cb000f021b36406626f4eeeddb8a35fd97470213be9c9e1",
        },
        GoldenVector {
            name: "bool",
            tokens: vec![Token::Bool(true)],
            wire_hex: "1e01".into(),
            sha256_hex: "6eb600c3518ebddf6607ce48ac65d3b9563a6177d68e6537f0013aaa4dcf014a",
        },
        GoldenVector {
            name: "bytes",
            tokens: vec![Token::Bytes(Bytes::from_static(&[1, 2, 3]))],
            wire_hex: "2903010203".into(),
            sha256_hex: "95899dcc3c2646493f61d0fa2d228d4341a3ca562b37c7786988af2946050257",
        },
        GoldenVector {
            name: "tuple",
            tokens: vec![
                Token::Tuple,
                Token::Int8(1),
                Token::String("x".into()),
                Token::TupleEnd,
            ],
            wire_hex: "5333012801780d".into(),
            sha256_hex: "2b24c736c2acec7d892d66eb95a0e0f74d482fa97dc1ce2f872b00c86f15b2a5",
        },
        GoldenVector {
            name: "nil",
            tokens: vec![Token::Nil],
            wire_hex: "14".into(),
            sha256_hex: "d703d3da6a87bd8e0b453f3b6c41edcc9bf331b2b88ef26eb39dc7abee4e00a3",
        },
        GoldenVector {
            name: "int16 array",
            tokens: vec![
                Token::Array,
                Token::Int16(-1),
                Token::Int16(300),
                Token::ArrayEnd,
            ],
            wire_hex: "5034ffff342c010a".into(),
            sha256_hex: "df60f5d984791fb19ca3b3136abc0321b5a7b546999838bf2a8a321f951e79e9",
        },
        GoldenVector {
            name: "nan",
            tokens: vec![Token::NaN],
            wire_hex: "48".into(),
            sha256_hex: "8e3871a594f9af7a1f357a0793124aaf3358b0f020983678bcd411ee6af387a5",
        },
        GoldenVector {
            name: "string with varint length",
            tokens: vec![Token::String("a".repeat(200))],
            wire_hex: format!("28fdc801{}", "61".repeat(200)),
            sha256_hex: "85b0f75bd605124b0f7e7fa2159e967c4bc7aff1b6799726bfbf2362a96e9622",
        },
        GoldenVector {
            name: "nested arrays",
            tokens: vec![
                Token::Array,
                Token::Array,
                Token::Uint32(1),
                Token::ArrayEnd,
                Token::Array,
                Token::ArrayEnd,
                Token::ArrayEnd,
            ],
            wire_hex: "50503f010000000a500a0a".into(),
            sha256_hex: "77533b6c7ad156defdf836266ce19c77938be9d9111eaa6699066c5e51a4bdcf",
        },
        GoldenVector {
            name: "object",
            tokens: vec![
                Token::Object,
                Token::String("name".into()),
                Token::String("ada".into()),
                Token::String("age".into()),
                Token::Uint8(36),
                Token::ObjectEnd,
            ],
            wire_hex: "5128046e616d65280361646128036167653d240b".into(),
            sha256_hex: "1c814f796169f61d1e9b9c8b6172fcbdd9109e702e69106cea474a24bc64b313",
        },
    ]
}

/// Check one vector: encode, decode back, and digest.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let wire = to_vec(Proc::from_tokens(vector.tokens.clone())).map_err(|e| e.to_string())?;
    let wire_hex = hex::encode(&wire);
    if wire_hex != vector.wire_hex {
        return Err(format!("wire mismatch: got {wire_hex}"));
    }

    let decoded = collect(decoder(wire.as_slice())).map_err(|e| e.to_string())?;
    if decoded != vector.tokens {
        return Err(format!("decode mismatch: got {decoded:?}"));
    }

    let digest = hash_sum::<Sha256>(Proc::from_tokens(vector.tokens.clone())).map_err(|e| e.to_string())?;
    if digest.to_hex() != vector.sha256_hex {
        return Err(format!("digest mismatch: got {}", digest.to_hex()));
    }
    Ok(())
}

/// Verify every golden vector.
///
/// Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| match verify_vector(v) {
            Ok(()) => (v.name.to_string(), true, v.sha256_hex.to_string()),
            Err(detail) => (v.name.to_string(), false, detail),
        })
        .collect()
}
