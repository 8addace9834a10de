//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation of the format must produce, for the same value:
//! - identical wire bytes
//! - an identical SHA-256 stream digest

use std::collections::HashMap;

use serde::Serialize;
use sha2::Sha256;
use tokstream::core::{Ctx, Error, Options};
use tokstream::{from_bytes, hash_of, object, to_bytes, Marshal, Value};

/// A single golden test vector.
#[derive(Debug, Serialize)]
pub struct GoldenVector {
    pub name: String,
    pub description: String,
    pub wire: String,
    pub sha256: String,
}

fn generate_vector<T: Marshal + ?Sized>(name: &str, description: &str, value: &T) -> GoldenVector {
    GoldenVector {
        name: name.to_string(),
        description: description.to_string(),
        wire: hex::encode(to_bytes(value).unwrap()),
        sha256: hash_of::<Sha256, _>(value).unwrap().to_hex(),
    }
}

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    age: u8,
}

object!(Person { name: String, age: u8 });

fn int_map() -> HashMap<isize, String> {
    let mut map = HashMap::new();
    map.insert(80, "80".to_string());
    map.insert(42, "42".to_string());
    map
}

/// Generate all golden vectors, paired with their expected outputs.
fn generate_all_vectors() -> Vec<(GoldenVector, &'static str, &'static str)> {
    vec![
        (
            generate_vector("int_map", "Map keyed by isize, emitted in canonical order", &int_map()),
            "52322a0000000000000028023432325000000000000000280238300c",
            "efd91aa0fbb2c33c539f10f9cae10c05f14d60cc1ff1c29a78c0ec020007fc59",
        ),
        (
            generate_vector("int", "A single isize", &42isize),
            "322a00000000000000",
            "40e621cb582e72039cb000f021b36406626f4eeeddb8a35fd97470213be9c9e1",
        ),
        (
            generate_vector("bool", "true", &true),
            "1e01",
            "6eb600c3518ebddf6607ce48ac65d3b9563a6177d68e6537f0013aaa4dcf014a",
        ),
        (
            generate_vector("byte_vec", "Vec<u8> is one Bytes token", &vec![1u8, 2, 3]),
            "2903010203",
            "95899dcc3c2646493f61d0fa2d228d4341a3ca562b37c7786988af2946050257",
        ),
        (
            generate_vector("tuple", "Two-element tuple", &(1i8, "x".to_string())),
            "5333012801780d",
            "2b24c736c2acec7d892d66eb95a0e0f74d482fa97dc1ce2f872b00c86f15b2a5",
        ),
        (
            generate_vector("none", "None is Nil", &Option::<String>::None),
            "14",
            "d703d3da6a87bd8e0b453f3b6c41edcc9bf331b2b88ef26eb39dc7abee4e00a3",
        ),
        (
            generate_vector("i16_vec", "Little-endian fixed width", &vec![-1i16, 300]),
            "5034ffff342c010a",
            "df60f5d984791fb19ca3b3136abc0321b5a7b546999838bf2a8a321f951e79e9",
        ),
        (
            generate_vector("nan", "NaN payloads normalize to the NaN kind", &f64::NAN),
            "48",
            "8e3871a594f9af7a1f357a0793124aaf3358b0f020983678bcd411ee6af387a5",
        ),
        (
            generate_vector("nested", "Nested arrays", &vec![vec![1u32], vec![]]),
            "50503f010000000a500a0a",
            "77533b6c7ad156defdf836266ce19c77938be9d9111eaa6699066c5e51a4bdcf",
        ),
        (
            generate_vector(
                "object",
                "Struct fields in declaration order",
                &Person {
                    name: "ada".into(),
                    age: 36,
                },
            ),
            "5128046e616d65280361646128036167653d240b",
            "1c814f796169f61d1e9b9c8b6172fcbdd9109e702e69106cea474a24bc64b313",
        ),
    ]
}

#[test]
fn test_vectors_match() {
    for (vector, wire, sha256) in generate_all_vectors() {
        assert_eq!(vector.wire, wire, "wire mismatch for {}", vector.name);
        assert_eq!(vector.sha256, sha256, "digest mismatch for {}", vector.name);
    }
}

#[test]
fn test_long_string_uses_varint_length() {
    let value = "a".repeat(200);
    let vector = generate_vector("long_string", "200-byte string", value.as_str());
    assert_eq!(vector.wire, format!("28fdc801{}", "61".repeat(200)));
    assert_eq!(
        vector.sha256,
        "85b0f75bd605124b0f7e7fa2159e967c4bc7aff1b6799726bfbf2362a96e9622"
    );
}

#[test]
fn test_vectors_deterministic() {
    let v1 = generate_all_vectors();
    let v2 = generate_all_vectors();
    for ((a, _, _), (b, _, _)) in v1.iter().zip(v2.iter()) {
        assert_eq!(a.wire, b.wire, "wire mismatch for {}", a.name);
        assert_eq!(a.sha256, b.sha256, "digest mismatch for {}", a.name);
    }
}

#[test]
fn test_vectors_decode() {
    let map: HashMap<isize, String> =
        from_bytes(&hex::decode("52322a0000000000000028023432325000000000000000280238300c").unwrap()).unwrap();
    assert_eq!(map, int_map());

    let person: Person = from_bytes(&hex::decode("5128046e616d65280361646128036167653d240b").unwrap()).unwrap();
    assert_eq!(person, Person { name: "ada".into(), age: 36 });

    let nan: f64 = from_bytes(&hex::decode("48").unwrap()).unwrap();
    assert!(nan.is_nan());

    let dynamic: Value = from_bytes(&hex::decode("5333012801780d").unwrap()).unwrap();
    assert_eq!(dynamic, Value::Tuple(vec![Value::Int8(1), Value::from("x")]));
}

#[test]
fn print_golden_vectors_json() {
    #[derive(Serialize)]
    struct VectorFile {
        version: String,
        description: String,
        digest: String,
        options: Options,
        vectors: Vec<GoldenVector>,
    }

    let file = VectorFile {
        version: "0.1.0".to_string(),
        description: "Golden test vectors for the tokstream wire format.".to_string(),
        digest: "sha256".to_string(),
        options: Ctx::new().options().clone(),
        vectors: generate_all_vectors().into_iter().map(|(v, _, _)| v).collect(),
    };

    let json = serde_json::to_string_pretty(&file).unwrap();
    println!("{}", json);
}

// =============================================================================
// REJECTION TEST VECTORS
// These test that malformed input is rejected.
// =============================================================================

fn decode_err(hex_bytes: &str) -> Error {
    from_bytes::<Value>(&hex::decode(hex_bytes).unwrap()).unwrap_err()
}

#[test]
fn test_reject_length_over_ceiling() {
    // 128 MiB + 1, as a four-byte varint.
    assert!(matches!(
        decode_err("28fb81808040"),
        Error::TooLong { len: 134_217_729 }
    ));
}

#[test]
fn test_reject_malformed_varint() {
    // Count says one byte, but the byte has its continuation bit set.
    assert!(matches!(decode_err("28fe81"), Error::MalformedVarint));
    // A zero count.
    assert!(matches!(decode_err("28ff"), Error::MalformedVarint));
}

#[test]
fn test_reject_unknown_kind() {
    assert!(matches!(decode_err("07"), Error::UnknownKind(7)));
}

#[test]
fn test_reject_invalid_utf8() {
    assert!(matches!(decode_err("2801ff"), Error::InvalidUtf8));
}

#[test]
fn test_reject_truncated_payload() {
    match decode_err("322a00") {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected io error, got {other:?}"),
    }
}
