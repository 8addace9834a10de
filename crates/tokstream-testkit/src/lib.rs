//! # tokstream testkit
//!
//! Testing utilities for tokstream.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Token streams with their exact wire bytes and
//!   SHA-256 digests
//! - **Generators**: Proptest strategies for dynamically shaped values
//! - **Fixtures**: Sample struct types and a ref-store helper
//!
//! ## Golden Vectors
//!
//! ```rust
//! use tokstream_testkit::vectors::{all_vectors, verify_vector};
//!
//! for vector in all_vectors() {
//!     assert_eq!(verify_vector(&vector), Ok(()));
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tokstream_testkit::generators::value;
//!
//! proptest! {
//!     #[test]
//!     fn encodes_deterministically(v in value()) {
//!         prop_assert_eq!(tokstream::to_bytes(&v).unwrap(), tokstream::to_bytes(&v).unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use tokstream_testkit::fixtures::{sample_person, Person, RefFixture};
//!
//! let fixture = RefFixture::new();
//! let digest = fixture.put(&sample_person()).unwrap();
//! let person: Person = fixture.get(&digest).unwrap();
//! assert_eq!(person, sample_person());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{branch_chain, sample_person, Address, Branch, Person, RefFixture};
pub use generators::{int_map_entries, map_key, scalar_value, value};
pub use vectors::{all_vectors, verify_all_vectors, verify_vector, GoldenVector};
