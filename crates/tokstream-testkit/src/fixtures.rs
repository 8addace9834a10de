//! Test fixtures and helpers.
//!
//! Sample struct types wired up with `object!`, and a ref-store fixture for
//! round trips through content addressing.

use std::collections::BTreeMap;

use tokstream::core::{
    deref, hash_sum, Ctx, DefaultDigester, Digest, MemoryRefStore, Proc, Result, Tree,
};
use tokstream::{marshal, object, unmarshal, Marshal, Unmarshal};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

object!(Address { street: String, city: String });

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: u8,
    pub emails: Vec<String>,
    pub address: Option<Address>,
    pub scores: BTreeMap<String, i32>,
}

object!(Person {
    name: String,
    age: u8,
    emails: Vec<String>,
    address: Option<Address>,
    scores: BTreeMap<String, i32>,
} deprecated ["nickname"]);

/// A labelled tree, for nesting-depth tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub label: u32,
    pub children: Vec<Branch>,
}

object!(Branch { label: u32, children: Vec<Branch> });

/// A fully populated person.
pub fn sample_person() -> Person {
    let mut scores = BTreeMap::new();
    scores.insert("chess".to_string(), 1800);
    scores.insert("go".to_string(), -3);
    Person {
        name: "Ada".to_string(),
        age: 36,
        emails: vec!["ada@example.com".to_string()],
        address: Some(Address {
            street: "12 Analytical Row".to_string(),
            city: "London".to_string(),
        }),
        scores,
    }
}

/// A chain of `depth` nested branches.
pub fn branch_chain(depth: u32) -> Branch {
    let mut branch = Branch::default();
    for label in (0..depth).rev() {
        branch = Branch {
            label,
            children: vec![branch],
        };
    }
    branch
}

/// A ref store seeded by marshaling values into it.
#[derive(Debug, Default)]
pub struct RefFixture {
    pub store: MemoryRefStore,
}

impl RefFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every container of `value`, returning the root digest.
    pub fn put<T: Marshal + ?Sized>(&self, value: &T) -> Result<Digest> {
        let tree = Tree::from_proc(marshal(&Ctx::new(), value))?;
        self.store.insert_tree::<DefaultDigester>(&tree)
    }

    /// Rebuild a `T` from the ref for `digest`.
    pub fn get<T: Unmarshal>(&self, digest: &Digest) -> Result<T> {
        let proc = deref(Proc::once(digest.to_ref(), None), self.store.resolver());
        unmarshal(&Ctx::new(), proc)
    }

    /// Stream digest of the value behind `digest`, fully dereferenced.
    pub fn digest_of(&self, digest: &Digest) -> Result<Digest> {
        hash_sum::<DefaultDigester>(deref(Proc::once(digest.to_ref(), None), self.store.resolver()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokstream::{from_bytes, hash_of, to_bytes};

    #[test]
    fn test_person_roundtrip() {
        let person = sample_person();
        let bytes = to_bytes(&person).unwrap();
        assert_eq!(from_bytes::<Person>(&bytes).unwrap(), person);
    }

    #[test]
    fn test_branch_chain_roundtrip() {
        let chain = branch_chain(500);
        let bytes = to_bytes(&chain).unwrap();
        assert_eq!(from_bytes::<Branch>(&bytes).unwrap(), chain);
    }

    #[test]
    fn test_ref_fixture_restores_value() {
        let fixture = RefFixture::new();
        let person = sample_person();
        let digest = fixture.put(&person).unwrap();

        // Person, address, emails and scores are containers.
        assert_eq!(fixture.store.len(), 4);
        assert_eq!(fixture.get::<Person>(&digest).unwrap(), person);
        assert_eq!(
            fixture.digest_of(&digest).unwrap(),
            hash_of::<DefaultDigester, _>(&person).unwrap()
        );
    }

    #[test]
    fn test_shared_subtrees_stored_once() {
        let fixture = RefFixture::new();
        let twins = vec![branch_chain(3), branch_chain(3)];
        fixture.put(&twins).unwrap();
        // The outer array, then an object and a children array for each of
        // the four branches in one chain.
        assert_eq!(fixture.store.len(), 1 + 4 * 2);
    }
}
