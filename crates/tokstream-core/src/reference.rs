//! Content-addressed references: resolving `Ref` tokens back into values.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{PoisonError, RwLock};

use crate::error::Result;
use crate::hash::{Digest, Digester};
use crate::stream::Proc;
use crate::token::Token;
use crate::tree::{NodeId, Tree};

type Resolve<'a> = Rc<dyn Fn(&Digest) -> Result<Option<Proc<'a>>> + 'a>;

/// Replay `proc`, splicing in the stream `resolver` returns for each ref.
///
/// Resolved streams are themselves dereferenced. A ref the resolver does
/// not know passes through unchanged.
pub fn deref<'a, F>(proc: Proc<'a>, resolver: F) -> Proc<'a>
where
    F: Fn(&Digest) -> Result<Option<Proc<'a>>> + 'a,
{
    deref_rc(proc, Rc::new(resolver))
}

fn deref_rc<'a>(proc: Proc<'a>, resolver: Resolve<'a>) -> Proc<'a> {
    Proc::new(move || {
        let (token, next) = proc.next_token()?;
        let Some(token) = token else {
            return Ok((None, None));
        };
        let next = next.unwrap_or_else(Proc::empty);
        let Token::Ref(hash) = &token else {
            return Ok((Some(token), Some(deref_rc(next, resolver))));
        };
        let digest = Digest(hash.clone());
        match resolver(&digest)? {
            Some(replacement) => {
                tracing::trace!(digest = ?digest, "ref resolved");
                Ok((None, Some(deref_rc(replacement.chain(Some(next)), resolver))))
            }
            None => {
                tracing::debug!(digest = ?digest, "ref left unresolved");
                Ok((Some(token), Some(deref_rc(next, resolver))))
            }
        }
    })
}

/// Result of storing a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Content addressing makes re-inserts no-ops.
    AlreadyExists,
}

/// Storage for subtrees keyed by their digest.
pub trait RefStore {
    fn get(&self, digest: &Digest) -> Result<Option<Vec<Token>>>;

    fn put(&self, digest: Digest, tokens: Vec<Token>) -> Result<InsertResult>;

    fn contains(&self, digest: &Digest) -> Result<bool> {
        Ok(self.get(digest)?.is_some())
    }
}

/// In-memory ref store.
///
/// Thread-safe via RwLock; all data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryRefStore {
    entries: RwLock<HashMap<Digest, Vec<Token>>>,
}

impl MemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store every container subtree of `tree` under its digest, each with
    /// its own nested containers already abbreviated to refs.
    ///
    /// Returns the digest of the root.
    pub fn insert_tree<D: Digester + 'static>(&self, tree: &Tree) -> Result<Digest> {
        self.insert_node::<D>(tree, tree.root())?;
        Ok(tree.hash::<D>(tree.root()))
    }

    fn insert_node<D: Digester + 'static>(&self, tree: &Tree, id: NodeId) -> Result<()> {
        let node = tree.node(id);
        if !node.is_container() {
            return Ok(());
        }
        for child in node.children() {
            self.insert_node::<D>(tree, *child)?;
        }
        let tokens = crate::stream::collect(crate::stream::strip_tags(
            tree.iter_with_refs::<D, _>(id, |n| n.is_container()),
        ))?;
        self.put(tree.hash::<D>(id), tokens)?;
        Ok(())
    }

    /// A resolver over this store, for [`deref`].
    pub fn resolver<'a>(&'a self) -> impl Fn(&Digest) -> Result<Option<Proc<'a>>> + 'a {
        move |digest: &Digest| Ok(self.get(digest)?.map(Proc::from_tokens))
    }
}

impl RefStore for MemoryRefStore {
    fn get(&self, digest: &Digest) -> Result<Option<Vec<Token>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(digest).cloned())
    }

    fn put(&self, digest: Digest, tokens: Vec<Token>) -> Result<InsertResult> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&digest) {
            return Ok(InsertResult::AlreadyExists);
        }
        entries.insert(digest, tokens);
        Ok(InsertResult::Inserted)
    }
}
