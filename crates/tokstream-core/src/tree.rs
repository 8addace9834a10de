//! Materialized token trees.
//!
//! A [`Tree`] retains one finished value as an arena of nodes. Containers
//! keep their begin and end tokens on a single node; scalars and refs are
//! leaves. Type names preceding a node and a hash tag following it are kept
//! as node metadata rather than as nodes of their own.

use std::any::TypeId;
use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::ctx::Ctx;
use crate::error::{Error, Reason, Result};
use crate::hash::{container_digest, scalar_digest, Digest, Digester};
use crate::stream::{copy, Proc, Sink, SinkResult};
use crate::token::Token;

/// Index of a node within its tree.
pub type NodeId = usize;

/// One retained value.
#[derive(Debug, Clone)]
pub struct Node {
    token: Token,
    end: Option<Token>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    type_names: Vec<String>,
    tag: Option<Digest>,
}

impl Node {
    /// The scalar token, or the begin token of a container.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The end token of a container.
    pub fn end(&self) -> Option<&Token> {
        self.end.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_container(&self) -> bool {
        self.token.is_begin()
    }

    /// Type names that preceded this node in the stream.
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    /// The hash tag that followed this node in the stream, if any.
    pub fn tag(&self) -> Option<&Digest> {
        self.tag.as_ref()
    }
}

/// A finished value, retained for replay, hashing and lookup.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    digests: RefCell<HashMap<(TypeId, NodeId), Digest>>,
}

impl Tree {
    /// Materialize exactly one value from `proc`.
    pub fn from_proc(proc: Proc<'_>) -> Result<Tree> {
        let mut tree = None;
        copy(
            proc,
            vec![Tree::build_sink(&Ctx::new(), |t| {
                tree = Some(t);
                Ok(None)
            })],
        )?;
        tree.ok_or_else(|| Ctx::new().unmarshal_error(Reason::ExpectingValue))
    }

    /// A sink that materializes the whole stream it receives, then hands the
    /// tree to `then`.
    pub fn build_sink<'a, F>(ctx: &Ctx, then: F) -> Sink<'a>
    where
        F: FnOnce(Tree) -> SinkResult<'a> + 'a,
    {
        builder_sink(Builder::new(ctx.clone()), Box::new(then))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of nodes, containers and leaves alike.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in depth-first pre-order from `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        out
    }

    /// The Merkle digest of the subtree at `id`, memoized per digester.
    pub fn hash<D: Digester + 'static>(&self, id: NodeId) -> Digest {
        let key = (TypeId::of::<D>(), id);
        if let Some(digest) = self.digests.borrow().get(&key) {
            return digest.clone();
        }
        let node = &self.nodes[id];
        let digest = match &node.token {
            Token::Ref(hash) => Digest(hash.clone()),
            t if t.is_begin() => {
                let children: Vec<Digest> =
                    node.children.iter().map(|c| self.hash::<D>(*c)).collect();
                container_digest::<D, _>(t, &children)
            }
            t => scalar_digest::<D>(t),
        };
        self.digests.borrow_mut().insert(key, digest.clone());
        digest
    }

    /// The first node in depth-first pre-order whose digest is `digest`.
    pub fn find<D: Digester + 'static>(&self, digest: &Digest) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| &self.hash::<D>(*id) == digest)
    }

    /// Replay the subtree at `id`, including its recorded tags.
    pub fn iter(&self, id: NodeId) -> Proc<'_> {
        replay(Replay::new(self, id, None))
    }

    /// Replay the subtree at `id`, replacing each descendant container for
    /// which `pred` holds by a ref to its digest. Scalars and the node at
    /// `id` itself are always replayed in full.
    pub fn iter_with_refs<'a, D, F>(&'a self, id: NodeId, pred: F) -> Proc<'a>
    where
        D: Digester + 'static,
        F: Fn(&Node) -> bool + 'a,
    {
        let substitute: Substitute<'a> =
            Box::new(move |tree: &Tree, id: NodeId| pred(tree.node(id)).then(|| tree.hash::<D>(id)));
        replay(Replay::new(self, id, Some(substitute)))
    }

    /// Replay the subtree at `id` from a shared tree, independent of any
    /// borrow.
    pub fn iter_shared(tree: Rc<Tree>, id: NodeId) -> Proc<'static> {
        replay(Replay::new(tree, id, None))
    }
}

/// Materialize `proc` and replay the first subtree whose digest is `digest`.
pub fn find_by_hash<D: Digester + 'static>(proc: Proc<'_>, digest: &Digest) -> Result<Proc<'static>> {
    let tree = Rc::new(Tree::from_proc(proc)?);
    match tree.find::<D>(digest) {
        Some(id) => Ok(Tree::iter_shared(tree, id)),
        None => {
            tracing::debug!(digest = ?digest, nodes = tree.len(), "no subtree with digest");
            Err(Error::NotFound)
        }
    }
}

struct Builder {
    ctx: Ctx,
    nodes: Vec<Node>,
    open: Vec<NodeId>,
    pending_names: Vec<String>,
    last: Option<NodeId>,
    root: Option<NodeId>,
}

impl Builder {
    fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            nodes: Vec::new(),
            open: Vec::new(),
            pending_names: Vec::new(),
            last: None,
            root: None,
        }
    }

    fn fail(&self, reason: Reason) -> Error {
        self.ctx.unmarshal_error(reason)
    }

    fn add_node(&mut self, token: Token) -> Result<NodeId> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(self.fail(Reason::MoreThanOneValue));
        }
        let id = self.nodes.len();
        let parent = self.open.last().copied();
        self.nodes.push(Node {
            token,
            end: None,
            children: Vec::new(),
            parent,
            type_names: std::mem::take(&mut self.pending_names),
            tag: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        Ok(id)
    }

    fn complete(&mut self, id: NodeId) {
        self.last = Some(id);
        if self.open.is_empty() {
            self.root = Some(id);
        }
    }

    fn push(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::TypeName(name) => {
                self.pending_names.push(name.clone());
                self.last = None;
            }
            Token::Hash(hash) => {
                let id = self.last.ok_or_else(|| self.fail(Reason::UnexpectedHashToken))?;
                self.nodes[id].tag = Some(Digest(hash.clone()));
            }
            t if t.is_begin() => {
                let id = self.add_node(t.clone())?;
                self.open.push(id);
                self.last = None;
            }
            t if t.is_end() => {
                let id = self
                    .open
                    .pop()
                    .ok_or_else(|| self.fail(Reason::UnexpectedEndToken))?;
                if self.nodes[id].token.kind().end_of() != Some(t.kind()) {
                    return Err(self.fail(Reason::UnexpectedEndToken));
                }
                self.nodes[id].end = Some(t.clone());
                self.complete(id);
            }
            t => {
                let id = self.add_node(t.clone())?;
                self.complete(id);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Tree> {
        if !self.open.is_empty() {
            return Err(self.fail(Reason::MissingEnd));
        }
        if !self.pending_names.is_empty() {
            return Err(self.fail(Reason::ExpectingValue));
        }
        let root = self.root.ok_or_else(|| self.fail(Reason::ExpectingValue))?;
        Ok(Tree {
            nodes: self.nodes,
            root,
            digests: RefCell::new(HashMap::new()),
        })
    }
}

type Then<'a> = Box<dyn FnOnce(Tree) -> SinkResult<'a> + 'a>;

fn builder_sink<'a>(mut builder: Builder, then: Then<'a>) -> Sink<'a> {
    Sink::new(move |token| match token {
        Some(token) => {
            builder.push(token)?;
            Ok(Some(builder_sink(builder, then)))
        }
        None => then(builder.finish()?),
    })
}

type Substitute<'a> = Box<dyn Fn(&Tree, NodeId) -> Option<Digest> + 'a>;

enum Frame {
    Enter(NodeId),
    Exit(NodeId),
}

struct Replay<'a, T> {
    tree: T,
    frames: Vec<Frame>,
    out: VecDeque<Token>,
    root: NodeId,
    substitute: Option<Substitute<'a>>,
}

impl<'a, T: Borrow<Tree>> Replay<'a, T> {
    fn new(tree: T, id: NodeId, substitute: Option<Substitute<'a>>) -> Self {
        Self {
            tree,
            frames: vec![Frame::Enter(id)],
            out: VecDeque::new(),
            root: id,
            substitute,
        }
    }

    /// Expand the next frame into output tokens. False once exhausted.
    fn expand(&mut self) -> bool {
        let Some(frame) = self.frames.pop() else {
            return false;
        };
        let tree: &Tree = self.tree.borrow();
        match frame {
            Frame::Enter(id) => {
                let node = tree.node(id);
                self.out
                    .extend(node.type_names.iter().cloned().map(Token::TypeName));
                let substituted = match &self.substitute {
                    Some(f) if id != self.root && node.is_container() => f(tree, id),
                    _ => None,
                };
                if let Some(digest) = substituted {
                    self.out.push_back(digest.to_ref());
                    return true;
                }
                self.out.push_back(node.token.clone());
                if node.is_container() {
                    self.frames.push(Frame::Exit(id));
                    self.frames
                        .extend(node.children.iter().rev().map(|c| Frame::Enter(*c)));
                } else if let Some(tag) = &node.tag {
                    self.out.push_back(tag.to_token());
                }
            }
            Frame::Exit(id) => {
                let node = tree.node(id);
                self.out.extend(node.end.clone());
                if let Some(tag) = &node.tag {
                    self.out.push_back(tag.to_token());
                }
            }
        }
        true
    }
}

fn replay<'a, T: Borrow<Tree> + 'a>(mut state: Replay<'a, T>) -> Proc<'a> {
    Proc::new(move || loop {
        if let Some(token) = state.out.pop_front() {
            return Ok((Some(token), Some(replay(state))));
        }
        if !state.expand() {
            return Ok((None, None));
        }
    })
}
