//! Traversal context: options, diagnostic path, hooks and cycle guard.
//!
//! A [`Ctx`] is cheap to clone. Pushing a path segment or entering a pointer
//! returns a new context and leaves the parent untouched, so every
//! continuation captures exactly the context it was created under.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Path, Reason, Result, Segment};
use crate::stream::{Proc, Sink};
use crate::token::Token;

/// Pointer-chase depth past which identity tracking starts.
///
/// A tunable heuristic: shallow pointer chains are never tracked.
pub const DEFAULT_CYCLE_CHECK_DEPTH: usize = 64;

/// Options consulted during marshal and unmarshal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Omit struct fields whose value is empty.
    pub skip_empty_fields: bool,
    /// Reject struct field names the destination does not know.
    pub disallow_unknown_fields: bool,
    /// See [`DEFAULT_CYCLE_CHECK_DEPTH`].
    pub cycle_check_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            skip_empty_fields: false,
            disallow_unknown_fields: false,
            cycle_check_depth: DEFAULT_CYCLE_CHECK_DEPTH,
        }
    }
}

/// Hook wrapping the stream of every marshaled value.
pub type MarshalHook = Rc<dyn for<'a> Fn(&Ctx, Proc<'a>) -> Proc<'a>>;

/// Hook wrapping the sink of every unmarshaled value.
pub type UnmarshalHook = Rc<dyn for<'a> Fn(&Ctx, Sink<'a>) -> Sink<'a>>;

struct PathNode {
    segment: Segment,
    parent: Option<Rc<PathNode>>,
}

struct Visited {
    addr: usize,
    parent: Option<Rc<Visited>>,
}

/// Per-traversal configuration and diagnostic state.
#[derive(Clone, Default)]
pub struct Ctx {
    options: Rc<Options>,
    path: Option<Rc<PathNode>>,
    marshal_hook: Option<MarshalHook>,
    unmarshal_hook: Option<UnmarshalHook>,
    pointer_depth: usize,
    visited: Option<Rc<Visited>>,
}

impl Ctx {
    /// A context with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Rc::new(options);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn skip_empty_fields(mut self, on: bool) -> Self {
        Rc::make_mut(&mut self.options).skip_empty_fields = on;
        self
    }

    pub fn disallow_unknown_fields(mut self, on: bool) -> Self {
        Rc::make_mut(&mut self.options).disallow_unknown_fields = on;
        self
    }

    /// Tap or replace the stream produced for every visited value.
    pub fn with_marshal_hook<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&Ctx, Proc<'a>) -> Proc<'a> + 'static,
    {
        self.marshal_hook = Some(Rc::new(hook));
        self
    }

    /// Tap or replace the sink built for every visited destination.
    pub fn with_unmarshal_hook<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&Ctx, Sink<'a>) -> Sink<'a> + 'static,
    {
        self.unmarshal_hook = Some(Rc::new(hook));
        self
    }

    pub fn marshal_hook(&self) -> Option<&MarshalHook> {
        self.marshal_hook.as_ref()
    }

    pub fn unmarshal_hook(&self) -> Option<&UnmarshalHook> {
        self.unmarshal_hook.as_ref()
    }

    fn push(&self, segment: Segment) -> Ctx {
        let mut ctx = self.clone();
        ctx.path = Some(Rc::new(PathNode {
            segment,
            parent: self.path.clone(),
        }));
        ctx
    }

    /// Descend into an array, slice or tuple element.
    pub fn with_index(&self, index: usize) -> Ctx {
        self.push(Segment::Index(index))
    }

    /// Descend into a struct field.
    pub fn with_field(&self, name: &str) -> Ctx {
        self.push(Segment::Field(name.to_string()))
    }

    /// Descend into a map entry.
    pub fn with_key(&self, key: Token) -> Ctx {
        self.push(Segment::Key(key))
    }

    /// Render the current path, root first.
    pub fn path(&self) -> Path {
        let mut segments = Vec::new();
        let mut node = self.path.as_deref();
        while let Some(n) = node {
            segments.push(n.segment.clone());
            node = n.parent.as_deref();
        }
        segments.reverse();
        Path(segments)
    }

    pub fn marshal_error(&self, reason: Reason) -> Error {
        Error::Marshal {
            reason,
            path: self.path(),
        }
    }

    pub fn unmarshal_error(&self, reason: Reason) -> Error {
        Error::Unmarshal {
            reason,
            path: self.path(),
        }
    }

    /// Follow a pointer to the value at `addr`.
    ///
    /// Past the configured depth every address on the current chain is
    /// remembered, and revisiting one fails with `CyclicPointer`.
    pub fn enter_pointer(&self, addr: usize) -> Result<Ctx> {
        let mut ctx = self.clone();
        ctx.pointer_depth += 1;
        if ctx.pointer_depth > self.options.cycle_check_depth {
            let mut node = self.visited.as_deref();
            while let Some(v) = node {
                if v.addr == addr {
                    return Err(self.marshal_error(Reason::CyclicPointer));
                }
                node = v.parent.as_deref();
            }
            ctx.visited = Some(Rc::new(Visited {
                addr,
                parent: self.visited.clone(),
            }));
        }
        Ok(ctx)
    }

    pub fn pointer_depth(&self) -> usize {
        self.pointer_depth
    }
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("options", &self.options)
            .field("path", &self.path().to_string())
            .field("pointer_depth", &self.pointer_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_stack_disciplined() {
        let root = Ctx::new();
        let a = root.with_index(42);
        let b = a.with_index(43);
        assert_eq!(b.path().to_string(), "/42/43");
        assert_eq!(a.path().to_string(), "/42");
        assert_eq!(root.path().to_string(), "/");

        let c = a.with_field("name");
        assert_eq!(c.path().to_string(), "/42/name");
    }

    #[test]
    fn test_option_builders() {
        let ctx = Ctx::new().skip_empty_fields(true);
        assert!(ctx.options().skip_empty_fields);
        assert!(!ctx.options().disallow_unknown_fields);

        let child = ctx.with_index(0).disallow_unknown_fields(true);
        assert!(child.options().disallow_unknown_fields);
        assert!(!ctx.options().disallow_unknown_fields);
    }

    #[test]
    fn test_options_serde_roundtrip() {
        let options = Options {
            skip_empty_fields: true,
            disallow_unknown_fields: true,
            cycle_check_depth: 3,
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(options, back);

        let partial: Options = serde_json::from_str(r#"{"skip_empty_fields":true}"#).unwrap();
        assert_eq!(partial.cycle_check_depth, DEFAULT_CYCLE_CHECK_DEPTH);
    }

    #[test]
    fn test_cycle_detection_only_past_depth() {
        let options = Options {
            cycle_check_depth: 2,
            ..Options::default()
        };
        let ctx = Ctx::new().with_options(options);

        // Revisits below the threshold are not tracked.
        let ctx = ctx.enter_pointer(7).unwrap();
        let ctx = ctx.enter_pointer(7).unwrap();

        // Past it, the first repeat fails.
        let ctx = ctx.enter_pointer(7).unwrap();
        let ctx = ctx.enter_pointer(8).unwrap();
        let err = ctx.enter_pointer(7).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::CyclicPointer));
    }

    #[test]
    fn test_sibling_pointers_are_not_cycles() {
        let ctx = Ctx::new().with_options(Options {
            cycle_check_depth: 0,
            ..Options::default()
        });
        let left = ctx.enter_pointer(1).unwrap();
        let right = ctx.enter_pointer(1).unwrap();
        assert!(left.enter_pointer(2).is_ok());
        assert!(right.enter_pointer(2).is_ok());
    }
}
