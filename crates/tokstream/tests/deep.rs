//! Deeply nested values through the marshal and unmarshal engines, with and
//! without hooks installed.

use std::cell::Cell;
use std::rc::Rc;

use tokstream::core::{collect, decoder, to_vec, Ctx, Token};
use tokstream::{marshal_value, object, unmarshal};

const DEPTH: u32 = 100_000;

#[derive(Debug, Default)]
struct Deep {
    label: u32,
    next: Option<Box<Deep>>,
}

object!(Deep { label: u32, next: Option<Box<Deep>> });

impl Drop for Deep {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut deep) = next {
            next = deep.next.take();
        }
    }
}

fn chain(depth: u32) -> Deep {
    let mut deep = Deep { label: depth, next: None };
    for label in (0..depth).rev() {
        deep = Deep {
            label,
            next: Some(Box::new(deep)),
        };
    }
    deep
}

fn labels(deep: &Deep) -> Vec<u32> {
    let mut out = vec![deep.label];
    let mut at = deep.next.as_deref();
    while let Some(deep) = at {
        out.push(deep.label);
        at = deep.next.as_deref();
    }
    out
}

fn counting_marshal_ctx(count: &Rc<Cell<usize>>) -> Ctx {
    let seen = Rc::clone(count);
    Ctx::new().with_marshal_hook(move |_, proc| {
        seen.set(seen.get() + 1);
        proc
    })
}

#[test]
fn test_deep_marshal_without_hook() {
    let deep = chain(DEPTH);
    let tokens = collect(marshal_value(&deep, &Ctx::new(), None)).unwrap();
    // Object, two field names, label, ObjectEnd per level; Nil at the bottom.
    assert_eq!(tokens.len(), 5 * (DEPTH as usize + 1) + 1);
}

#[test]
fn test_deep_marshal_with_hook() {
    let deep = chain(DEPTH);
    let count = Rc::new(Cell::new(0));
    let ctx = counting_marshal_ctx(&count);

    let hooked = collect(marshal_value(&deep, &ctx, None)).unwrap();
    let plain = collect(marshal_value(&deep, &Ctx::new(), None)).unwrap();
    assert_eq!(hooked, plain);
    assert_eq!(hooked.first(), Some(&Token::Object));
    assert_eq!(hooked.last(), Some(&Token::ObjectEnd));
    assert!(count.get() > DEPTH as usize);
}

#[test]
fn test_deep_roundtrip_with_hooks() {
    let deep = chain(DEPTH);
    let marshaled = Rc::new(Cell::new(0));
    let unmarshaled = Rc::new(Cell::new(0));
    let seen = Rc::clone(&unmarshaled);
    let ctx = counting_marshal_ctx(&marshaled).with_unmarshal_hook(move |_, sink| {
        seen.set(seen.get() + 1);
        sink
    });

    let bytes = to_vec(marshal_value(&deep, &ctx, None)).unwrap();
    let back: Deep = unmarshal(&ctx, decoder(bytes.as_slice())).unwrap();

    assert_eq!(labels(&back), labels(&deep));
    assert_eq!(labels(&back).len(), DEPTH as usize + 1);
    assert!(unmarshaled.get() > DEPTH as usize);
}
