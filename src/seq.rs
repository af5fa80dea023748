//! The first/rest view that the evaluator and primitives use to walk any
//! sequential value without caring how it is stored.

use crate::collections::TrieVector;
use crate::value::{Pair, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A traversal position over a sequential value. `Seq` is a cursor, not a
/// container: advancing clones no elements and never mutates the backing
/// value.
#[derive(Clone)]
pub enum Seq {
    Empty,
    /// A cons chain. Walking stops at the first non-pair cdr, so the seq of
    /// a dotted pair `(1 . 2)` yields only `1`.
    Cons(Rc<Pair>),
    /// A vector suffix starting at the given element index.
    Window(TrieVector, usize),
    /// A thunk producing a seq, run at most once and then cached.
    Lazy(Rc<Lazy>),
    /// Already-materialized values, consumed front to back.
    Items(Rc<Vec<Value>>, usize),
}

pub struct Lazy {
    state: RefCell<LazyState>,
}

enum LazyState {
    Pending(Option<Box<dyn FnOnce() -> Seq>>),
    Forced(Seq),
}

impl Lazy {
    fn force(&self) -> Seq {
        let thunk = match &mut *self.state.borrow_mut() {
            LazyState::Forced(seq) => return seq.clone(),
            LazyState::Pending(thunk) => thunk.take(),
        };
        // Run outside the borrow: the thunk may itself build seqs.
        let seq = match thunk {
            Some(f) => f(),
            None => Seq::Empty,
        };
        *self.state.borrow_mut() = LazyState::Forced(seq.clone());
        seq
    }
}

impl Seq {
    pub fn lazy(thunk: impl FnOnce() -> Seq + 'static) -> Seq {
        Seq::Lazy(Rc::new(Lazy {
            state: RefCell::new(LazyState::Pending(Some(Box::new(thunk)))),
        }))
    }

    pub fn items(values: Vec<Value>) -> Seq {
        Seq::Items(Rc::new(values), 0)
    }

    /// A seq over any sequential value. Maps seq as `[key value]` entry
    /// vectors. `None` for scalars.
    pub fn from_value(value: &Value) -> Option<Seq> {
        match value {
            Value::Nil => Some(Seq::Empty),
            Value::Pair(pair) => Some(Seq::Cons(Rc::clone(pair))),
            Value::Vector(v) => Some(Seq::Window(v.clone(), 0)),
            Value::Map(m) => {
                let entries = m
                    .iter()
                    .map(|(k, v)| {
                        Value::Vector([k.clone(), v.clone()].into_iter().collect())
                    })
                    .collect();
                Some(Seq::items(entries))
            }
            _ => None,
        }
    }

    pub fn first(&self) -> Option<Value> {
        match self {
            Seq::Empty => None,
            Seq::Cons(pair) => Some(pair.car.clone()),
            Seq::Window(v, at) => v.get(*at).cloned(),
            Seq::Lazy(lazy) => lazy.force().first(),
            Seq::Items(items, at) => items.get(*at).cloned(),
        }
    }

    pub fn rest(&self) -> Seq {
        match self {
            Seq::Empty => Seq::Empty,
            Seq::Cons(pair) => match &pair.cdr {
                Value::Pair(next) => Seq::Cons(Rc::clone(next)),
                _ => Seq::Empty,
            },
            Seq::Window(v, at) => {
                if at + 1 < v.len() {
                    Seq::Window(v.clone(), at + 1)
                } else {
                    Seq::Empty
                }
            }
            Seq::Lazy(lazy) => lazy.force().rest(),
            Seq::Items(items, at) => {
                if at + 1 < items.len() {
                    Seq::Items(Rc::clone(items), at + 1)
                } else {
                    Seq::Empty
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Seq::Empty => true,
            Seq::Lazy(lazy) => lazy.force().is_empty(),
            other => other.first().is_none(),
        }
    }
}

impl Iterator for Seq {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let first = self.first()?;
        *self = self.rest();
        Some(first)
    }
}
