use crate::collections::Map;
use crate::intern::Symbol;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A lexical scope: one binding frame plus a parent chain. Frames are
/// builder-mode `Map`s keyed by `Value::Symbol`; symbol interning makes each
/// probe a pointer hash. Environments are `Rc`-shared between the evaluator
/// and the closures that captured them.
#[derive(Debug)]
pub struct Environment {
    parent: Option<Rc<Environment>>,
    frame: RefCell<Map>,
}

impl Environment {
    pub fn new() -> Rc<Environment> {
        Rc::new(Environment {
            parent: None,
            frame: RefCell::new(Map::builder()),
        })
    }

    pub fn new_enclosed(parent: Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            parent: Some(parent),
            frame: RefCell::new(Map::builder()),
        })
    }

    /// Bind in this frame, shadowing any parent binding.
    pub fn define(&self, symbol: &Symbol, value: Value) {
        self.frame
            .borrow_mut()
            .insert(Value::Symbol(symbol.clone()), value);
    }

    pub fn lookup(&self, symbol: &Symbol) -> Option<Value> {
        let key = Value::Symbol(symbol.clone());
        let mut env = self;
        loop {
            if let Some(value) = env.frame.borrow().get(&key) {
                return Some(value.clone());
            }
            env = env.parent.as_deref()?;
        }
    }

    /// Rebind the nearest existing binding. `false` when the symbol is
    /// unbound anywhere in the chain.
    pub fn set(&self, symbol: &Symbol, value: Value) -> bool {
        let key = Value::Symbol(symbol.clone());
        let mut env = self;
        loop {
            if env.frame.borrow().get(&key).is_some() {
                env.frame.borrow_mut().insert(key, value);
                return true;
            }
            match env.parent.as_deref() {
                Some(parent) => env = parent,
                None => return false,
            }
        }
    }

    /// Every name bound in this chain, for the REPL completer.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        let mut env = Some(self);
        while let Some(e) = env {
            for (key, _) in e.frame.borrow().iter() {
                if let Value::Symbol(s) = key {
                    names.insert(s.to_string());
                }
            }
            env = e.parent.as_deref();
        }
        names
    }
}
