use crate::collections::{Map, TrieVector};
use crate::env::Environment;
use crate::host::HostValue;
use crate::install::PrimitiveDef;
use crate::intern::{Keyword, Symbol};
use crate::source::Origin;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A runtime value. This one closed union is shared by the reader's output
/// (code is data), the evaluator, and the persistent collections.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Char(char),
    Symbol(Symbol),
    Keyword(Keyword),
    Pair(Rc<Pair>),
    Vector(TrieVector),
    Map(Map),
    Closure(Rc<Closure>),
    Primitive(Rc<PrimitiveDef>),
    Continuation(Rc<Continuation>),
    Host(Rc<dyn HostValue>),
}

/// A cons cell. Lists are chains of these ending in `Nil` (or, for dotted
/// pairs, any other value).
///
/// Each cell carries the `Origin` it was read from, and a one-shot macro
/// expansion cache: the first time a macro call through this cell expands,
/// the expansion is stored here and reused on every later evaluation of the
/// same cell. Expansion therefore happens once per call-site node, which is
/// observable if the expander has side effects. A cell shared between
/// environments with different macro bindings will reuse whichever expansion
/// ran first; callers who need distinct expansions must read distinct trees.
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
    pub origin: Origin,
    pub expansion: RefCell<Option<Value>>,
}

impl Pair {
    pub fn new(car: Value, cdr: Value, origin: Origin) -> Rc<Pair> {
        Rc::new(Pair {
            car,
            cdr,
            origin,
            expansion: RefCell::new(None),
        })
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pair({:?} . {:?})", self.car, self.cdr)
    }
}

/// A user-defined function or macro: parameter spec, body forms, and the
/// environment captured at the `fn`/`macro` form.
pub struct Closure {
    pub name: Option<Symbol>,
    pub params: Value,
    pub body: Vec<Value>,
    pub env: Rc<Environment>,
    pub is_macro: bool,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_macro { "macro" } else { "fn" };
        match &self.name {
            Some(name) => write!(f, "{}({})", kind, name),
            None => write!(f, "{}(anonymous)", kind),
        }
    }
}

/// An escape continuation captured by `call/cc`. One-shot and upward-only:
/// it is armed while the establishing call is on the stack and invoking it
/// afterwards is an evaluation error.
#[derive(Debug)]
pub struct Continuation {
    pub token: u64,
    pub armed: Cell<bool>,
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn keyword(name: &str) -> Value {
        Value::Keyword(Keyword::new(name))
    }

    /// Build a proper list from values, innermost-out.
    pub fn list_from(items: Vec<Value>, origin: &Origin) -> Value {
        let mut tail = Value::Nil;
        for item in items.into_iter().rev() {
            tail = Value::Pair(Pair::new(item, tail, origin.clone()));
        }
        tail
    }

    /// Everything is truthy except `nil` and `#f`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Char(_) => "char",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Pair(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Closure(c) if c.is_macro => "macro",
            Value::Closure(_) => "fn",
            Value::Primitive(_) => "primitive",
            Value::Continuation(_) => "continuation",
            Value::Host(h) => h.type_name(),
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The origin of this form if it was read from text.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Value::Pair(p) => Some(&p.origin),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            // Structural over the chain; spans do not participate.
            (Value::Pair(a), Value::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.car == b.car && a.cdr == b.cdr)
            }
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            (Value::Continuation(a), Value::Continuation(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            // 0.0 == -0.0 but their bit patterns differ; equal values must
            // hash alike or hash-routed lookups diverge from probing ones.
            Value::Float(n) => {
                let n = if *n == 0.0 { 0.0f64 } else { *n };
                n.to_bits().hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Symbol(s) => s.hash(state),
            Value::Keyword(k) => k.hash(state),
            Value::Pair(p) => {
                p.car.hash(state);
                p.cdr.hash(state);
            }
            Value::Vector(v) => v.hash(state),
            Value::Map(m) => m.hash(state),
            Value::Closure(c) => Rc::as_ptr(c).hash(state),
            Value::Primitive(p) => Rc::as_ptr(p).hash(state),
            Value::Continuation(c) => Rc::as_ptr(c).hash(state),
            Value::Host(h) => (Rc::as_ptr(h) as *const ()).hash(state),
        }
    }
}

fn escape_str(s: &str) -> String {
    s.chars().fold(String::new(), |mut acc, char| {
        match char {
            '"' => acc.push_str("\\\""),
            '\n' => acc.push_str("\\n"),
            '\r' => acc.push_str("\\r"),
            '\t' => acc.push_str("\\t"),
            '\\' => acc.push_str("\\\\"),
            c => acc.push(c),
        }
        acc
    })
}

// Display prints reader syntax, so query results read back.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "\"{}\"", escape_str(s)),
            Value::Char(' ') => write!(f, "#\\space"),
            Value::Char('\n') => write!(f, "#\\newline"),
            Value::Char(c) => write!(f, "#\\{}", c),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Keyword(k) => write!(f, "{}", k),
            Value::Pair(_) => {
                write!(f, "(")?;
                let mut cur = self.clone();
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            if !first {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", p.car)?;
                            first = false;
                            cur = p.cdr.clone();
                        }
                        Value::Nil => break,
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Vector(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Closure(c) => match &c.name {
                Some(name) if c.is_macro => write!(f, "#<macro:{}>", name),
                Some(name) => write!(f, "#<fn:{}>", name),
                None if c.is_macro => write!(f, "#<macro>"),
                None => write!(f, "#<fn>"),
            },
            Value::Primitive(p) => write!(f, "#<primitive:{}>", p.full_name()),
            Value::Continuation(_) => write!(f, "#<continuation>"),
            Value::Host(h) => write!(f, "#<host:{}>", h.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
