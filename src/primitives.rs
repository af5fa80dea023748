//! The builtin library every interpreter starts with. All of it goes
//! through the same [`Library`] bridge the embedding agent uses for its own
//! bindings.

use crate::collections::{Map, TrieVector};
use crate::env::Environment;
use crate::eval::{EvalError, EvalErrorKind, EvalOutcome, Unwind};
use crate::install::{Library, PrimitiveDef};
use crate::interp::Interpreter;
use crate::seq::Seq;
use crate::source::Origin;
use crate::value::{Pair, Value};
use std::rc::Rc;

macro_rules! check_arity {
    ($name:expr, $args:expr, $origin:expr, exactly $n:expr) => {
        if $args.len() != $n {
            return Err(EvalError::arity($name, stringify!($n), $args.len(), $origin).into());
        }
    };
    ($name:expr, $args:expr, $origin:expr, at_least $n:expr) => {
        if $args.len() < $n {
            return Err(EvalError::arity(
                $name,
                concat!("at least ", stringify!($n)),
                $args.len(),
                $origin,
            )
            .into());
        }
    };
}

pub struct CoreLibrary;

impl Library for CoreLibrary {
    fn primitives(&self) -> Vec<PrimitiveDef> {
        vec![
            PrimitiveDef::evaluated("+", prim_add),
            PrimitiveDef::evaluated("-", prim_sub),
            PrimitiveDef::evaluated("*", prim_mul),
            PrimitiveDef::evaluated("/", prim_div),
            PrimitiveDef::evaluated("=", prim_eq),
            PrimitiveDef::evaluated("<", prim_lt),
            PrimitiveDef::evaluated("<=", prim_le),
            PrimitiveDef::evaluated(">", prim_gt),
            PrimitiveDef::evaluated(">=", prim_ge),
            PrimitiveDef::evaluated("not", prim_not),
            PrimitiveDef::raw("and", prim_and),
            PrimitiveDef::raw("or", prim_or),
            PrimitiveDef::raw_macro("when", prim_when),
            PrimitiveDef::evaluated("nil?", prim_is_nil),
            PrimitiveDef::evaluated("pair?", prim_is_pair),
            PrimitiveDef::evaluated("symbol?", prim_is_symbol),
            PrimitiveDef::evaluated("keyword?", prim_is_keyword),
            PrimitiveDef::evaluated("string?", prim_is_string),
            PrimitiveDef::evaluated("number?", prim_is_number),
            PrimitiveDef::evaluated("vector?", prim_is_vector),
            PrimitiveDef::evaluated("map?", prim_is_map),
            PrimitiveDef::evaluated("fn?", prim_is_fn),
            PrimitiveDef::evaluated("cons", prim_cons),
            PrimitiveDef::evaluated("first", prim_first),
            PrimitiveDef::evaluated("rest", prim_rest),
            PrimitiveDef::evaluated("list", prim_list),
            PrimitiveDef::evaluated("len", prim_len),
            PrimitiveDef::evaluated("vector", prim_vector),
            PrimitiveDef::evaluated("vec-get", prim_vec_get),
            PrimitiveDef::evaluated("vec-push", prim_vec_push),
            PrimitiveDef::evaluated("sub-vec", prim_sub_vec),
            PrimitiveDef::evaluated("hash-map", prim_hash_map),
            PrimitiveDef::evaluated("get", prim_get),
            PrimitiveDef::evaluated("assoc", prim_assoc),
            PrimitiveDef::evaluated("dissoc", prim_dissoc),
            PrimitiveDef::evaluated("keys", prim_keys),
            PrimitiveDef::evaluated("vals", prim_vals),
            PrimitiveDef::evaluated("str", prim_str),
            PrimitiveDef::evaluated("println", prim_println),
            PrimitiveDef::evaluated("apply", prim_apply),
        ]
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(value: &Value, origin: &Origin) -> Result<Num, Unwind> {
        match value {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(n) => Ok(Num::Float(*n)),
            other => Err(EvalError::type_mismatch("a number", other, origin).into()),
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(n) => Value::Float(n),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }
}

/// Combine two numbers, promoting to float when either side is one.
/// Integer arithmetic wraps rather than panicking; a counter that runs off
/// the end of `i64` is the script's problem, not a worker crash.
fn combine(
    a: Num,
    b: Num,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)),
        (x, y) => Num::Float(float_op(x.as_f64(), y.as_f64())),
    }
}

fn prim_add(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    let mut acc = Num::Int(0);
    for arg in &args {
        acc = combine(acc, Num::from_value(arg, origin)?, i64::wrapping_add, |a, b| a + b);
    }
    Ok(acc.to_value())
}

fn prim_sub(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("-", args, origin, at_least 1);
    let first = Num::from_value(&args[0], origin)?;
    if args.len() == 1 {
        return Ok(combine(Num::Int(0), first, i64::wrapping_sub, |a, b| a - b).to_value());
    }
    let mut acc = first;
    for arg in &args[1..] {
        acc = combine(acc, Num::from_value(arg, origin)?, i64::wrapping_sub, |a, b| a - b);
    }
    Ok(acc.to_value())
}

fn prim_mul(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    let mut acc = Num::Int(1);
    for arg in &args {
        acc = combine(acc, Num::from_value(arg, origin)?, i64::wrapping_mul, |a, b| a * b);
    }
    Ok(acc.to_value())
}

fn prim_div(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("/", args, origin, at_least 2);
    let mut acc = Num::from_value(&args[0], origin)?;
    for arg in &args[1..] {
        let divisor = Num::from_value(arg, origin)?;
        if let (Num::Int(_), Num::Int(0)) = (acc, divisor) {
            return Err(EvalError::new(EvalErrorKind::DivideByZero, origin).into());
        }
        acc = combine(acc, divisor, i64::wrapping_div, |a, b| a / b);
    }
    Ok(acc.to_value())
}

fn prim_eq(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("=", args, origin, at_least 2);
    Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
}

fn compare_chain(
    name: &str,
    args: &[Value],
    origin: &Origin,
    ok: fn(std::cmp::Ordering) -> bool,
) -> EvalOutcome {
    check_arity!(name, args, origin, at_least 2);
    for pair in args.windows(2) {
        let a = Num::from_value(&pair[0], origin)?.as_f64();
        let b = Num::from_value(&pair[1], origin)?.as_f64();
        let Some(ordering) = a.partial_cmp(&b) else {
            return Ok(Value::Bool(false));
        };
        if !ok(ordering) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn prim_lt(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    compare_chain("<", &args, origin, std::cmp::Ordering::is_lt)
}

fn prim_le(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    compare_chain("<=", &args, origin, std::cmp::Ordering::is_le)
}

fn prim_gt(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    compare_chain(">", &args, origin, std::cmp::Ordering::is_gt)
}

fn prim_ge(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    compare_chain(">=", &args, origin, std::cmp::Ordering::is_ge)
}

fn prim_not(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("not", args, origin, exactly 1);
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// Short-circuit conjunction over unevaluated forms.
fn prim_and(
    interp: &mut Interpreter,
    env: &Rc<Environment>,
    forms: Seq,
    _: &Origin,
) -> EvalOutcome {
    let mut last = Value::Bool(true);
    for form in forms {
        last = interp.eval(&form, env)?;
        if !last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

fn prim_or(
    interp: &mut Interpreter,
    env: &Rc<Environment>,
    forms: Seq,
    _: &Origin,
) -> EvalOutcome {
    for form in forms {
        let value = interp.eval(&form, env)?;
        if value.is_truthy() {
            return Ok(value);
        }
    }
    Ok(Value::Nil)
}

/// `(when test body...)` expands to a single-clause `cond`.
fn prim_when(
    _: &mut Interpreter,
    _: &Rc<Environment>,
    forms: Seq,
    origin: &Origin,
) -> EvalOutcome {
    let items: Vec<Value> = forms.collect();
    if items.is_empty() {
        return Err(EvalError::arity("when", "at least 1", 0, origin).into());
    }
    let clause = Value::list_from(items, origin);
    Ok(Value::list_from(vec![Value::symbol("cond"), clause], origin))
}

macro_rules! predicate {
    ($fn_name:ident, $name:expr, $pattern:pat) => {
        fn $fn_name(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
            check_arity!($name, args, origin, exactly 1);
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

predicate!(prim_is_nil, "nil?", Value::Nil);
predicate!(prim_is_pair, "pair?", Value::Pair(_));
predicate!(prim_is_symbol, "symbol?", Value::Symbol(_));
predicate!(prim_is_keyword, "keyword?", Value::Keyword(_));
predicate!(prim_is_string, "string?", Value::Str(_));
predicate!(prim_is_number, "number?", Value::Int(_) | Value::Float(_));
predicate!(prim_is_vector, "vector?", Value::Vector(_));
predicate!(prim_is_map, "map?", Value::Map(_));

fn prim_is_fn(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("fn?", args, origin, exactly 1);
    let callable = match &args[0] {
        Value::Closure(c) => !c.is_macro,
        Value::Primitive(_) | Value::Continuation(_) => true,
        _ => false,
    };
    Ok(Value::Bool(callable))
}

fn prim_cons(_: &mut Interpreter, mut args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("cons", args, origin, exactly 2);
    let cdr = args.pop().unwrap_or(Value::Nil);
    let car = args.pop().unwrap_or(Value::Nil);
    Ok(Value::Pair(Pair::new(car, cdr, origin.clone())))
}

fn as_seq(value: &Value, origin: &Origin) -> Result<Seq, Unwind> {
    Seq::from_value(value)
        .ok_or_else(|| EvalError::type_mismatch("a sequence", value, origin).into())
}

fn prim_first(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("first", args, origin, exactly 1);
    Ok(as_seq(&args[0], origin)?.first().unwrap_or(Value::Nil))
}

fn prim_rest(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("rest", args, origin, exactly 1);
    let rest = as_seq(&args[0], origin)?.rest();
    Ok(rest.into_value(origin))
}

fn prim_list(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    Ok(Value::list_from(args, origin))
}

fn prim_len(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("len", args, origin, exactly 1);
    let count = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Vector(v) => v.len(),
        Value::Map(m) => m.len(),
        other => as_seq(other, origin)?.count(),
    };
    Ok(Value::Int(count as i64))
}

fn prim_vector(_: &mut Interpreter, args: Vec<Value>, _: &Origin) -> EvalOutcome {
    Ok(Value::Vector(args.into_iter().collect()))
}

fn expect_vector<'a>(value: &'a Value, origin: &Origin) -> Result<&'a TrieVector, Unwind> {
    match value {
        Value::Vector(v) => Ok(v),
        other => Err(EvalError::type_mismatch("a vector", other, origin).into()),
    }
}

fn expect_index(value: &Value, origin: &Origin) -> Result<usize, Unwind> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(EvalError::type_mismatch("a non-negative index", other, origin).into()),
    }
}

fn prim_vec_get(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("vec-get", args, origin, exactly 2);
    let v = expect_vector(&args[0], origin)?;
    let i = expect_index(&args[1], origin)?;
    Ok(v.get(i).cloned().unwrap_or(Value::Nil))
}

fn prim_vec_push(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("vec-push", args, origin, exactly 2);
    let v = expect_vector(&args[0], origin)?;
    Ok(Value::Vector(v.clone().push(args[1].clone())))
}

fn prim_sub_vec(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("sub-vec", args, origin, at_least 2);
    let v = expect_vector(&args[0], origin)?;
    let start = expect_index(&args[1], origin)?;
    let end = match args.get(2) {
        Some(value) => expect_index(value, origin)?,
        None => v.len(),
    };
    match v.sub_vec(start, end) {
        Some(window) => Ok(Value::Vector(window)),
        None => Err(EvalError::new(
            EvalErrorKind::Host(format!(
                "sub-vec range {}..{} out of bounds for length {}",
                start,
                end,
                v.len()
            )),
            origin,
        )
        .into()),
    }
}

fn prim_hash_map(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    if args.len() % 2 != 0 {
        return Err(EvalError::arity("hash-map", "an even number of", args.len(), origin).into());
    }
    let mut m = Map::builder();
    for kv in args.chunks(2) {
        m.insert(kv[0].clone(), kv[1].clone());
    }
    Ok(Value::Map(m.frozen()))
}

fn prim_get(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("get", args, origin, at_least 2);
    let fallback = args.get(2).cloned().unwrap_or(Value::Nil);
    let found = match &args[0] {
        Value::Map(m) => m.get(&args[1]).cloned(),
        Value::Vector(v) => match &args[1] {
            Value::Int(n) if *n >= 0 => v.get(*n as usize).cloned(),
            _ => None,
        },
        Value::Nil => None,
        other => return Err(EvalError::type_mismatch("a map or vector", other, origin).into()),
    };
    Ok(found.unwrap_or(fallback))
}

fn expect_map<'a>(value: &'a Value, origin: &Origin) -> Result<&'a Map, Unwind> {
    match value {
        Value::Map(m) => Ok(m),
        other => Err(EvalError::type_mismatch("a map", other, origin).into()),
    }
}

fn prim_assoc(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("assoc", args, origin, at_least 3);
    if (args.len() - 1) % 2 != 0 {
        return Err(EvalError::arity("assoc", "key/value pairs", args.len(), origin).into());
    }
    let mut m = expect_map(&args[0], origin)?.clone();
    for kv in args[1..].chunks(2) {
        m = m.assoc(kv[0].clone(), kv[1].clone());
    }
    Ok(Value::Map(m))
}

fn prim_dissoc(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("dissoc", args, origin, at_least 2);
    let mut m = expect_map(&args[0], origin)?.clone();
    for key in &args[1..] {
        m = m.dissoc(key);
    }
    Ok(Value::Map(m))
}

fn prim_keys(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("keys", args, origin, exactly 1);
    let m = expect_map(&args[0], origin)?;
    let keys: Vec<Value> = m.iter().map(|(k, _)| k.clone()).collect();
    Ok(Value::list_from(keys, origin))
}

fn prim_vals(_: &mut Interpreter, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("vals", args, origin, exactly 1);
    let m = expect_map(&args[0], origin)?;
    let vals: Vec<Value> = m.iter().map(|(_, v)| v.clone()).collect();
    Ok(Value::list_from(vals, origin))
}

/// Strings and chars render without reader syntax here.
fn raw_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Char(c) => c.to_string(),
        other => other.to_string(),
    }
}

fn prim_str(_: &mut Interpreter, args: Vec<Value>, _: &Origin) -> EvalOutcome {
    let joined: String = args.iter().map(raw_text).collect();
    Ok(Value::str(&joined))
}

fn prim_println(_: &mut Interpreter, args: Vec<Value>, _: &Origin) -> EvalOutcome {
    let line: Vec<String> = args.iter().map(raw_text).collect();
    println!("{}", line.join(" "));
    Ok(Value::Nil)
}

fn prim_apply(interp: &mut Interpreter, mut args: Vec<Value>, origin: &Origin) -> EvalOutcome {
    check_arity!("apply", args, origin, at_least 2);
    let tail = args.pop().unwrap_or(Value::Nil);
    let callee = args.remove(0);
    let mut call_args = args;
    call_args.extend(as_seq(&tail, origin)?);
    interp.apply(callee, call_args, origin)
}

impl Seq {
    /// The list the rest of a sequence prints and binds as.
    fn into_value(self, origin: &Origin) -> Value {
        match self {
            Seq::Empty => Value::Nil,
            Seq::Cons(p) => Value::Pair(p),
            other => Value::list_from(other.collect(), origin),
        }
    }
}
