use crate::collections::{Map, TrieVector};
use crate::env::Environment;
use crate::install::PrimitiveKind;
use crate::intern::Symbol;
use crate::interp::Interpreter;
use crate::seq::Seq;
use crate::source::Origin;
use crate::value::{Closure, Continuation, Pair, Value};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("Unbound symbol `{0}`")]
    UnboundSymbol(Symbol),
    #[error("Cannot set! unbound symbol `{0}`")]
    SetUnbound(Symbol),
    #[error("Not callable: {0}")]
    NotCallable(String),
    #[error("`{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Invalid `{form}` form: {message}")]
    BadSpecialForm {
        form: &'static str,
        message: String,
    },
    #[error("Continuation invoked after its call/cc returned")]
    StaleContinuation,
    #[error("unquote-splicing value is not a sequence")]
    BadSplice,
    #[error("Division by zero")]
    DivideByZero,
    #[error("Destructuring failed: {0}")]
    Binding(String),
    #[error("Host error: {0}")]
    Host(String),
}

/// A frame of the diagnostic pseudo-stack: the rendered call form and where
/// it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub form: String,
    pub origin: Origin,
}

/// An evaluation failure. As it unwinds through enclosing call forms, each
/// one prepends itself to `trace` (innermost first), which is what `query`
/// renders under the report.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub origin: Origin,
    pub trace: Vec<TraceFrame>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, origin: &Origin) -> EvalError {
        EvalError {
            kind,
            origin: origin.clone(),
            trace: Vec::new(),
        }
    }

    pub fn host(message: impl Into<String>) -> EvalError {
        EvalError::new(EvalErrorKind::Host(message.into()), &Origin::synthetic())
    }

    pub fn arity(name: &str, expected: &str, got: usize, origin: &Origin) -> EvalError {
        EvalError::new(
            EvalErrorKind::Arity {
                name: name.to_string(),
                expected: expected.to_string(),
                got,
            },
            origin,
        )
    }

    pub fn type_mismatch(expected: &str, found: &Value, origin: &Origin) -> EvalError {
        EvalError::new(
            EvalErrorKind::TypeMismatch {
                expected: expected.to_string(),
                found: found.type_name().to_string(),
            },
            origin,
        )
    }

    fn push_frame(&mut self, site: &Rc<Pair>) {
        self.trace.push(TraceFrame {
            form: render_form(site),
            origin: site.origin.clone(),
        });
    }
}

fn render_form(site: &Rc<Pair>) -> String {
    let text = Value::Pair(Rc::clone(site)).to_string();
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{}...", head)
    } else {
        text
    }
}

/// How an evaluation stops early. Escape continuations ride their own
/// variant so they cannot be confused with (or swallowed as) errors.
#[derive(Debug)]
pub enum Unwind {
    Error(EvalError),
    Escape { token: u64, value: Value },
}

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Unwind {
        Unwind::Error(err)
    }
}

pub type EvalOutcome = Result<Value, Unwind>;

/// Special-form head symbols, interned once so dispatch is identity
/// comparison rather than string matching.
pub(crate) struct Forms {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub begin: Symbol,
    pub def: Symbol,
    pub set: Symbol,
    pub fn_: Symbol,
    pub macro_: Symbol,
    pub cond: Symbol,
    pub else_: Symbol,
    pub arrow: Symbol,
    pub call_cc: Symbol,
    pub call_cc_long: Symbol,
}

impl Forms {
    pub(crate) fn new() -> Forms {
        Forms {
            quote: Symbol::new("quote"),
            quasiquote: Symbol::new("quasiquote"),
            unquote: Symbol::new("unquote"),
            unquote_splicing: Symbol::new("unquote-splicing"),
            begin: Symbol::new("begin"),
            def: Symbol::new("def"),
            set: Symbol::new("set!"),
            fn_: Symbol::new("fn"),
            macro_: Symbol::new("macro"),
            cond: Symbol::new("cond"),
            else_: Symbol::new("else"),
            arrow: Symbol::new("=>"),
            // `call/cc` reads as a namespaced symbol; intern it the same way.
            call_cc: Symbol::parse("call/cc"),
            call_cc_long: Symbol::new("call-with-current-continuation"),
        }
    }
}

/// Names the REPL completer offers alongside bound identifiers.
pub fn special_form_names() -> &'static [&'static str] {
    &[
        "quote",
        "quasiquote",
        "unquote",
        "unquote-splicing",
        "begin",
        "def",
        "set!",
        "fn",
        "macro",
        "cond",
        "else",
        "call/cc",
        "call-with-current-continuation",
    ]
}

/// The elements of a proper-list prefix; stops at a non-pair cdr.
pub(crate) fn list_items(mut form: &Value) -> Vec<Value> {
    let mut items = Vec::new();
    while let Value::Pair(p) = form {
        items.push(p.car.clone());
        form = &p.cdr;
    }
    items
}

fn improper_from(items: Vec<Value>, tail: Value, origin: &Origin) -> Value {
    let mut out = tail;
    for item in items.into_iter().rev() {
        out = Value::Pair(Pair::new(item, out, origin.clone()));
    }
    out
}

macro_rules! check_form {
    ($cond:expr, $form:expr, $message:expr, $origin:expr) => {
        if !($cond) {
            return Err(EvalError::new(
                EvalErrorKind::BadSpecialForm {
                    form: $form,
                    message: $message.to_string(),
                },
                $origin,
            )
            .into());
        }
    };
}

impl Interpreter {
    pub fn eval(&mut self, form: &Value, env: &Rc<Environment>) -> EvalOutcome {
        match form {
            Value::Symbol(sym) => self.lookup_in(sym, env, &Origin::synthetic()),
            Value::Pair(pair) => self.eval_pair(pair, env),
            // Collection literals evaluate their elements.
            Value::Vector(v) => {
                let mut out = TrieVector::builder();
                for item in v.iter() {
                    out = out.push(self.eval(item, env)?);
                }
                Ok(Value::Vector(out.frozen()))
            }
            Value::Map(m) => {
                let mut out = Map::builder();
                for (k, v) in m.iter() {
                    let key = self.eval(k, env)?;
                    let value = self.eval(v, env)?;
                    out.insert(key, value);
                }
                Ok(Value::Map(out.frozen()))
            }
            other => Ok(other.clone()),
        }
    }

    /// Bare and namespaced symbols both probe the scope chain first;
    /// namespaced ones fall back to the foreign-function table.
    fn lookup_in(&mut self, sym: &Symbol, env: &Rc<Environment>, origin: &Origin) -> EvalOutcome {
        if let Some(value) = env.lookup(sym) {
            return Ok(value);
        }
        if sym.has_namespace() {
            if let Some(value) = self.foreign.lookup(sym) {
                return Ok(value);
            }
        }
        Err(EvalError::new(EvalErrorKind::UnboundSymbol(sym.clone()), origin).into())
    }

    fn eval_pair(&mut self, pair: &Rc<Pair>, env: &Rc<Environment>) -> EvalOutcome {
        match self.eval_call(pair, env) {
            Err(Unwind::Error(mut err)) => {
                err.push_frame(pair);
                Err(Unwind::Error(err))
            }
            other => other,
        }
    }

    fn eval_call(&mut self, pair: &Rc<Pair>, env: &Rc<Environment>) -> EvalOutcome {
        let args = list_items(&pair.cdr);
        if let Value::Symbol(head) = &pair.car {
            if *head == self.forms.quote {
                check_form!(args.len() == 1, "quote", "takes one form", &pair.origin);
                return Ok(args[0].clone());
            }
            if *head == self.forms.quasiquote {
                check_form!(args.len() == 1, "quasiquote", "takes one form", &pair.origin);
                return self.eval_quasiquote(&args[0], env, 1, &pair.origin);
            }
            if *head == self.forms.unquote || *head == self.forms.unquote_splicing {
                check_form!(false, "unquote", "used outside quasiquote", &pair.origin);
            }
            if *head == self.forms.begin {
                return self.eval_body(&args, env);
            }
            if *head == self.forms.def {
                return self.sf_def(&args, env, &pair.origin);
            }
            if *head == self.forms.set {
                return self.sf_set(&args, env, &pair.origin);
            }
            if *head == self.forms.fn_ {
                return self.sf_closure(&args, env, false, &pair.origin);
            }
            if *head == self.forms.macro_ {
                return self.sf_closure(&args, env, true, &pair.origin);
            }
            if *head == self.forms.cond {
                return self.sf_cond(&args, env, &pair.origin);
            }
            if *head == self.forms.call_cc || *head == self.forms.call_cc_long {
                return self.sf_call_cc(&args, env, &pair.origin);
            }
            // `.method` head: host-member dispatch on the first operand.
            if !head.has_namespace() && head.name().len() > 1 && head.name().starts_with('.') {
                return self.host_dispatch(head.name(), &args, env, &pair.origin);
            }
        }

        let callee = self.eval(&pair.car, env)?;
        match &callee {
            Value::Closure(c) if c.is_macro => {
                let expansion = self.expand_macro(pair, Rc::clone(c), env)?;
                self.eval(&expansion, env)
            }
            Value::Primitive(p) => match (p.kind, p.is_macro) {
                (PrimitiveKind::Raw(f), true) => {
                    // Clone out of the cell in its own statement so the
                    // shared borrow is gone before the write below.
                    let cached = pair.expansion.borrow().clone();
                    let expansion = match cached {
                        Some(cached) => cached,
                        None => {
                            let seq = Seq::from_value(&pair.cdr).unwrap_or(Seq::Empty);
                            let expanded = f(self, env, seq, &pair.origin)?;
                            *pair.expansion.borrow_mut() = Some(expanded.clone());
                            expanded
                        }
                    };
                    self.eval(&expansion, env)
                }
                (PrimitiveKind::Raw(f), false) => {
                    let seq = Seq::from_value(&pair.cdr).unwrap_or(Seq::Empty);
                    f(self, env, seq, &pair.origin)
                }
                (PrimitiveKind::Evaluated(f), _) => {
                    let evaluated = self.eval_args(args, env)?;
                    f(self, evaluated, &pair.origin)
                }
            },
            _ => {
                let evaluated = self.eval_args(args, env)?;
                self.apply(callee, evaluated, &pair.origin)
            }
        }
    }

    fn eval_args(&mut self, forms: Vec<Value>, env: &Rc<Environment>) -> Result<Vec<Value>, Unwind> {
        let mut out = Vec::with_capacity(forms.len());
        for form in &forms {
            out.push(self.eval(form, env)?);
        }
        Ok(out)
    }

    fn eval_body(&mut self, forms: &[Value], env: &Rc<Environment>) -> EvalOutcome {
        let mut last = Value::Nil;
        for form in forms {
            last = self.eval(form, env)?;
        }
        Ok(last)
    }

    /// Apply an already-evaluated callee to already-evaluated arguments.
    pub fn apply(&mut self, callee: Value, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
        match callee {
            Value::Closure(c) if !c.is_macro => self.apply_closure(&c, args, origin),
            Value::Closure(_) => Err(EvalError::new(
                EvalErrorKind::NotCallable("a macro used as a value".to_string()),
                origin,
            )
            .into()),
            Value::Primitive(p) => match p.kind {
                PrimitiveKind::Evaluated(f) => f(self, args, origin),
                PrimitiveKind::Raw(_) => Err(EvalError::new(
                    EvalErrorKind::NotCallable(format!(
                        "operator `{}` outside call position",
                        p.full_name()
                    )),
                    origin,
                )
                .into()),
            },
            Value::Continuation(c) => {
                if !c.armed.get() {
                    return Err(
                        EvalError::new(EvalErrorKind::StaleContinuation, origin).into()
                    );
                }
                Err(Unwind::Escape {
                    token: c.token,
                    value: args.into_iter().next().unwrap_or(Value::Nil),
                })
            }
            other => Err(EvalError::new(
                EvalErrorKind::NotCallable(other.type_name().to_string()),
                origin,
            )
            .into()),
        }
    }

    fn apply_closure(&mut self, c: &Rc<Closure>, args: Vec<Value>, origin: &Origin) -> EvalOutcome {
        let frame = Environment::new_enclosed(Rc::clone(&c.env));
        self.bind_params(&c.params, args, &frame, origin)?;
        self.eval_body(&c.body, &frame)
    }

    /// Expand a macro call, consulting and filling the call site's one-shot
    /// expansion cache: the expander runs at most once per call-site node.
    fn expand_macro(
        &mut self,
        site: &Rc<Pair>,
        mac: Rc<Closure>,
        _env: &Rc<Environment>,
    ) -> EvalOutcome {
        if let Some(cached) = site.expansion.borrow().clone() {
            return Ok(cached);
        }
        let args = list_items(&site.cdr);
        let expansion = self.apply_closure(&mac, args, &site.origin)?;
        *site.expansion.borrow_mut() = Some(expansion.clone());
        Ok(expansion)
    }

    fn sf_def(&mut self, args: &[Value], env: &Rc<Environment>, origin: &Origin) -> EvalOutcome {
        check_form!(!args.is_empty(), "def", "takes a target and a body", origin);
        match &args[0] {
            Value::Symbol(sym) => {
                check_form!(args.len() == 2, "def", "takes a symbol and one form", origin);
                let value = self.eval(&args[1], env)?;
                env.define(sym, value.clone());
                Ok(value)
            }
            // (def (name . params) body...) named-closure sugar.
            Value::Pair(sig) => {
                let Value::Symbol(name) = &sig.car else {
                    return Err(EvalError::type_mismatch("a symbol", &sig.car, origin).into());
                };
                let closure = Value::Closure(Rc::new(Closure {
                    name: Some(name.clone()),
                    params: sig.cdr.clone(),
                    body: args[1..].to_vec(),
                    env: Rc::clone(env),
                    is_macro: false,
                }));
                env.define(name, closure.clone());
                Ok(closure)
            }
            other => Err(EvalError::type_mismatch("a symbol or signature", other, origin).into()),
        }
    }

    fn sf_set(&mut self, args: &[Value], env: &Rc<Environment>, origin: &Origin) -> EvalOutcome {
        check_form!(args.len() == 2, "set!", "takes a symbol and one form", origin);
        let Value::Symbol(sym) = &args[0] else {
            return Err(EvalError::type_mismatch("a symbol", &args[0], origin).into());
        };
        let value = self.eval(&args[1], env)?;
        if env.set(sym, value.clone()) {
            Ok(value)
        } else {
            Err(EvalError::new(EvalErrorKind::SetUnbound(sym.clone()), origin).into())
        }
    }

    fn sf_closure(
        &mut self,
        args: &[Value],
        env: &Rc<Environment>,
        is_macro: bool,
        origin: &Origin,
    ) -> EvalOutcome {
        let form = if is_macro { "macro" } else { "fn" };
        check_form!(!args.is_empty(), form, "takes a parameter spec and a body", origin);
        Ok(Value::Closure(Rc::new(Closure {
            name: None,
            params: args[0].clone(),
            body: args[1..].to_vec(),
            env: Rc::clone(env),
            is_macro,
        })))
    }

    fn sf_cond(&mut self, args: &[Value], env: &Rc<Environment>, origin: &Origin) -> EvalOutcome {
        for clause in args {
            let Value::Pair(cp) = clause else {
                return Err(EvalError::type_mismatch("a cond clause", clause, origin).into());
            };
            let items = list_items(clause);
            // (else body...) — matched by identity, only meaningful here.
            if let Value::Symbol(head) = &items[0] {
                if *head == self.forms.else_ {
                    return self.eval_body(&items[1..], env);
                }
            }
            let test = self.eval(&items[0], env)?;
            if !test.is_truthy() {
                continue;
            }
            // (test) yields the test value; (test => f) pipes it through f.
            return match items.as_slice() {
                [_] => Ok(test),
                [_, Value::Symbol(arrow), f] if *arrow == self.forms.arrow => {
                    let callee = self.eval(f, env)?;
                    self.apply(callee, vec![test], &cp.origin)
                }
                [_, body @ ..] => self.eval_body(body, env),
                [] => unreachable!("clause has at least a test"),
            };
        }
        Ok(Value::Nil)
    }

    fn sf_call_cc(&mut self, args: &[Value], env: &Rc<Environment>, origin: &Origin) -> EvalOutcome {
        check_form!(args.len() == 1, "call/cc", "takes one receiver", origin);
        let callee = self.eval(&args[0], env)?;
        let token = self.fresh_token();
        let cont = Rc::new(Continuation {
            token,
            armed: Cell::new(true),
        });
        let result = self.apply(callee, vec![Value::Continuation(Rc::clone(&cont))], origin);
        // Whatever happened, the establishing call is now off the stack.
        cont.armed.set(false);
        match result {
            Err(Unwind::Escape { token: t, value }) if t == token => Ok(value),
            other => other,
        }
    }

    fn host_dispatch(
        &mut self,
        head: &str,
        args: &[Value],
        env: &Rc<Environment>,
        origin: &Origin,
    ) -> EvalOutcome {
        let method = &head[1..];
        if args.is_empty() {
            return Err(EvalError::arity(head, "at least 1", 0, origin).into());
        }
        let receiver = self.eval(&args[0], env)?;
        let rest = self.eval_args(args[1..].to_vec(), env)?;
        match receiver {
            Value::Host(h) => h.invoke(method, rest).map_err(Unwind::Error),
            other => Err(EvalError::type_mismatch("a host value", &other, origin).into()),
        }
    }

    fn eval_quasiquote(
        &mut self,
        template: &Value,
        env: &Rc<Environment>,
        depth: usize,
        origin: &Origin,
    ) -> EvalOutcome {
        match template {
            Value::Pair(p) => {
                if let Some(kind) = self.qq_marker(&p.car) {
                    let items = list_items(template);
                    check_form!(items.len() == 2, "quasiquote", "marker takes one form", origin);
                    let arg = &items[1];
                    return match kind {
                        QqMarker::Unquote if depth == 1 => self.eval(arg, env),
                        QqMarker::Unquote => {
                            let inner = self.eval_quasiquote(arg, env, depth - 1, origin)?;
                            Ok(Value::list_from(
                                vec![Value::Symbol(self.forms.unquote.clone()), inner],
                                &p.origin,
                            ))
                        }
                        QqMarker::Splice if depth == 1 => Err(EvalError::new(
                            EvalErrorKind::BadSplice,
                            &p.origin,
                        )
                        .into()),
                        QqMarker::Splice => {
                            let inner = self.eval_quasiquote(arg, env, depth - 1, origin)?;
                            Ok(Value::list_from(
                                vec![Value::Symbol(self.forms.unquote_splicing.clone()), inner],
                                &p.origin,
                            ))
                        }
                        QqMarker::Nested => {
                            let inner = self.eval_quasiquote(arg, env, depth + 1, origin)?;
                            Ok(Value::list_from(
                                vec![Value::Symbol(self.forms.quasiquote.clone()), inner],
                                &p.origin,
                            ))
                        }
                    };
                }
                // Ordinary list template: walk elements, splicing at depth 1.
                let mut out = Vec::new();
                let mut cur = template;
                let tail;
                loop {
                    match cur {
                        Value::Pair(cell) => {
                            if depth == 1 {
                                if let Some(spliced) = self.qq_splice_element(&cell.car, env)? {
                                    out.extend(spliced);
                                    cur = &cell.cdr;
                                    continue;
                                }
                            }
                            if self.qq_marker(&cell.car).is_some() {
                                // Marker in tail position: `(a . ~b)`.
                                tail = self.eval_quasiquote(cur, env, depth, origin)?;
                                break;
                            }
                            out.push(self.eval_quasiquote(&cell.car, env, depth, origin)?);
                            cur = &cell.cdr;
                        }
                        Value::Nil => {
                            tail = Value::Nil;
                            break;
                        }
                        other => {
                            tail = self.eval_quasiquote(other, env, depth, origin)?;
                            break;
                        }
                    }
                }
                Ok(improper_from(out, tail, &p.origin))
            }
            Value::Vector(v) => {
                let mut out = TrieVector::builder();
                for item in v.iter() {
                    if depth == 1 {
                        if let Some(spliced) = self.qq_splice_element(item, env)? {
                            for value in spliced {
                                out = out.push(value);
                            }
                            continue;
                        }
                    }
                    out = out.push(self.eval_quasiquote(item, env, depth, origin)?);
                }
                Ok(Value::Vector(out.frozen()))
            }
            Value::Map(m) => {
                let mut out = Map::builder();
                for (k, v) in m.iter() {
                    let key = self.eval_quasiquote(k, env, depth, origin)?;
                    let value = self.eval_quasiquote(v, env, depth, origin)?;
                    out.insert(key, value);
                }
                Ok(Value::Map(out.frozen()))
            }
            other => Ok(other.clone()),
        }
    }

    fn qq_marker(&self, head: &Value) -> Option<QqMarker> {
        let sym = head.as_symbol()?;
        if *sym == self.forms.unquote {
            Some(QqMarker::Unquote)
        } else if *sym == self.forms.unquote_splicing {
            Some(QqMarker::Splice)
        } else if *sym == self.forms.quasiquote {
            Some(QqMarker::Nested)
        } else {
            None
        }
    }

    /// If `element` is `(unquote-splicing x)`, evaluate `x` and return its
    /// elements for splicing into the surrounding template.
    fn qq_splice_element(
        &mut self,
        element: &Value,
        env: &Rc<Environment>,
    ) -> Result<Option<Vec<Value>>, Unwind> {
        let Value::Pair(p) = element else {
            return Ok(None);
        };
        if !matches!(self.qq_marker(&p.car), Some(QqMarker::Splice)) {
            return Ok(None);
        }
        let items = list_items(element);
        if items.len() != 2 {
            return Err(EvalError::new(EvalErrorKind::BadSplice, &p.origin).into());
        }
        let value = self.eval(&items[1], env)?;
        match Seq::from_value(&value) {
            Some(seq) => Ok(Some(seq.collect())),
            None => Err(EvalError::new(EvalErrorKind::BadSplice, &p.origin).into()),
        }
    }
}

enum QqMarker {
    Unquote,
    Splice,
    Nested,
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn eval_ok(src: &str) -> Value {
        let mut interp = Interpreter::new();
        interp.eval_str("test", src).expect(src)
    }

    fn assert_eval(src: &str, printed: &str) {
        assert_eq!(eval_ok(src).to_string(), printed, "Input: '{}'", src);
    }

    fn assert_eval_err_kind(src: &str, expected: EvalErrorKind) {
        let mut interp = Interpreter::new();
        match interp.eval_str("test", src) {
            Ok(v) => panic!("expected error for '{}', got {}", src, v),
            Err(e) => {
                let kind = e.eval_kind().unwrap_or_else(|| {
                    panic!("expected eval error for '{}', got {}", src, e)
                });
                assert_eq!(
                    std::mem::discriminant(&kind),
                    std::mem::discriminant(&expected),
                    "Input: '{}', expected {:?}, got {:?}",
                    src,
                    expected,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_self_evaluating() {
        assert_eval("42", "42");
        assert_eval("4.5", "4.5");
        assert_eval("#t", "#t");
        assert_eval(":ready", ":ready");
        assert_eval("\"s\"", "\"s\"");
        assert_eval("#\\a", "#\\a");
    }

    #[test]
    fn test_collection_literals_evaluate_elements() {
        assert_eval("[(+ 1 2) 4]", "[3 4]");
        assert_eval("(get {:n (+ 2 3)} :n)", "5");
    }

    #[test]
    fn test_def_and_lookup() {
        assert_eval("(begin (def x 10) (+ x 5))", "15");
        assert_eval_err_kind("unknown-symbol", EvalErrorKind::UnboundSymbol(Symbol::new("x")));
    }

    #[test]
    fn test_def_closure_sugar() {
        assert_eval("(begin (def (double n) (* n 2)) (double 21))", "42");
        assert_eval(
            "(begin (def (fib n) (cond ((< n 2) n) (else (+ (fib (- n 1)) (fib (- n 2)))))) (fib 10))",
            "55",
        );
    }

    #[test]
    fn test_set_walks_parent_frames() {
        assert_eval(
            "(begin (def counter 0) (def (bump) (set! counter (+ counter 1))) (bump) (bump) counter)",
            "2",
        );
        assert_eval_err_kind("(set! nope 1)", EvalErrorKind::SetUnbound(Symbol::new("x")));
    }

    #[test]
    fn test_closures_capture_environment() {
        assert_eval(
            "(begin (def (adder n) (fn (m) (+ n m))) (def add3 (adder 3)) (add3 4))",
            "7",
        );
    }

    #[test]
    fn test_quote_and_quasiquote() {
        assert_eval("'(1 2 3)", "(1 2 3)");
        assert_eval("(begin (def x 5) `(a ~x))", "(a 5)");
        assert_eval("(begin (def xs '(2 3)) `(1 ~@xs 4))", "(1 2 3 4)");
        assert_eval("(begin (def xs '(2 3)) `[1 ~@xs])", "[1 2 3]");
        assert_eval("`(a `(b ~(c)))", "(a (quasiquote (b (unquote (c)))))");
        assert_eval_err_kind("~x", EvalErrorKind::BadSpecialForm { form: "", message: String::new() });
    }

    #[test]
    fn test_cond() {
        assert_eval("(cond (#f 1) (#t 2) (else 3))", "2");
        assert_eval("(cond (#f 1) (else 3))", "3");
        assert_eval("(cond (#f 1))", "()");
        // A bare test clause yields the test value.
        assert_eval("(cond (42))", "42");
        // Arrow clause pipes the test value into the receiver.
        assert_eval("(cond ((get {:n 6} :n) => (fn (n) (* n 7))))", "42");
    }

    #[test]
    fn test_macro_expansion() {
        assert_eval(
            "(begin
               (def unless (macro (test body) `(cond ((not ~test) ~body))))
               (unless #f 42))",
            "42",
        );
    }

    #[test]
    fn test_macro_expands_once_per_call_site() {
        // The expander bumps a counter; evaluating the same call-site node
        // repeatedly must bump it exactly once.
        assert_eval(
            "(begin
               (def expansions 0)
               (def noisy (macro (x) (set! expansions (+ expansions 1)) x))
               (def (probe) (noisy 7))
               (probe) (probe) (probe)
               expansions)",
            "1",
        );
    }

    #[test]
    fn test_call_cc_escape() {
        // The escape bypasses the enclosing (+ 1 ...) entirely.
        assert_eval("(+ 1 (call/cc (fn (k) (k 41) 99)))", "42");
        assert_eval("(call-with-current-continuation (fn (k) 5))", "5");
        // Value of call/cc when the receiver returns normally.
        assert_eval("(+ 1 (call/cc (fn (k) 10)))", "11");
    }

    #[test]
    fn test_stale_continuation() {
        assert_eval_err_kind(
            "(begin (def saved ()) (call/cc (fn (k) (set! saved k))) (saved 1))",
            EvalErrorKind::StaleContinuation,
        );
    }

    #[test]
    fn test_escape_is_not_an_error() {
        // An escape crossing a failing form must not be reported as one.
        assert_eval("(call/cc (fn (k) (k 9) (undefined-symbol)))", "9");
    }

    #[test]
    fn test_not_callable() {
        assert_eval_err_kind("(1 2 3)", EvalErrorKind::NotCallable(String::new()));
    }

    #[test]
    fn test_host_method_dispatch() {
        use crate::host::HostValue;

        struct Gauge;
        impl HostValue for Gauge {
            fn type_name(&self) -> &'static str {
                "gauge"
            }
            fn attr(&self, name: &str) -> Option<Value> {
                (name == "value").then_some(Value::Int(70))
            }
            fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
                match (name, args.as_slice()) {
                    ("scaled", [Value::Int(by)]) => Ok(Value::Int(70 * by)),
                    _ => Err(EvalError::host(format!("no method {}", name))),
                }
            }
        }

        let mut interp = Interpreter::new();
        interp
            .global_env()
            .define(&Symbol::new("cpu"), Value::Host(Rc::new(Gauge)));
        assert_eq!(
            interp.eval_str("test", "(.scaled cpu 2)").unwrap(),
            Value::Int(140)
        );
        // Attribute destructuring reaches the same object.
        assert_eq!(
            interp
                .eval_str("test", "((fn ((v \"value\")) v) cpu)")
                .unwrap(),
            Value::Int(70)
        );
        let err = interp.eval_str("test", "(.missing cpu)").unwrap_err();
        assert_eq!(
            std::mem::discriminant(&err.eval_kind().unwrap()),
            std::mem::discriminant(&EvalErrorKind::Host(String::new()))
        );
    }

    #[test]
    fn test_error_trace_accumulates_call_chain() {
        let mut interp = Interpreter::new();
        let err = interp
            .eval_str(
                "test",
                "(begin (def (inner) (boom)) (def (outer) (inner)) (outer))",
            )
            .unwrap_err();
        let trace = err.eval_trace().expect("eval error");
        // Innermost first: (boom), (inner), (outer), enclosing begin.
        assert!(trace.len() >= 3);
        assert_eq!(trace[0].form, "(boom)");
        assert_eq!(trace[1].form, "(inner)");
        assert_eq!(trace[2].form, "(outer)");
    }
}
