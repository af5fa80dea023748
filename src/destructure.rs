//! Binding a closure's parameter spec against its arguments.
//!
//! Beyond positional symbols and a dotted rest, the pattern grammar supports
//! keyed patterns that pull fields out of the call's *input* — the single
//! argument when there is exactly one, otherwise the whole argument list:
//!
//! - `(sym :kw)` / `(sym "attr")` binds `sym` to that key of the input,
//! - `(:as sym)` binds the input itself,
//! - `(:keys a b c)` binds each symbol from the same-named keyword,
//! - `(:or k1 v1 ...)` supplies defaults for keys still unbound afterwards.
//!
//! Keyed patterns that find nothing and have no default bind `nil`; a
//! positional parameter with no argument and no default is an error.
//! Surplus positional arguments are ignored.

use crate::env::Environment;
use crate::eval::{EvalError, EvalErrorKind, Unwind};
use crate::intern::{Keyword, Symbol};
use crate::interp::Interpreter;
use crate::source::Origin;
use crate::value::Value;
use std::rc::Rc;

fn binding_error(message: impl Into<String>, origin: &Origin) -> Unwind {
    EvalError::new(EvalErrorKind::Binding(message.into()), origin).into()
}

struct Binder {
    input: Value,
    pos: usize,
    /// Keyed lookups that found nothing; default to `nil` after `:or`.
    pending_keyed: Vec<Symbol>,
    /// Positional params with no argument; an error unless `:or` covers them.
    pending_positional: Vec<Symbol>,
    defaults: Vec<(Symbol, Value)>,
}

impl Interpreter {
    pub(crate) fn bind_params(
        &mut self,
        params: &Value,
        args: Vec<Value>,
        frame: &Rc<Environment>,
        origin: &Origin,
    ) -> Result<(), Unwind> {
        match params {
            // A bare symbol takes the whole argument list.
            Value::Symbol(sym) => {
                frame.define(sym, Value::list_from(args, origin));
                Ok(())
            }
            Value::Nil => Ok(()),
            Value::Pair(_) => self.bind_pattern_list(params, args, frame, origin),
            other => Err(binding_error(
                format!("invalid parameter spec: {}", other),
                origin,
            )),
        }
    }

    fn bind_pattern_list(
        &mut self,
        params: &Value,
        args: Vec<Value>,
        frame: &Rc<Environment>,
        origin: &Origin,
    ) -> Result<(), Unwind> {
        let input = match args.as_slice() {
            [only] => only.clone(),
            _ => Value::list_from(args.clone(), origin),
        };
        let mut binder = Binder {
            input,
            pos: 0,
            pending_keyed: Vec::new(),
            pending_positional: Vec::new(),
            defaults: Vec::new(),
        };

        let mut cur = params;
        loop {
            match cur {
                Value::Pair(p) => {
                    self.bind_one(&p.car, &args, &mut binder, frame, origin)?;
                    cur = &p.cdr;
                }
                Value::Nil => break,
                // Dotted tail: the rest of the arguments as a list.
                Value::Symbol(rest) => {
                    let from = binder.pos.min(args.len());
                    frame.define(rest, Value::list_from(args[from..].to_vec(), origin));
                    break;
                }
                other => {
                    return Err(binding_error(
                        format!("parameter list must end in a symbol or (), found {}", other),
                        origin,
                    ));
                }
            }
        }

        for (sym, default_form) in std::mem::take(&mut binder.defaults) {
            let was_pending = binder.pending_keyed.iter().any(|s| *s == sym)
                || binder.pending_positional.iter().any(|s| *s == sym);
            if was_pending {
                let value = self.eval(&default_form, frame)?;
                frame.define(&sym, value);
                binder.pending_keyed.retain(|s| *s != sym);
                binder.pending_positional.retain(|s| *s != sym);
            }
        }
        if let Some(sym) = binder.pending_positional.first() {
            return Err(binding_error(
                format!("missing argument for parameter `{}`", sym),
                origin,
            ));
        }
        for sym in binder.pending_keyed {
            frame.define(&sym, Value::Nil);
        }
        Ok(())
    }

    fn bind_one(
        &mut self,
        pattern: &Value,
        args: &[Value],
        binder: &mut Binder,
        frame: &Rc<Environment>,
        origin: &Origin,
    ) -> Result<(), Unwind> {
        match pattern {
            Value::Symbol(sym) => {
                match args.get(binder.pos) {
                    Some(arg) => frame.define(sym, arg.clone()),
                    None => binder.pending_positional.push(sym.clone()),
                }
                binder.pos += 1;
                Ok(())
            }
            Value::Pair(_) => {
                let items: Vec<Value> = crate::eval::list_items(pattern);
                match items.first() {
                    Some(Value::Keyword(kw)) if kw.name() == "as" && kw.namespace().is_none() => {
                        match items.get(1) {
                            Some(Value::Symbol(sym)) if items.len() == 2 => {
                                frame.define(sym, binder.input.clone());
                                Ok(())
                            }
                            _ => Err(binding_error("(:as ...) takes one symbol", origin)),
                        }
                    }
                    Some(Value::Keyword(kw)) if kw.name() == "keys" && kw.namespace().is_none() => {
                        for item in &items[1..] {
                            let Value::Symbol(sym) = item else {
                                return Err(binding_error(
                                    "(:keys ...) takes only symbols",
                                    origin,
                                ));
                            };
                            let key = Value::Keyword(Keyword::new(sym.name()));
                            match self.input_get(&binder.input, &key, sym.name(), origin)? {
                                Some(value) => frame.define(sym, value),
                                None => binder.pending_keyed.push(sym.clone()),
                            }
                        }
                        Ok(())
                    }
                    Some(Value::Keyword(kw)) if kw.name() == "or" && kw.namespace().is_none() => {
                        let rest = &items[1..];
                        if rest.len() % 2 != 0 {
                            return Err(binding_error(
                                "(:or ...) takes symbol/default pairs",
                                origin,
                            ));
                        }
                        for chunk in rest.chunks(2) {
                            let Value::Symbol(sym) = &chunk[0] else {
                                return Err(binding_error(
                                    "(:or ...) keys must be symbols",
                                    origin,
                                ));
                            };
                            binder.defaults.push((sym.clone(), chunk[1].clone()));
                        }
                        Ok(())
                    }
                    Some(Value::Symbol(sym)) if items.len() == 2 => {
                        let (key, name) = match &items[1] {
                            Value::Keyword(kw) => {
                                (Value::Keyword(kw.clone()), kw.name().to_string())
                            }
                            Value::Str(s) => (Value::Str(Rc::clone(s)), s.to_string()),
                            other => {
                                return Err(binding_error(
                                    format!("expected a keyword or string key, found {}", other),
                                    origin,
                                ));
                            }
                        };
                        match self.input_get(&binder.input, &key, &name, origin)? {
                            Some(value) => frame.define(sym, value),
                            None => binder.pending_keyed.push(sym.clone()),
                        }
                        Ok(())
                    }
                    _ => Err(binding_error(
                        format!("unrecognized binding pattern: {}", pattern),
                        origin,
                    )),
                }
            }
            other => Err(binding_error(
                format!("invalid parameter: {}", other),
                origin,
            )),
        }
    }

    /// Keyed lookup on the destructuring input: map by key, host by attr.
    fn input_get(
        &mut self,
        input: &Value,
        key: &Value,
        name: &str,
        origin: &Origin,
    ) -> Result<Option<Value>, Unwind> {
        match input {
            Value::Map(m) => Ok(m.get(key).cloned()),
            Value::Host(h) => Ok(h.attr(name)),
            other => Err(binding_error(
                format!("cannot destructure a {} by key", other.type_name()),
                origin,
            )),
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    fn eval_ok(src: &str) -> Value {
        let mut interp = Interpreter::new();
        interp.eval_str("test", src).expect(src)
    }

    fn eval_err(src: &str) {
        let mut interp = Interpreter::new();
        assert!(interp.eval_str("test", src).is_err(), "expected error: {}", src);
    }

    #[test]
    fn test_positional_binding() {
        assert_eq!(eval_ok("((fn (a b) (+ a b)) 2 3)"), Value::Int(5));
    }

    #[test]
    fn test_bare_symbol_takes_all_args() {
        assert_eq!(eval_ok("((fn args (len args)) 1 2 3)"), Value::Int(3));
    }

    #[test]
    fn test_dotted_rest() {
        assert_eq!(eval_ok("((fn (a . rest) (len rest)) 1 2 3 4)"), Value::Int(3));
        assert_eq!(eval_ok("((fn (a . rest) rest) 1)"), Value::Nil);
    }

    #[test]
    fn test_keys_pattern() {
        // The map-destructuring probe from the original runtime's test deck.
        assert_eq!(
            eval_ok("((fn ((:keys a b)) (+ a b)) {:a 2 :b 3})"),
            Value::Int(5)
        );
    }

    #[test]
    fn test_keyword_and_string_field_patterns() {
        assert_eq!(
            eval_ok("((fn ((host :host) (port \"port\")) port) {:host \"db\" \"port\" 5432})"),
            Value::Int(5432)
        );
    }

    #[test]
    fn test_as_binds_whole_input() {
        assert_eq!(
            eval_ok("((fn ((:keys a) (:as m)) (get m :b)) {:a 1 :b 9})"),
            Value::Int(9)
        );
    }

    #[test]
    fn test_or_defaults() {
        assert_eq!(
            eval_ok("((fn ((:keys a b) (:or b 10)) (+ a b)) {:a 1})"),
            Value::Int(11)
        );
        // A present key ignores its default.
        assert_eq!(
            eval_ok("((fn ((:keys a b) (:or b 10)) (+ a b)) {:a 1 :b 2})"),
            Value::Int(3)
        );
        // Missing keys without defaults bind nil.
        assert_eq!(eval_ok("((fn ((:keys absent)) absent) {:a 1})"), Value::Nil);
    }

    #[test]
    fn test_or_covers_missing_positional() {
        assert_eq!(eval_ok("((fn (a b (:or b 7)) (+ a b)) 1)"), Value::Int(8));
    }

    #[test]
    fn test_multi_arg_input_is_the_arg_list() {
        assert_eq!(
            eval_ok("((fn (a b (:as all)) (len all)) 1 2)"),
            Value::Int(2)
        );
    }

    #[test]
    fn test_mismatches_are_errors() {
        eval_err("((fn (a b) a) 1)");
        eval_err("((fn ((:keys a)) a) 42)");
        eval_err("((fn ((:or a)) a) 1)");
    }

    #[test]
    fn test_reader_roundtrip_of_patterns() {
        // Patterns are ordinary data until apply time.
        let form = read_str("test", "(fn ((:keys a b) (:or b 1)) a)").unwrap();
        assert_eq!(form.to_string(), "(fn ((:keys a b) (:or b 1)) a)");
    }
}
