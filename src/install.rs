//! The bridge through which native functions become script bindings. The
//! builtin library in `primitives.rs` registers through the same bridge the
//! embedding agent uses.

use crate::env::Environment;
use crate::eval::EvalOutcome;
use crate::interp::Interpreter;
use crate::seq::Seq;
use crate::source::Origin;
use crate::value::Value;
use std::rc::Rc;

/// A primitive that receives its arguments already evaluated.
pub type EvaluatedFn = fn(&mut Interpreter, Vec<Value>, &Origin) -> EvalOutcome;

/// A primitive that receives the unevaluated argument forms and the calling
/// environment, for operator-like builtins that control their own
/// evaluation.
pub type RawFn = fn(&mut Interpreter, &Rc<Environment>, Seq, &Origin) -> EvalOutcome;

#[derive(Debug, Clone, Copy)]
pub enum PrimitiveKind {
    Evaluated(EvaluatedFn),
    Raw(RawFn),
}

/// One installable native binding.
#[derive(Debug)]
pub struct PrimitiveDef {
    pub name: &'static str,
    pub namespace: Option<&'static str>,
    /// A macro primitive is a `Raw` whose result is a form: the evaluator
    /// caches it on the call site and evaluates it in the caller's scope.
    pub is_macro: bool,
    pub kind: PrimitiveKind,
}

impl PrimitiveDef {
    pub fn evaluated(name: &'static str, f: EvaluatedFn) -> PrimitiveDef {
        PrimitiveDef {
            name,
            namespace: None,
            is_macro: false,
            kind: PrimitiveKind::Evaluated(f),
        }
    }

    pub fn raw(name: &'static str, f: RawFn) -> PrimitiveDef {
        PrimitiveDef {
            name,
            namespace: None,
            is_macro: false,
            kind: PrimitiveKind::Raw(f),
        }
    }

    pub fn raw_macro(name: &'static str, f: RawFn) -> PrimitiveDef {
        PrimitiveDef {
            is_macro: true,
            ..PrimitiveDef::raw(name, f)
        }
    }

    pub fn in_namespace(mut self, namespace: &'static str) -> PrimitiveDef {
        self.namespace = Some(namespace);
        self
    }

    /// The name scripts call this under: `ns/name` or the bare name.
    pub fn full_name(&self) -> String {
        match self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.to_string(),
        }
    }
}

/// A batch of primitives installed together. A library-level namespace
/// applies to every primitive that does not carry its own.
pub trait Library {
    fn namespace(&self) -> Option<&'static str> {
        None
    }

    fn primitives(&self) -> Vec<PrimitiveDef>;
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Interpreter, _: Vec<Value>, _: &Origin) -> EvalOutcome {
        Ok(Value::Nil)
    }

    #[test]
    fn test_full_name() {
        assert_eq!(PrimitiveDef::evaluated("poll", noop).full_name(), "poll");
        assert_eq!(
            PrimitiveDef::evaluated("poll", noop)
                .in_namespace("agent")
                .full_name(),
            "agent/poll"
        );
    }

    #[test]
    fn test_raw_macro_flag() {
        fn noop_raw(
            _: &mut Interpreter,
            _: &Rc<Environment>,
            _: Seq,
            _: &Origin,
        ) -> EvalOutcome {
            Ok(Value::Nil)
        }
        let def = PrimitiveDef::raw_macro("when", noop_raw);
        assert!(def.is_macro);
        assert!(matches!(def.kind, PrimitiveKind::Raw(_)));
    }
}
