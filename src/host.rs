use crate::eval::EvalError;
use crate::intern::Symbol;
use crate::value::Value;
use std::collections::HashMap;

/// Capability surface a host object exposes to scripts. The embedding agent
/// implements this per exported type; scripts reach it through destructuring
/// attribute patterns and `.method` call forms. Nothing outside this trait
/// is reachable from a script.
pub trait HostValue {
    fn type_name(&self) -> &'static str;

    /// Named attribute read, used by `(sym "attr")` destructuring patterns.
    fn attr(&self, name: &str) -> Option<Value>;

    /// Named method call, used by `(.name receiver args...)` forms.
    fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, EvalError>;
}

/// Ahead-of-time registry of host functions, keyed by namespace then name.
/// Symbol lookup falls back here when a namespaced symbol is bound in no
/// environment frame.
#[derive(Default)]
pub struct ForeignTable {
    namespaces: HashMap<String, HashMap<String, Value>>,
}

impl ForeignTable {
    pub fn new() -> ForeignTable {
        ForeignTable::default()
    }

    /// Last write wins.
    pub fn register(&mut self, namespace: &str, name: &str, value: Value) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn lookup(&self, symbol: &Symbol) -> Option<Value> {
        let ns = symbol.namespace()?;
        self.namespaces.get(ns)?.get(symbol.name()).cloned()
    }
}
