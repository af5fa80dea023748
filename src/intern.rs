//! Interned Symbol and Keyword types.
//!
//! Symbols and keywords are interned so that two occurrences of the same
//! text share one allocation. Equality is a pointer comparison and hashing
//! hashes the pointer, which is what makes environment frames keyed by
//! symbol cheap to probe.
//!
//! Interned names are never deallocated; the registry holds strong
//! references for the life of the process. Scripts use a bounded set of
//! names in practice, so the monotonic growth is acceptable.
//!
//! The registry itself is an explicit [`Interner`] value. A process-wide
//! default instance sits behind a mutex (interning happens from whatever
//! thread is evaluating a script), but tests can construct isolated
//! interners and go through them directly. Lookup and comparison after
//! interning never touch the lock.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug)]
struct Name {
    namespace: Option<Arc<str>>,
    name: Arc<str>,
}

type InternKey = (Option<Arc<str>>, Arc<str>);

/// Registry of interned symbol and keyword names.
///
/// Symbols and keywords intern through separate tables: a symbol `foo` and
/// a keyword `:foo` are distinct values that never compare equal.
pub struct Interner {
    symbols: HashMap<InternKey, Arc<Name>>,
    keywords: HashMap<InternKey, Arc<Name>>,
    strings: HashMap<String, Arc<str>>,
}

impl Interner {
    pub fn new() -> Interner {
        Interner {
            symbols: HashMap::new(),
            keywords: HashMap::new(),
            strings: HashMap::new(),
        }
    }

    fn intern_str(&mut self, s: &str) -> Arc<str> {
        if let Some(interned) = self.strings.get(s) {
            Arc::clone(interned)
        } else {
            let interned: Arc<str> = Arc::from(s);
            self.strings.insert(s.to_string(), Arc::clone(&interned));
            interned
        }
    }

    fn intern_name(
        table: &mut HashMap<InternKey, Arc<Name>>,
        ns: Option<Arc<str>>,
        name: Arc<str>,
    ) -> Arc<Name> {
        let key = (ns.clone(), name.clone());
        if let Some(existing) = table.get(&key) {
            Arc::clone(existing)
        } else {
            let inner = Arc::new(Name {
                namespace: ns,
                name,
            });
            table.insert(key, Arc::clone(&inner));
            inner
        }
    }

    pub fn symbol(&mut self, namespace: Option<&str>, name: &str) -> Symbol {
        let ns = namespace.map(|s| self.intern_str(s));
        let n = self.intern_str(name);
        Symbol(Self::intern_name(&mut self.symbols, ns, n))
    }

    pub fn keyword(&mut self, namespace: Option<&str>, name: &str) -> Keyword {
        let ns = namespace.map(|s| self.intern_str(s));
        let n = self.intern_str(name);
        Keyword(Self::intern_name(&mut self.keywords, ns, n))
    }
}

impl Default for Interner {
    fn default() -> Self {
        Interner::new()
    }
}

static GLOBAL: OnceLock<Mutex<Interner>> = OnceLock::new();

fn global() -> &'static Mutex<Interner> {
    GLOBAL.get_or_init(|| Mutex::new(Interner::new()))
}

/// An interned identifier with an optional namespace, compared by identity.
#[derive(Clone)]
pub struct Symbol(Arc<Name>);

impl Symbol {
    /// Intern a symbol with no namespace in the process-wide registry.
    pub fn new(name: &str) -> Symbol {
        global()
            .lock()
            .expect("interner mutex poisoned")
            .symbol(None, name)
    }

    pub fn namespaced(namespace: &str, name: &str) -> Symbol {
        global()
            .lock()
            .expect("interner mutex poisoned")
            .symbol(Some(namespace), name)
    }

    /// Parse `"foo"` or `"ns/foo"`. A lone `/` is the division symbol.
    pub fn parse(text: &str) -> Symbol {
        match text.find('/') {
            Some(pos) if text != "/" => Symbol::namespaced(&text[..pos], &text[pos + 1..]),
            _ => Symbol::new(text),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn has_namespace(&self) -> bool {
        self.0.namespace.is_some()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.0.name),
            None => write!(f, "{}", self.0.name),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        // Interning makes pointer comparison sufficient
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

/// A self-evaluating interned identifier, printed with a leading colon.
#[derive(Clone)]
pub struct Keyword(Arc<Name>);

impl Keyword {
    pub fn new(name: &str) -> Keyword {
        global()
            .lock()
            .expect("interner mutex poisoned")
            .keyword(None, name)
    }

    pub fn namespaced(namespace: &str, name: &str) -> Keyword {
        global()
            .lock()
            .expect("interner mutex poisoned")
            .keyword(Some(namespace), name)
    }

    /// Parse the text after the colon: `"foo"` or `"ns/foo"`.
    pub fn parse(text: &str) -> Keyword {
        match text.find('/') {
            Some(pos) if text != "/" => Keyword::namespaced(&text[..pos], &text[pos + 1..]),
            _ => Keyword::new(text),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.namespace {
            Some(ns) => write!(f, ":{}/{}", ns, self.0.name),
            None => write!(f, ":{}", self.0.name),
        }
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyword({})", self)
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Keyword {}

impl Hash for Keyword {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_interning_identity() {
        let a = Symbol::new("trace-depth");
        let b = Symbol::new("trace-depth");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_symbol_namespace_split() {
        let sym = Symbol::parse("agent/install");
        assert_eq!(sym.namespace(), Some("agent"));
        assert_eq!(sym.name(), "install");
        assert_eq!(sym.to_string(), "agent/install");
    }

    #[test]
    fn test_division_symbol_is_not_namespaced() {
        let sym = Symbol::parse("/");
        assert!(sym.namespace().is_none());
        assert_eq!(sym.name(), "/");
    }

    #[test]
    fn test_symbol_and_keyword_are_distinct() {
        let sym = Symbol::new("enabled");
        let kw = Keyword::new("enabled");
        assert_eq!(sym.name(), kw.name());
        // Different types; also different intern tables, so the backing
        // pointers differ even for identical text.
        assert!(!Arc::ptr_eq(&sym.0, &kw.0));
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(Keyword::new("timeout").to_string(), ":timeout");
        assert_eq!(Keyword::namespaced("jmx", "bean").to_string(), ":jmx/bean");
    }

    #[test]
    fn test_isolated_interner() {
        let mut reg = Interner::new();
        let a = reg.symbol(None, "x");
        let b = reg.symbol(None, "x");
        assert_eq!(a, b);
        // A private interner never aliases the global one.
        let c = Symbol::new("x");
        assert!(!Arc::ptr_eq(&a.0, &c.0));
    }

    #[test]
    fn test_hash_follows_identity() {
        use std::collections::HashMap;
        let mut m = HashMap::new();
        m.insert(Symbol::new("hits"), 1);
        assert_eq!(m.get(&Symbol::new("hits")), Some(&1));
        assert_eq!(m.get(&Symbol::new("misses")), None);
    }
}
