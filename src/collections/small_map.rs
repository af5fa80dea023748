use crate::value::Value;

/// Maximum number of entries before the facade promotes to a HAMT.
pub const SMALL_MAP_CAPACITY: usize = 6;

/// A map of at most six entries stored inline as an array of key/value
/// slots, probed linearly. Small literal maps (the common case for script
/// config tables) never pay for hashing or tree nodes.
///
/// Entries stay packed in the first `len` slots and keep their insertion
/// order, so iteration order is deterministic.
///
/// The slot array lives behind a `Box`: `Value::Map` holds maps by value,
/// so inline slots would make `Value` a recursive type of infinite size.
#[derive(Debug, Clone)]
pub struct SmallMap {
    entries: Box<[Option<(Value, Value)>; SMALL_MAP_CAPACITY]>,
    len: usize,
    mutable: bool,
}

impl SmallMap {
    pub fn new() -> SmallMap {
        SmallMap {
            entries: Box::new(std::array::from_fn(|_| None)),
            len: 0,
            mutable: false,
        }
    }

    pub fn builder() -> SmallMap {
        SmallMap {
            mutable: true,
            ..SmallMap::new()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == SMALL_MAP_CAPACITY
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn freeze(&mut self) {
        self.mutable = false;
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries[..self.len]
            .iter()
            .position(|slot| matches!(slot, Some((k, _)) if k == key))
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let pos = self.position(key)?;
        self.entries[pos].as_ref().map(|(_, v)| v)
    }

    /// Insert or replace. The caller (the `Map` facade) guarantees there is
    /// room: it promotes before associng a seventh distinct key.
    pub fn assoc(mut self, key: Value, value: Value) -> SmallMap {
        match self.position(&key) {
            Some(pos) => self.entries[pos] = Some((key, value)),
            None if self.len < SMALL_MAP_CAPACITY => {
                self.entries[self.len] = Some((key, value));
                self.len += 1;
            }
            None => {}
        }
        self
    }

    pub fn dissoc(mut self, key: &Value) -> SmallMap {
        if let Some(pos) = self.position(key) {
            // Shift the tail down to keep the slots packed.
            for i in pos..self.len - 1 {
                self.entries[i] = self.entries[i + 1].take();
            }
            self.entries[self.len - 1] = None;
            self.len -= 1;
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries[..self.len]
            .iter()
            .filter_map(|slot| slot.as_ref())
            .map(|(k, v)| (k, v))
    }
}

impl Default for SmallMap {
    fn default() -> Self {
        SmallMap::new()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn test_assoc_and_get() {
        let m = SmallMap::new()
            .assoc(Value::keyword("host"), Value::str("db-1"))
            .assoc(Value::keyword("port"), int(5432));
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&Value::keyword("port")), Some(&int(5432)));
        assert_eq!(m.get(&Value::keyword("user")), None);
    }

    #[test]
    fn test_replace_keeps_len_and_order() {
        let m = SmallMap::new()
            .assoc(int(1), int(10))
            .assoc(int(2), int(20))
            .assoc(int(1), int(11));
        assert_eq!(m.len(), 2);
        let keys: Vec<&Value> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&int(1), &int(2)]);
        assert_eq!(m.get(&int(1)), Some(&int(11)));
    }

    #[test]
    fn test_dissoc_packs_slots() {
        let mut m = SmallMap::new();
        for i in 0..5 {
            m = m.assoc(int(i), int(i));
        }
        m = m.dissoc(&int(2));
        assert_eq!(m.len(), 4);
        assert_eq!(m.get(&int(2)), None);
        let keys: Vec<&Value> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&int(0), &int(1), &int(3), &int(4)]);
        // Removing a missing key is a no-op.
        assert_eq!(m.dissoc(&int(99)).len(), 4);
    }

    #[test]
    fn test_full_at_capacity() {
        let mut m = SmallMap::new();
        for i in 0..SMALL_MAP_CAPACITY as i64 {
            m = m.assoc(int(i), int(i));
        }
        assert!(m.is_full());
    }
}
