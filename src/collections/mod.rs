//! Persistent (immutable, structurally shared) collections used both as
//! language values and as environment frames.
//!
//! All three types share a lifecycle: instances start in *builder* mode,
//! where update operations reuse the instance's own storage, and are
//! `freeze`d before being shared, after which updates copy the touched path
//! and leave the original readable through any clone. The update methods
//! take `self` by value either way; holding onto the pre-update version is a
//! matter of cloning first, which is cheap because nodes are `Rc`-shared.

mod hamt;
mod small_map;
mod vector;

pub use hamt::Hamt;
pub use small_map::{SMALL_MAP_CAPACITY, SmallMap};
pub use vector::TrieVector;

use crate::value::Value;
use std::hash::{Hash, Hasher};

/// Hash a value to the 64 bits the HAMT consumes 4 at a time.
pub(crate) fn value_hash(value: &Value) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// The map value: a 6-slot inline map that promotes to a HAMT on the 7th
/// distinct key. Promotion is one-way and invisible through this facade;
/// `get`, `len` and iteration behave identically on either representation.
#[derive(Debug, Clone)]
pub enum Map {
    Small(SmallMap),
    Hamt(Hamt),
}

impl Map {
    /// An empty, frozen map.
    pub fn new() -> Map {
        Map::Small(SmallMap::new())
    }

    /// An empty map in builder mode.
    pub fn builder() -> Map {
        Map::Small(SmallMap::builder())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Map::Small(m) => m.get(key),
            Map::Hamt(m) => m.get(key),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Map::Small(m) => m.len(),
            Map::Hamt(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mutable(&self) -> bool {
        match self {
            Map::Small(m) => m.is_mutable(),
            Map::Hamt(m) => m.is_mutable(),
        }
    }

    pub fn assoc(self, key: Value, value: Value) -> Map {
        match self {
            Map::Small(m) => {
                if m.is_full() && m.get(&key).is_none() {
                    // 7th distinct key: promote, carrying the lifecycle mode.
                    let mut hamt = Hamt::with_mode(m.is_mutable());
                    for (k, v) in m.iter() {
                        hamt = hamt.assoc(k.clone(), v.clone());
                    }
                    Map::Hamt(hamt.assoc(key, value))
                } else {
                    Map::Small(m.assoc(key, value))
                }
            }
            Map::Hamt(m) => Map::Hamt(m.assoc(key, value)),
        }
    }

    /// Remove a key. A promoted map never demotes back to `Small`.
    pub fn dissoc(self, key: &Value) -> Map {
        match self {
            Map::Small(m) => Map::Small(m.dissoc(key)),
            Map::Hamt(m) => Map::Hamt(m.dissoc(key)),
        }
    }

    /// Leave builder mode. The only supported way to make an instance safe
    /// to share.
    pub fn freeze(&mut self) {
        match self {
            Map::Small(m) => m.freeze(),
            Map::Hamt(m) => m.freeze(),
        }
    }

    pub fn frozen(mut self) -> Map {
        self.freeze();
        self
    }

    /// Builder-mode helper for map-like owners (environment frames).
    pub fn insert(&mut self, key: Value, value: Value) {
        let taken = std::mem::replace(self, Map::new());
        *self = taken.assoc(key, value);
    }

    pub fn remove(&mut self, key: &Value) {
        let taken = std::mem::replace(self, Map::new());
        *self = taken.dissoc(key);
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (&Value, &Value)> + '_> {
        match self {
            Map::Small(m) => Box::new(m.iter()),
            Map::Hamt(m) => Box::new(m.iter()),
        }
    }
}

impl Default for Map {
    fn default() -> Self {
        Map::new()
    }
}

// Equality is structural and representation-independent: a promoted map and
// a small map holding the same entries compare equal.
impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Map {}

impl Hash for Map {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // XOR of entry hashes: commutative, so slot order and
        // representation do not matter.
        let mut acc: u64 = 0;
        for (k, v) in self.iter() {
            let mut h = std::hash::DefaultHasher::new();
            k.hash(&mut h);
            v.hash(&mut h);
            acc ^= h.finish();
        }
        self.len().hash(state);
        acc.hash(state);
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn test_promotion_at_seventh_key() {
        let mut m = Map::builder();
        for i in 0..6 {
            m.insert(int(i), int(i * 10));
        }
        assert!(matches!(m, Map::Small(_)));
        m.insert(int(6), int(60));
        assert!(matches!(m, Map::Hamt(_)));
        for i in 0..7 {
            assert_eq!(m.get(&int(i)), Some(&int(i * 10)));
        }
        assert_eq!(m.len(), 7);
    }

    #[test]
    fn test_replacing_existing_key_does_not_promote() {
        let mut m = Map::builder();
        for i in 0..6 {
            m.insert(int(i), int(i));
        }
        m.insert(int(3), int(99));
        assert!(matches!(m, Map::Small(_)));
        assert_eq!(m.get(&int(3)), Some(&int(99)));
        assert_eq!(m.len(), 6);
    }

    #[test]
    fn test_no_demotion_after_dissoc() {
        let mut m = Map::builder();
        for i in 0..8 {
            m.insert(int(i), int(i));
        }
        for i in 0..7 {
            m.remove(&int(i));
        }
        assert!(matches!(m, Map::Hamt(_)));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&int(7)), Some(&int(7)));
    }

    #[test]
    fn test_negative_zero_key_survives_promotion() {
        // 0.0 == -0.0, so a -0.0 key must stay reachable through 0.0 in
        // both representations; the hash-routed one would lose it if the
        // two zeros hashed differently.
        let mut m = Map::builder();
        m.insert(Value::Float(-0.0), Value::keyword("origin"));
        assert!(matches!(m, Map::Small(_)));
        assert_eq!(m.get(&Value::Float(0.0)), Some(&Value::keyword("origin")));
        for i in 0..8 {
            m.insert(int(i), int(i));
        }
        assert!(matches!(m, Map::Hamt(_)));
        assert_eq!(m.get(&Value::Float(0.0)), Some(&Value::keyword("origin")));
    }

    #[test]
    fn test_equality_across_representations() {
        let mut small = Map::builder();
        let mut big = Map::builder();
        for i in 0..5 {
            small.insert(int(i), int(i));
        }
        // Drive `big` through promotion, then back down to the same entries.
        for i in 0..10 {
            big.insert(int(i), int(i));
        }
        for i in 5..10 {
            big.remove(&int(i));
        }
        assert!(matches!(small, Map::Small(_)));
        assert!(matches!(big, Map::Hamt(_)));
        assert_eq!(small, big);

        let mut hs = std::hash::DefaultHasher::new();
        let mut hb = std::hash::DefaultHasher::new();
        small.hash(&mut hs);
        big.hash(&mut hb);
        assert_eq!(
            std::hash::Hasher::finish(&hs),
            std::hash::Hasher::finish(&hb)
        );
    }

    #[test]
    fn test_oracle_agreement_across_promotion() {
        // Mixed assoc/dissoc sequence checked against std HashMap at every
        // step, crossing the promotion boundary both ways in size.
        let mut m = Map::builder();
        let mut oracle: HashMap<i64, i64> = HashMap::new();
        let ops: Vec<(bool, i64)> = (0..64)
            .map(|i| {
                let key = (i * 7) % 19;
                (i % 3 != 2, key)
            })
            .collect();
        for (step, (is_insert, key)) in ops.into_iter().enumerate() {
            if is_insert {
                m.insert(int(key), int(step as i64));
                oracle.insert(key, step as i64);
            } else {
                m.remove(&int(key));
                oracle.remove(&key);
            }
            assert_eq!(m.len(), oracle.len(), "step {}", step);
            for k in 0..19 {
                assert_eq!(
                    m.get(&int(k)),
                    oracle.get(&k).map(|v| int(*v)).as_ref(),
                    "step {} key {}",
                    step,
                    k
                );
            }
        }
    }

    #[test]
    fn test_frozen_assoc_leaves_original_readable() {
        let m = {
            let mut b = Map::builder();
            for i in 0..10 {
                b.insert(int(i), int(i));
            }
            b.frozen()
        };
        let m2 = m.clone().assoc(int(3), int(333));
        assert_eq!(m.get(&int(3)), Some(&int(3)));
        assert_eq!(m2.get(&int(3)), Some(&int(333)));
        assert_eq!(m.len(), 10);
        assert_eq!(m2.len(), 10);
    }
}
