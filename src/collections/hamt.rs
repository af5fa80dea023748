use super::value_hash;
use crate::value::Value;
use std::rc::Rc;

const BITS: usize = 4;
const WIDTH: usize = 16;
const MASK: u64 = 0xF;

/// Entries per leaf bucket before it splits into a branch.
const LEAF_MAX: usize = 16;

/// Levels in a 64-bit hash consumed 4 bits at a time. A bucket at this
/// depth has exhausted the hash and holds true collisions unsplit.
const MAX_DEPTH: usize = 16;

fn slot_at(hash: u64, depth: usize) -> usize {
    ((hash >> (BITS * depth)) & MASK) as usize
}

#[derive(Debug, Clone)]
enum Node {
    /// A bucket of entries whose hashes agree on every nibble consumed so
    /// far. Entries keep their full hash so splits never rehash keys.
    Leaf(Rc<Vec<(u64, Value, Value)>>),
    Branch(Rc<[Option<Node>; WIDTH]>),
}

impl Node {
    fn empty_leaf() -> Node {
        Node::Leaf(Rc::new(Vec::new()))
    }

    fn is_empty_leaf(&self) -> bool {
        matches!(self, Node::Leaf(entries) if entries.is_empty())
    }
}

/// A hash array mapped trie: a 16-way tree indexed by successive 4-bit
/// chunks of the key's 64-bit hash. Updates copy the root-to-leaf path
/// (`Rc::make_mut`), so an update touches O(log16 n) nodes and every older
/// version stays intact behind its own root.
#[derive(Debug, Clone)]
pub struct Hamt {
    root: Node,
    len: usize,
    mutable: bool,
}

impl Hamt {
    pub fn new() -> Hamt {
        Hamt::with_mode(false)
    }

    pub fn builder() -> Hamt {
        Hamt::with_mode(true)
    }

    pub(crate) fn with_mode(mutable: bool) -> Hamt {
        Hamt {
            root: Node::empty_leaf(),
            len: 0,
            mutable,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn freeze(&mut self) {
        self.mutable = false;
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let hash = value_hash(key);
        let mut node = &self.root;
        let mut depth = 0;
        loop {
            match node {
                Node::Leaf(entries) => {
                    return entries
                        .iter()
                        .find(|(h, k, _)| *h == hash && k == key)
                        .map(|(_, _, v)| v);
                }
                Node::Branch(children) => {
                    node = children[slot_at(hash, depth)].as_ref()?;
                    depth += 1;
                }
            }
        }
    }

    pub fn assoc(mut self, key: Value, value: Value) -> Hamt {
        let hash = value_hash(&key);
        if Self::insert_node(&mut self.root, hash, 0, key, value) {
            self.len += 1;
        }
        self
    }

    /// Returns true when the key was new.
    fn insert_node(node: &mut Node, hash: u64, depth: usize, key: Value, value: Value) -> bool {
        match node {
            Node::Leaf(entries_rc) => {
                let entries = Rc::make_mut(entries_rc);
                if let Some(entry) = entries.iter_mut().find(|(h, k, _)| *h == hash && *k == key) {
                    entry.2 = value;
                    return false;
                }
                if entries.len() < LEAF_MAX || depth >= MAX_DEPTH {
                    entries.push((hash, key, value));
                    return true;
                }
                // Bucket is full and hash bits remain: redistribute its
                // entries one level down, then retry against the branch.
                let old = std::mem::take(entries);
                let mut children: [Option<Node>; WIDTH] = std::array::from_fn(|_| None);
                for (h, k, v) in old {
                    let child = children[slot_at(h, depth)].get_or_insert_with(Node::empty_leaf);
                    if let Node::Leaf(bucket) = child {
                        Rc::make_mut(bucket).push((h, k, v));
                    }
                }
                *node = Node::Branch(Rc::new(children));
                Self::insert_node(node, hash, depth, key, value)
            }
            Node::Branch(children_rc) => {
                let children = Rc::make_mut(children_rc);
                let child = children[slot_at(hash, depth)].get_or_insert_with(Node::empty_leaf);
                Self::insert_node(child, hash, depth + 1, key, value)
            }
        }
    }

    pub fn dissoc(mut self, key: &Value) -> Hamt {
        let hash = value_hash(key);
        if self.get(key).is_none() {
            return self;
        }
        Self::remove_node(&mut self.root, hash, 0, key);
        self.len -= 1;
        self
    }

    /// The caller has already established that the key is present.
    fn remove_node(node: &mut Node, hash: u64, depth: usize, key: &Value) {
        match node {
            Node::Leaf(entries_rc) => {
                let entries = Rc::make_mut(entries_rc);
                if let Some(pos) = entries.iter().position(|(h, k, _)| *h == hash && k == key) {
                    entries.swap_remove(pos);
                }
            }
            Node::Branch(children_rc) => {
                let children = Rc::make_mut(children_rc);
                let slot = slot_at(hash, depth);
                if let Some(child) = children[slot].as_mut() {
                    Self::remove_node(child, hash, depth + 1, key);
                    if child.is_empty_leaf() {
                        children[slot] = None;
                    }
                }
                // A branch whose only surviving child is a bucket collapses
                // to that bucket; chains of one-child branches unwind as the
                // recursion returns.
                let collapse = {
                    let mut live = children.iter_mut().filter(|c| c.is_some());
                    match (live.next(), live.next()) {
                        (Some(only), None) if matches!(only, Some(Node::Leaf(_))) => only.take(),
                        _ => None,
                    }
                };
                if let Some(leaf) = collapse {
                    *node = leaf;
                }
            }
        }
    }

    pub fn iter(&self) -> HamtIter<'_> {
        HamtIter {
            stack: vec![&self.root],
            leaf: [].iter(),
        }
    }
}

impl Default for Hamt {
    fn default() -> Self {
        Hamt::new()
    }
}

pub struct HamtIter<'a> {
    stack: Vec<&'a Node>,
    leaf: std::slice::Iter<'a, (u64, Value, Value)>,
}

impl<'a> Iterator for HamtIter<'a> {
    type Item = (&'a Value, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((_, k, v)) = self.leaf.next() {
                return Some((k, v));
            }
            match self.stack.pop()? {
                Node::Leaf(entries) => self.leaf = entries.iter(),
                Node::Branch(children) => {
                    self.stack.extend(children.iter().flatten());
                }
            }
        }
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
    fn test_get_after_many_inserts() {
        let mut m = Hamt::new();
        for i in 0..1000 {
            m = m.assoc(int(i), int(i * 2));
        }
        assert_eq!(m.len(), 1000);
        for i in 0..1000 {
            assert_eq!(m.get(&int(i)), Some(&int(i * 2)), "key {}", i);
        }
        assert_eq!(m.get(&int(1000)), None);
    }

    #[test]
    fn test_replace_does_not_grow() {
        let mut m = Hamt::new();
        for i in 0..100 {
            m = m.assoc(int(i), int(0));
        }
        for i in 0..100 {
            m = m.assoc(int(i), int(i));
        }
        assert_eq!(m.len(), 100);
        assert_eq!(m.get(&int(42)), Some(&int(42)));
    }

    #[test]
    fn test_dissoc_against_oracle() {
        let mut m = Hamt::new();
        let mut oracle: HashMap<i64, i64> = HashMap::new();
        for i in 0..500 {
            m = m.assoc(int(i), int(i));
            oracle.insert(i, i);
        }
        for i in (0..500).step_by(3) {
            m = m.dissoc(&int(i));
            oracle.remove(&i);
        }
        assert_eq!(m.len(), oracle.len());
        for i in 0..500 {
            assert_eq!(m.get(&int(i)), oracle.get(&i).map(|v| int(*v)).as_ref());
        }
    }

    #[test]
    fn test_dissoc_missing_is_noop() {
        let m = Hamt::new().assoc(int(1), int(1));
        let m = m.dissoc(&int(2));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_persistence_across_versions() {
        let mut base = Hamt::new();
        for i in 0..200 {
            base = base.assoc(int(i), int(i));
        }
        let updated = base.clone().assoc(int(50), int(-1)).dissoc(&int(51));
        assert_eq!(base.get(&int(50)), Some(&int(50)));
        assert_eq!(base.get(&int(51)), Some(&int(51)));
        assert_eq!(updated.get(&int(50)), Some(&int(-1)));
        assert_eq!(updated.get(&int(51)), None);
        assert_eq!(base.len(), 200);
        assert_eq!(updated.len(), 199);
    }

    #[test]
    fn test_iter_visits_every_entry_once() {
        let mut m = Hamt::new();
        for i in 0..300 {
            m = m.assoc(int(i), int(i));
        }
        let mut seen: Vec<i64> = m
            .iter()
            .map(|(k, _)| match k {
                Value::Int(n) => *n,
                _ => panic!("unexpected key"),
            })
            .collect();
        seen.sort();
        assert_eq!(seen, (0..300).collect::<Vec<i64>>());
    }

    #[test]
    fn test_drain_to_empty() {
        let mut m = Hamt::new();
        for i in 0..100 {
            m = m.assoc(int(i), int(i));
        }
        for i in 0..100 {
            m = m.dissoc(&int(i));
        }
        assert!(m.is_empty());
        assert_eq!(m.iter().count(), 0);
        // Reusable after draining.
        let m = m.assoc(int(7), int(7));
        assert_eq!(m.get(&int(7)), Some(&int(7)));
    }
}
