use crate::value::Value;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const BITS: u32 = 4;
const WIDTH: usize = 16;
const MASK: usize = 0xF;

#[derive(Debug, Clone)]
enum Node {
    Leaf(Rc<[Option<Value>; WIDTH]>),
    Branch(Rc<[Option<Node>; WIDTH]>),
}

impl Node {
    fn empty_leaf() -> Node {
        Node::Leaf(Rc::new(std::array::from_fn(|_| None)))
    }

    fn empty(shift: u32) -> Node {
        if shift == 0 {
            Node::empty_leaf()
        } else {
            Node::Branch(Rc::new(std::array::from_fn(|_| None)))
        }
    }
}

/// A bit-partitioned vector trie: a 16-way tree indexed by successive 4-bit
/// chunks of the element index, most significant chunk at the root.
///
/// Rather than tracking only a length, the vector tracks a live window
/// `[idx0, idx1)` over the tree's index space. Appends write at `idx1`,
/// prepends write below `idx0`, and `sub_vec` narrows the window without
/// touching any node. When an edge of the window hits the tree's capacity a
/// new root level is added (on the left this shifts the whole window up by
/// the old capacity). Updates copy the root-to-leaf path with
/// `Rc::make_mut`, so older versions stay readable.
#[derive(Debug, Clone)]
pub struct TrieVector {
    root: Node,
    /// Bits of index consumed below the root; the tree holds
    /// `1 << (shift + 4)` slots.
    shift: u32,
    idx0: usize,
    idx1: usize,
    mutable: bool,
}

impl TrieVector {
    pub fn new() -> TrieVector {
        TrieVector {
            root: Node::empty_leaf(),
            shift: 0,
            idx0: 0,
            idx1: 0,
            mutable: false,
        }
    }

    pub fn builder() -> TrieVector {
        TrieVector {
            mutable: true,
            ..TrieVector::new()
        }
    }

    pub fn len(&self) -> usize {
        self.idx1 - self.idx0
    }

    pub fn is_empty(&self) -> bool {
        self.idx0 == self.idx1
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn freeze(&mut self) {
        self.mutable = false;
    }

    pub fn frozen(mut self) -> TrieVector {
        self.freeze();
        self
    }

    fn capacity(&self) -> usize {
        1usize << (self.shift + BITS)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        if index >= self.len() {
            return None;
        }
        let i = self.idx0 + index;
        let mut node = &self.root;
        let mut shift = self.shift;
        loop {
            match node {
                Node::Leaf(slots) => return slots[i & MASK].as_ref(),
                Node::Branch(children) => {
                    node = children[(i >> shift) & MASK].as_ref()?;
                    shift -= BITS;
                }
            }
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&Value> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    fn set_in(node: &mut Node, shift: u32, i: usize, value: Value) {
        match node {
            Node::Leaf(slots) => {
                Rc::make_mut(slots)[i & MASK] = Some(value);
            }
            Node::Branch(children_rc) => {
                let children = Rc::make_mut(children_rc);
                let child =
                    children[(i >> shift) & MASK].get_or_insert_with(|| Node::empty(shift - BITS));
                Self::set_in(child, shift - BITS, i, value);
            }
        }
    }

    /// Append on the right.
    pub fn push(mut self, value: Value) -> TrieVector {
        if self.idx1 == self.capacity() {
            self.grow_right();
        }
        let (i, shift) = (self.idx1, self.shift);
        Self::set_in(&mut self.root, shift, i, value);
        self.idx1 += 1;
        self
    }

    /// Prepend on the left.
    pub fn cons(mut self, value: Value) -> TrieVector {
        if self.idx0 == 0 {
            self.grow_left();
        }
        self.idx0 -= 1;
        let (i, shift) = (self.idx0, self.shift);
        Self::set_in(&mut self.root, shift, i, value);
        self
    }

    fn grow_right(&mut self) {
        // New root one level up with the old tree as its leftmost child;
        // existing indices keep their meaning.
        let old = std::mem::replace(&mut self.root, Node::empty_leaf());
        let mut children: [Option<Node>; WIDTH] = std::array::from_fn(|_| None);
        children[0] = Some(old);
        self.root = Node::Branch(Rc::new(children));
        self.shift += BITS;
    }

    fn grow_left(&mut self) {
        // Prefer sliding the root's occupied slots up by one when the top
        // slot is free: same depth, window moves by one root stride. Only a
        // root whose top slot is live forces a new level, with the old tree
        // in slot 1 so slot 0 opens up below the window.
        let offset;
        match &mut self.root {
            Node::Leaf(slots_rc) if slots_rc[WIDTH - 1].is_none() => {
                let slots = Rc::make_mut(slots_rc);
                for j in (0..WIDTH - 1).rev() {
                    slots[j + 1] = slots[j].take();
                }
                offset = 1;
            }
            Node::Branch(children_rc) if children_rc[WIDTH - 1].is_none() => {
                let children = Rc::make_mut(children_rc);
                for j in (0..WIDTH - 1).rev() {
                    children[j + 1] = children[j].take();
                }
                offset = 1usize << self.shift;
            }
            root => {
                offset = 1usize << (self.shift + BITS);
                let old = std::mem::replace(root, Node::empty_leaf());
                let mut children: [Option<Node>; WIDTH] = std::array::from_fn(|_| None);
                children[1] = Some(old);
                *root = Node::Branch(Rc::new(children));
                self.shift += BITS;
            }
        }
        self.idx0 += offset;
        self.idx1 += offset;
    }

    /// Replace the element at `index`. `None` when out of bounds.
    pub fn update(mut self, index: usize, value: Value) -> Option<TrieVector> {
        if index >= self.len() {
            return None;
        }
        let (i, shift) = (self.idx0 + index, self.shift);
        Self::set_in(&mut self.root, shift, i, value);
        Some(self)
    }

    /// The `[start, end)` window as a vector sharing every node with this
    /// one. O(1): only the window bounds change.
    pub fn sub_vec(&self, start: usize, end: usize) -> Option<TrieVector> {
        if start > end || end > self.len() {
            return None;
        }
        let mut out = self.clone();
        out.idx1 = self.idx0 + end;
        out.idx0 = self.idx0 + start;
        out.mutable = false;
        Some(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl Default for TrieVector {
    fn default() -> Self {
        TrieVector::new()
    }
}

impl FromIterator<Value> for TrieVector {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let mut v = TrieVector::builder();
        for item in iter {
            v = v.push(item);
        }
        v.frozen()
    }
}

// Windows over different trees compare by contents.
impl PartialEq for TrieVector {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for TrieVector {}

impl Hash for TrieVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for item in self.iter() {
            item.hash(state);
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn pushed(n: i64) -> TrieVector {
        (0..n).map(int).collect()
    }

    #[test]
    fn test_push_then_get_across_sizes() {
        for n in [0i64, 1, 32, 256, 4096, 65536] {
            let v = pushed(n);
            assert_eq!(v.len(), n as usize);
            for i in 0..n {
                assert_eq!(v.get(i as usize), Some(&int(i)), "n={} i={}", n, i);
            }
            assert_eq!(v.get(n as usize), None);
        }
    }

    #[test]
    fn test_cons_then_get_across_sizes() {
        for n in [0i64, 1, 32, 256, 4096, 65536] {
            let mut v = TrieVector::builder();
            // Prepending n-1, ..., 0 yields the same order as pushing.
            for i in (0..n).rev() {
                v = v.cons(int(i));
            }
            assert_eq!(v.len(), n as usize);
            for i in 0..n {
                assert_eq!(v.get(i as usize), Some(&int(i)), "n={} i={}", n, i);
            }
        }
    }

    #[test]
    fn test_mixed_ends() {
        let mut v = TrieVector::builder();
        for i in 0..100 {
            v = v.push(int(i)).cons(int(-i - 1));
        }
        assert_eq!(v.len(), 200);
        for (pos, expected) in (-100..100).enumerate() {
            assert_eq!(v.get(pos), Some(&int(expected)));
        }
        assert_eq!(v.first(), Some(&int(-100)));
        assert_eq!(v.last(), Some(&int(99)));
    }

    #[test]
    fn test_update_persistence() {
        let base = pushed(1000);
        let updated = base.clone().update(500, int(-1)).unwrap();
        assert_eq!(base.get(500), Some(&int(500)));
        assert_eq!(updated.get(500), Some(&int(-1)));
        assert_eq!(updated.get(499), Some(&int(499)));
        assert!(base.clone().update(1000, int(0)).is_none());
    }

    #[test]
    fn test_sub_vec_window() {
        let v = pushed(100);
        let w = v.sub_vec(10, 20).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w.get(0), Some(&int(10)));
        assert_eq!(w.get(9), Some(&int(19)));
        assert_eq!(w.get(10), None);
        // Windows narrow further and support growth at either end.
        let w2 = w.sub_vec(2, 5).unwrap();
        assert_eq!(w2.iter().cloned().collect::<Vec<_>>(), vec![int(12), int(13), int(14)]);
        let grown = w2.push(int(77)).cons(int(-77));
        assert_eq!(grown.first(), Some(&int(-77)));
        assert_eq!(grown.last(), Some(&int(77)));
        assert_eq!(grown.len(), 5);
        assert!(v.sub_vec(5, 3).is_none());
        assert!(v.sub_vec(0, 101).is_none());
    }

    #[test]
    fn test_equality_by_contents() {
        let a = pushed(50);
        let mut b = TrieVector::builder();
        for i in (0..50).rev() {
            b = b.cons(int(i));
        }
        assert_eq!(a, b);
        assert_ne!(a, pushed(49));
        // A window equals an independently built vector with the same
        // contents.
        let w = a.sub_vec(10, 13).unwrap();
        let c: TrieVector = (10..13).map(int).collect();
        assert_eq!(w, c);
    }

    #[test]
    fn test_iteration_order() {
        let v = pushed(300);
        let collected: Vec<Value> = v.iter().cloned().collect();
        assert_eq!(collected.len(), 300);
        assert_eq!(collected[0], int(0));
        assert_eq!(collected[299], int(299));
    }
}
