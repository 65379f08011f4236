//! # Ordered Range Index
//!
//! A from-scratch B-tree mapping keys to values, generic over both, used as
//! the backing structure of every range-indexed column (key = column value,
//! value = set of rows holding it).
//!
//! ## Structure
//!
//! All nodes live in an arena indexed by `NodeId`; the root id is the only
//! entry point. Leaves hold up to `degree` entries, internal nodes up to
//! `degree` children. Exceeding the bound splits the node: a new right
//! sibling takes the upper `degree / 2` entries and is handed to the parent.
//! A split propagating out of the root creates a new two-child root, the
//! only operation that increases tree height.
//!
//! ## Deletion
//!
//! Deletion is deliberately relaxed: a node that empties is unlinked, and
//! after any size change the parent opportunistically merges the affected
//! child with an adjacent sibling when their combined size fits in one node.
//! There is no minimum-occupancy invariant and no borrowing from siblings.
//! A root left with a single child is replaced by it, decreasing height.
//!
//! ## Recursion Protocol
//!
//! Insert and remove recurse to a leaf and report structural effects upward
//! as algebraic outcomes (`InsertOutcome`, `Removal`) instead of exceptions:
//! splits carry the new sibling, minimum-key changes carry the new minimum
//! so each ancestor can refresh its cached primary key, and the propagation
//! naturally stops at the first ancestor whose own minimum did not change.
//!
//! ## Range Scans
//!
//! `collect` narrows to the leaf containing the lower bound, then walks
//! right with an explicit stack (no recursion, deep trees cannot blow the
//! call stack), pruning any subtree whose cached minimum exceeds the upper
//! bound. Only the closed interval mode is supported; the other declared
//! modes fail explicitly.

use crate::config::{MAX_TREE_DEPTH, MIN_BTREE_DEGREE};
use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use super::node::{Node, NodeId};

/// Interval shape for `BTree::collect`.
///
/// Only `Closed` is supported; the remaining shapes are declared for the
/// callers that will eventually need them and fail explicitly until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// `[low, high]`
    Closed,
    /// `[low, high)`
    HalfOpen,
    /// `(low, high)`
    Open,
    /// every key
    Unbounded,
}

enum InsertOutcome<K> {
    Unchanged,
    /// This node's minimum changed; the parent must refresh its cache.
    MinChanged(K),
    /// This node split; `min` is the new right sibling's minimum. When the
    /// insert also changed this node's own minimum, `self_min` carries it.
    Split {
        id: NodeId,
        min: K,
        self_min: Option<K>,
    },
}

enum Removal<K, V> {
    NotFound,
    Removed {
        value: V,
        /// New minimum of this node, when it changed and the node survives.
        new_min: Option<K>,
        emptied: bool,
    },
}

#[derive(Debug)]
pub struct BTree<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
    root: NodeId,
    degree: usize,
    len: usize,
}

impl<K: Ord + Clone, V> BTree<K, V> {
    /// Creates an empty tree with the given branching factor.
    pub fn new(degree: usize) -> Result<Self> {
        ensure!(
            degree >= MIN_BTREE_DEGREE,
            "degree {} below minimum {}",
            degree,
            MIN_BTREE_DEGREE
        );
        let mut tree = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: 0,
            degree,
            len: 0,
        };
        tree.root = tree.alloc(Node::Leaf {
            keys: Vec::new(),
            vals: Vec::new(),
        });
        Ok(tree)
    }

    /// Number of keys in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                (self.nodes.len() - 1) as NodeId
            }
        }
    }

    fn free_node(&mut self, id: NodeId) -> Node<K, V> {
        let node = self.nodes[id as usize].take().expect("freeing a dangling node id");
        self.free.push(id);
        node
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.nodes[id as usize].as_ref().expect("dangling node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.nodes[id as usize].as_mut().expect("dangling node id")
    }

    fn take_node(&mut self, id: NodeId) -> Node<K, V> {
        self.nodes[id as usize].take().expect("dangling node id")
    }

    fn put_node(&mut self, id: NodeId, node: Node<K, V>) {
        self.nodes[id as usize] = Some(node);
    }

    /// Index of the child a key routes to: the last child whose cached
    /// minimum is not above the key, or the first child when the key sorts
    /// below everything.
    fn child_for(mins: &[K], key: &K) -> usize {
        match mins.binary_search(key) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        }
    }

    fn find_leaf(&self, key: &K) -> (NodeId, std::result::Result<usize, usize>) {
        let mut id = self.root;
        loop {
            match self.node(id) {
                Node::Internal { mins, children } => id = children[Self::child_for(mins, key)],
                Node::Leaf { keys, .. } => return (id, keys.binary_search(key)),
            }
        }
    }

    /// Point lookup.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.find_leaf(key) {
            (id, Ok(i)) => match self.node(id) {
                Node::Leaf { vals, .. } => Some(&vals[i]),
                Node::Internal { .. } => unreachable!("find_leaf returned an internal node"),
            },
            (_, Err(_)) => None,
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.find_leaf(key) {
            (id, Ok(i)) => match self.node_mut(id) {
                Node::Leaf { vals, .. } => Some(&mut vals[i]),
                Node::Internal { .. } => unreachable!("find_leaf returned an internal node"),
            },
            (_, Err(_)) => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.find_leaf(key), (_, Ok(_)))
    }

    /// Smallest key in the tree. Reads only cached primary keys.
    pub fn first_key(&self) -> Option<&K> {
        if self.len == 0 {
            None
        } else {
            Some(self.node(self.root).min_key())
        }
    }

    /// Largest key in the tree.
    pub fn last_key(&self) -> Option<&K> {
        if self.len == 0 {
            return None;
        }
        let mut id = self.root;
        loop {
            match self.node(id) {
                Node::Internal { children, .. } => {
                    id = *children.last().expect("non-empty internal node")
                }
                Node::Leaf { keys, .. } => return keys.last(),
            }
        }
    }

    /// Inserts a key, overwriting the value on an exact match.
    pub fn insert(&mut self, key: K, value: V) {
        match self.insert_into(self.root, key, value) {
            InsertOutcome::Unchanged | InsertOutcome::MinChanged(_) => {}
            InsertOutcome::Split { id, min, .. } => {
                let old_root = self.root;
                let old_min = self.node(old_root).min_key().clone();
                self.root = self.alloc(Node::Internal {
                    mins: vec![old_min, min],
                    children: vec![old_root, id],
                });
            }
        }
    }

    fn insert_into(&mut self, id: NodeId, key: K, value: V) -> InsertOutcome<K> {
        let mut node = self.take_node(id);
        let outcome = match &mut node {
            Node::Leaf { keys, vals } => match keys.binary_search(&key) {
                Ok(i) => {
                    vals[i] = value;
                    InsertOutcome::Unchanged
                }
                Err(i) => {
                    keys.insert(i, key);
                    vals.insert(i, value);
                    self.len += 1;
                    let min_changed = i == 0;
                    if keys.len() > self.degree {
                        let split_at = keys.len() - self.degree / 2;
                        let right_keys = keys.split_off(split_at);
                        let right_vals = vals.split_off(split_at);
                        let min = right_keys[0].clone();
                        let right = self.alloc(Node::Leaf {
                            keys: right_keys,
                            vals: right_vals,
                        });
                        InsertOutcome::Split {
                            id: right,
                            min,
                            self_min: min_changed.then(|| keys[0].clone()),
                        }
                    } else if min_changed {
                        InsertOutcome::MinChanged(keys[0].clone())
                    } else {
                        InsertOutcome::Unchanged
                    }
                }
            },
            Node::Internal { mins, children } => {
                let i = Self::child_for(mins, &key);
                let child = children[i];
                let child_outcome = self.insert_into(child, key, value);
                let mut min_changed = false;
                match child_outcome {
                    InsertOutcome::Unchanged => {}
                    InsertOutcome::MinChanged(k) => {
                        mins[i] = k;
                        min_changed = i == 0;
                    }
                    InsertOutcome::Split {
                        id: new_child,
                        min,
                        self_min,
                    } => {
                        if let Some(k) = self_min {
                            mins[i] = k;
                            min_changed = i == 0;
                        }
                        mins.insert(i + 1, min);
                        children.insert(i + 1, new_child);
                    }
                }
                if children.len() > self.degree {
                    let split_at = children.len() - self.degree / 2;
                    let right_mins = mins.split_off(split_at);
                    let right_children = children.split_off(split_at);
                    let min = right_mins[0].clone();
                    let right = self.alloc(Node::Internal {
                        mins: right_mins,
                        children: right_children,
                    });
                    InsertOutcome::Split {
                        id: right,
                        min,
                        self_min: min_changed.then(|| mins[0].clone()),
                    }
                } else if min_changed {
                    InsertOutcome::MinChanged(mins[0].clone())
                } else {
                    InsertOutcome::Unchanged
                }
            }
        };
        self.put_node(id, node);
        outcome
    }

    /// Removes a key, reporting `None` when absent.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        match self.remove_from(self.root, key) {
            Removal::NotFound => None,
            Removal::Removed { value, .. } => {
                self.collapse_root();
                Some(value)
            }
        }
    }

    fn collapse_root(&mut self) {
        loop {
            let root = self.root;
            match self.node(root) {
                Node::Internal { children, .. } if children.len() == 1 => {
                    let child = children[0];
                    self.free_node(root);
                    self.root = child;
                }
                Node::Internal { children, .. } if children.is_empty() => {
                    self.free_node(root);
                    self.root = self.alloc(Node::Leaf {
                        keys: Vec::new(),
                        vals: Vec::new(),
                    });
                    return;
                }
                _ => return,
            }
        }
    }

    fn remove_from(&mut self, id: NodeId, key: &K) -> Removal<K, V> {
        let mut node = self.take_node(id);
        let removal = match &mut node {
            Node::Leaf { keys, vals } => match keys.binary_search(key) {
                Err(_) => Removal::NotFound,
                Ok(i) => {
                    keys.remove(i);
                    let value = vals.remove(i);
                    self.len -= 1;
                    let emptied = keys.is_empty();
                    Removal::Removed {
                        value,
                        new_min: (!emptied && i == 0).then(|| keys[0].clone()),
                        emptied,
                    }
                }
            },
            Node::Internal { mins, children } => {
                let i = Self::child_for(mins, key);
                let child = children[i];
                match self.remove_from(child, key) {
                    Removal::NotFound => Removal::NotFound,
                    Removal::Removed {
                        value,
                        new_min,
                        emptied,
                    } => {
                        if emptied {
                            self.free_node(child);
                            mins.remove(i);
                            children.remove(i);
                        } else if let Some(k) = new_min {
                            mins[i] = k;
                        }
                        self.try_merge_adjacent(mins, children, i);
                        let emptied_self = children.is_empty();
                        Removal::Removed {
                            value,
                            new_min: (!emptied_self && i == 0).then(|| mins[0].clone()),
                            emptied: emptied_self,
                        }
                    }
                }
            }
        };
        self.put_node(id, node);
        removal
    }

    /// Opportunistic merge around the child that just changed size: the
    /// pair merges only when the combined size fits in one node.
    fn try_merge_adjacent(&mut self, mins: &mut Vec<K>, children: &mut Vec<NodeId>, idx: usize) {
        if children.len() < 2 {
            return;
        }
        let idx = idx.min(children.len() - 1);
        if idx + 1 < children.len() && self.merge_pair(children[idx], children[idx + 1]) {
            mins.remove(idx + 1);
            children.remove(idx + 1);
            return;
        }
        if idx > 0 && self.merge_pair(children[idx - 1], children[idx]) {
            mins.remove(idx);
            children.remove(idx);
        }
    }

    fn merge_pair(&mut self, left: NodeId, right: NodeId) -> bool {
        if self.node(left).len() + self.node(right).len() > self.degree {
            return false;
        }
        let right_node = self.free_node(right);
        match (self.node_mut(left), right_node) {
            (
                Node::Leaf { keys, vals },
                Node::Leaf {
                    keys: right_keys,
                    vals: right_vals,
                },
            ) => {
                keys.extend(right_keys);
                vals.extend(right_vals);
            }
            (
                Node::Internal { mins, children },
                Node::Internal {
                    mins: right_mins,
                    children: right_children,
                },
            ) => {
                mins.extend(right_mins);
                children.extend(right_children);
            }
            _ => unreachable!("adjacent siblings differ in kind"),
        }
        true
    }

    /// Ascending scan over `[low, high]`.
    ///
    /// Only `RangeMode::Closed` is supported; the other modes fail.
    pub fn collect(&self, low: &K, high: &K, mode: RangeMode) -> Result<RangeScan<'_, K, V>> {
        if mode != RangeMode::Closed {
            bail!("range mode {:?} is not supported", mode);
        }
        Ok(RangeScan::new(self, low.clone(), high.clone()))
    }

    /// Height of the tree (levels of internal nodes above the leaves).
    #[cfg(test)]
    pub(crate) fn height(&self) -> usize {
        let mut h = 0;
        let mut id = self.root;
        loop {
            match self.node(id) {
                Node::Internal { children, .. } => {
                    h += 1;
                    id = children[0];
                }
                Node::Leaf { .. } => return h,
            }
        }
    }

    /// Verifies structural invariants: key ordering within and across
    /// leaves, cached minimums, and node size bounds.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        fn walk<K: Ord + Clone, V>(tree: &BTree<K, V>, id: NodeId) -> usize {
            match tree.node(id) {
                Node::Leaf { keys, vals } => {
                    assert_eq!(keys.len(), vals.len());
                    assert!(keys.windows(2).all(|w| w[0] < w[1]), "leaf keys unsorted");
                    keys.len()
                }
                Node::Internal { mins, children } => {
                    assert_eq!(mins.len(), children.len());
                    assert!(!children.is_empty(), "empty internal node survived");
                    assert!(children.len() <= tree.degree, "internal node over degree");
                    assert!(mins.windows(2).all(|w| w[0] < w[1]), "mins unsorted");
                    let mut total = 0;
                    for (min, &child) in mins.iter().zip(children) {
                        assert!(
                            min == tree.node(child).min_key(),
                            "cached primary key out of date"
                        );
                        total += walk(tree, child);
                    }
                    total
                }
            }
        }
        let total = walk(self, self.root);
        assert_eq!(total, self.len, "len out of sync with stored keys");
    }
}

type ScanStack = SmallVec<[(NodeId, usize); MAX_TREE_DEPTH]>;

/// Iterative explicit-stack range scan; see [`BTree::collect`].
#[derive(Debug)]
pub struct RangeScan<'a, K, V> {
    tree: &'a BTree<K, V>,
    /// Path of (internal node, index of the child currently descended into).
    stack: ScanStack,
    leaf: NodeId,
    pos: usize,
    high: K,
    done: bool,
}

impl<'a, K: Ord + Clone, V> RangeScan<'a, K, V> {
    fn new(tree: &'a BTree<K, V>, low: K, high: K) -> Self {
        let mut stack = ScanStack::new();
        let mut id = tree.root;
        let (leaf, pos) = loop {
            match tree.node(id) {
                Node::Internal { mins, children } => {
                    let i = BTree::<K, V>::child_for(mins, &low);
                    stack.push((id, i));
                    id = children[i];
                }
                Node::Leaf { keys, .. } => break (id, keys.partition_point(|k| *k < low)),
            }
        };
        Self {
            tree,
            stack,
            leaf,
            pos,
            high,
            done: false,
        }
    }

    fn leaf_parts(&self) -> (&'a [K], &'a [V]) {
        match self.tree.node(self.leaf) {
            Node::Leaf { keys, vals } => (keys, vals),
            Node::Internal { .. } => unreachable!("scan positioned on an internal node"),
        }
    }

    /// Moves to the first entry of the next leaf, pruning subtrees whose
    /// cached minimum already exceeds the upper bound.
    fn advance_leaf(&mut self) -> bool {
        while let Some((parent, i)) = self.stack.pop() {
            let (mins, children) = match self.tree.node(parent) {
                Node::Internal { mins, children } => (mins, children),
                Node::Leaf { .. } => unreachable!("leaf on the scan stack"),
            };
            if i + 1 >= children.len() {
                continue;
            }
            if mins[i + 1] > self.high {
                return false;
            }
            self.stack.push((parent, i + 1));
            let mut id = children[i + 1];
            loop {
                match self.tree.node(id) {
                    Node::Internal { children, .. } => {
                        self.stack.push((id, 0));
                        id = children[0];
                    }
                    Node::Leaf { .. } => {
                        self.leaf = id;
                        self.pos = 0;
                        return true;
                    }
                }
            }
        }
        false
    }
}

impl<'a, K: Ord + Clone, V> Iterator for RangeScan<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let (keys, vals) = self.leaf_parts();
            if self.pos < keys.len() {
                let key = &keys[self.pos];
                if *key > self.high {
                    self.done = true;
                    return None;
                }
                let val = &vals[self.pos];
                self.pos += 1;
                return Some((key, val));
            }
            if !self.advance_leaf() {
                self.done = true;
                return None;
            }
        }
    }
}
