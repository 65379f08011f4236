//! # B-Tree Range Index
//!
//! This module implements the ordered index structure backing every
//! range-indexed column. The design prioritizes cheap descent through
//! cached child minimums and stack-safe range scans.
//!
//! ## Architecture Overview
//!
//! Nodes live in an arena and reference each other by stable id:
//!
//! ```text
//!                  [Internal]
//!                 mins: 1 | 40
//!                  /        \
//!        [Leaf 1..39]    [Leaf 40..]
//! ```
//!
//! Each internal node caches, per child, the minimum key reachable from
//! that child's subtree. Descent is a binary search over those cached
//! minimums; scans prune a whole subtree the moment its cached minimum
//! exceeds the upper bound.
//!
//! ## Mutation Protocol
//!
//! Inserts and removes recurse to the target leaf and return algebraic
//! outcomes up the unwind path: split (with the new sibling), minimum-key
//! change (with the new minimum), emptied. Parents apply the outcome to
//! their own slot arrays and translate it into their own outcome, so no
//! node ever holds a pointer to its parent.
//!
//! ## Thread Safety
//!
//! `BTree` is not synchronized; the owning index wraps it in the registry's
//! per-index `RwLock`.

mod node;
mod tree;

pub use tree::{BTree, RangeMode, RangeScan};
