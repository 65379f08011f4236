//! # VelDB Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Constants that depend
//! on each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! MIN_BTREE_DEGREE (2)
//!       │
//!       └─> DEFAULT_BTREE_DEGREE (32, must be >= MIN_BTREE_DEGREE)
//!             Table construction rejects any degree below the minimum; the
//!             default is what Table::new hands to every range index.
//!
//! MAX_TREE_DEPTH (8)
//!       │
//!       └─> Inline capacity of range-scan traversal stacks. Trees deeper
//!           than this spill the SmallVec to the heap; nothing breaks, the
//!           scan just allocates.
//!
//! SURROGATE_WIDTH (8 bytes)
//!       │
//!       └─> Fixed slot width of every variable-length column. The slot
//!           holds a u64 surrogate id resolved through the column's VarHeap.
//!
//! VAR_LEN_PREFIX_WIDTH (4 bytes)
//!       │
//!       └─> Wire encoding of Text/Blob values: u32 length prefix followed
//!           by the payload. Shared by row decode, serialize-all, and the
//!           predicate operand codec.
//!
//! TRIGRAM_WIDTH (3)
//!       │
//!       └─> DEFAULT_MIN_FUZZY_MATCH (3, must be >= TRIGRAM_WIDTH so a
//!           match threshold is always expressible in shared trigrams)
//!
//! POOL_SHARD_COUNT (16)
//!       │
//!       └─> Shard count for both the row-buffer pool and the evaluation
//!           scratch pool. Must be a power of two so round-robin shard
//!           selection reduces to a mask.
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by the compile-time assertions at the bottom of this file:
//!
//! 1. `MIN_BTREE_DEGREE >= 2` (a node must be able to hold two entries)
//! 2. `DEFAULT_BTREE_DEGREE >= MIN_BTREE_DEGREE`
//! 3. `DEFAULT_MIN_FUZZY_MATCH >= TRIGRAM_WIDTH`
//! 4. `POOL_SHARD_COUNT` is a power of two

/// Smallest branching factor a range index accepts. Construction with a
/// degree below this fails.
pub const MIN_BTREE_DEGREE: usize = 2;

/// Branching factor used by `Table::new` for every range-indexed column.
pub const DEFAULT_BTREE_DEGREE: usize = 32;

/// Inline capacity of B-tree traversal stacks.
pub const MAX_TREE_DEPTH: usize = 8;

/// Slot width of a variable-length column inside the row buffer.
pub const SURROGATE_WIDTH: usize = 8;

/// Width of the length prefix on wire-encoded Text/Blob values.
pub const VAR_LEN_PREFIX_WIDTH: usize = 4;

/// Window width used by the fuzzy index's trigram collaborator.
pub const TRIGRAM_WIDTH: usize = 3;

/// Minimum matched length a fuzzy-search hit must reach to satisfy a
/// `FuzzySearch` predicate.
pub const DEFAULT_MIN_FUZZY_MATCH: usize = 3;

/// Shard count for the row-buffer and scratch pools.
pub const POOL_SHARD_COUNT: usize = 16;

const _: () = assert!(MIN_BTREE_DEGREE >= 2);
const _: () = assert!(DEFAULT_BTREE_DEGREE >= MIN_BTREE_DEGREE);
const _: () = assert!(DEFAULT_MIN_FUZZY_MATCH >= TRIGRAM_WIDTH);
const _: () = assert!(POOL_SHARD_COUNT.is_power_of_two());
