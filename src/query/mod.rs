//! # Predicate Decoding & Aggregation
//!
//! The query layer turns an encoded predicate byte stream into the set of
//! matching rows:
//!
//! ```text
//! bytes ──decode──> Predicate tree (arena) ──evaluate──> RowSet
//!                        │                        │
//!                        │                UNARY leaves resolved
//!                        │                against column indices
//!                   per-request Bump
//! ```
//!
//! - [`predicate`]: wire format, `CompareOp`, the arena-allocated tree, and
//!   the `PredicateExpr` builder callers encode requests with
//! - [`eval`]: recursive AND/OR/UNARY evaluation with null-branch algebra

pub mod eval;
pub mod predicate;

pub use predicate::{CompareOp, Predicate, PredicateExpr, UnaryPredicate};
