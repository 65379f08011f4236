//! # VelDB - Embedded In-Memory Multi-Index Row Store
//!
//! VelDB is the storage/query kernel of a networked database service: a
//! fixed-schema row table queried through a composable boolean predicate
//! algebra evaluated against per-column indices. This implementation
//! prioritizes:
//!
//! - **Zero allocation on hot paths**: pooled row buffers and evaluation
//!   scratch, arena-allocated predicate trees
//! - **Fine-grained concurrency**: one reader/writer lock per index,
//!   lazily taken reads, globally serialized writers
//! - **All-or-nothing writes**: every mutation journals its inverse and
//!   commits across the row store and all indices atomically
//!
//! ## Quick Start
//!
//! ```ignore
//! use veldb::{ColumnDef, DataType, OwnedValue, PredicateExpr, Table};
//!
//! let table = Table::new(vec![
//!     ColumnDef::range("id", DataType::Int4),
//!     ColumnDef::point("name", DataType::Text),
//! ])?;
//!
//! table.insert(&encoded_row)?;
//!
//! let pred = PredicateExpr::equal(0, OwnedValue::Int4(1))
//!     .and(PredicateExpr::equal(4, OwnedValue::Text("alice".into())));
//! for row in table.aggregate(&pred.encode_to_vec())? {
//!     let values = row?;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Operation Surface (Table)         │
//! ├─────────────────────────────────────┤
//! │ Write Transactions │ Aggregation    │
//! ├────────────────────┼────────────────┤
//! │ Row Store │ Point / Range / Fuzzy   │
//! │           │ Indices (B-tree, hash,  │
//! │           │ trigram)                │
//! ├─────────────────────────────────────┤
//! │  Column Codecs + Var-Len Side Tables│
//! ├─────────────────────────────────────┤
//! │  Pooled Buffers & Scratch Memory    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`table`]: registry, write transactions, operation surface
//! - [`btree`]: arena-backed ordered index with explicit-stack range scans
//! - [`index`]: point/range/fuzzy index family behind one guard contract
//! - [`query`]: predicate wire format and AND/OR/UNARY evaluation
//! - [`rows`]: fixed-width row layout, column codecs, surrogate side tables
//! - [`memory`]: sharded row-buffer and scratch pools
//! - [`encoding`]: little-endian wire cursors
//! - [`config`]: centralized constants
//!
//! ## Concurrency Model
//!
//! The kernel is synchronous and caller-threaded: every operation runs to
//! completion on the thread that invoked it. Writers acquire every write
//! lock up front and serialize globally; readers lock each visited index
//! only while querying it, so multi-column predicates are not snapshot
//! consistent across columns (see `table` docs for the caveat).

pub mod btree;
pub mod config;
pub mod encoding;
pub mod index;
pub mod memory;
pub mod query;
pub mod rows;
pub mod table;
pub mod types;

pub use query::{CompareOp, PredicateExpr};
pub use rows::{encode_row, TableSchema};
pub use table::{Rows, Table};
pub use types::{ColumnDef, DataType, IndexKind, OwnedValue};
