//! # Row Storage Layer
//!
//! Fixed-width rows with out-of-band storage for variable-length columns.
//!
//! ## Row Binary Layout
//!
//! ```text
//! +----------------+----------------+-------------------+----------------+
//! | col 0 slot     | col 1 slot     | ...               | col N-1 slot   |
//! +----------------+----------------+-------------------+----------------+
//! ```
//!
//! Every slot has a width fixed by the column's type; Text/Blob slots hold
//! an 8-byte surrogate id resolving through the column's side table. The
//! schema pre-computes all offsets once, so column access never parses.
//!
//! ## Module Structure
//!
//! - `schema`: `TableSchema` with pre-computed offsets and hash membership
//! - `heap`: `VarStore`/`VarHeap` surrogate side tables with undo journal
//! - `row`: `RowBuilder` → `ImmutableRow`/`RowRef` lifecycle, content hash
//! - `codec`: per-column slot/wire/value translation

pub mod codec;
pub mod heap;
pub mod row;
pub mod schema;


pub use codec::{encode_row, ColumnCodec};
pub use heap::{VarHeap, VarStore};
pub use row::{ImmutableRow, RowBuilder, RowRef, RowSet};
pub use schema::TableSchema;
