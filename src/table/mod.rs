//! # Table Orchestration
//!
//! The registry layer: one [`Table`] owns the schema, the row store, the
//! variable-length side tables, and one index per indexed column, and
//! exposes the kernel's operation surface to the transport layer above it.
//!
//! | Operation | Input | Output |
//! |-----------|-------|--------|
//! | `insert` | encoded row | inserted: bool |
//! | `bulk_insert` | count + encoded rows | inserted count |
//! | `aggregate` | encoded predicate | lazy row cursor |
//! | `count_where` | encoded predicate | matching count |
//! | `count` | — | total rows |
//! | `delete_where` | encoded predicate | deleted count |
//! | `clear` | — | deleted count |
//! | `serialize_all` | — | count + encoded rows |

mod registry;
mod row_store;

pub use registry::{Rows, Table};
pub use row_store::{RowStore, RowStoreCell};
