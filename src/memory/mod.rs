//! # Pooled Scratch Memory
//!
//! Per-thread reusable buffers for the two hot paths:
//!
//! - [`row_pool`]: fixed-size row buffers, rented for the lifetime of a row
//! - [`scratch`]: predicate-evaluation scratch (result set + decode arena)
//!
//! Both pools shard their free lists to keep lock contention off the hot
//! path, following the same guard-returns-on-drop shape: acquisition is a
//! scoped borrow and release happens on every exit path, including unwinds.

mod row_pool;
mod scratch;

pub use row_pool::{PooledRowBuf, RowBufferPool};
pub use scratch::{EvalScratch, PooledScratch, ScratchPool};
