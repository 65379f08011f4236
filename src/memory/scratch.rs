//! # Evaluation Scratch Pool
//!
//! Reusable per-evaluation scratch state for the aggregation engine: a row
//! set used as the working area of AND/OR set algebra, and a `Bump` arena
//! holding the decoded predicate tree for the duration of one request.
//!
//! A scratch is cleared when acquired, never while parked, so the cost of
//! clearing lands on the thread that benefits from the warm allocation. A
//! pooled scratch must not be shared across threads; the guard is the only
//! handle and does not implement `Clone`.

use crate::config::POOL_SHARD_COUNT;
use crate::rows::RowSet;
use bumpalo::Bump;
use parking_lot::Mutex;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Working state for one predicate evaluation.
#[derive(Debug, Default)]
pub struct EvalScratch {
    /// Scratch row set for intersection/union; cleared before reuse.
    pub set: RowSet,
    /// Arena for the decoded predicate tree; reset before reuse.
    pub arena: Bump,
}

/// Sharded pool of `EvalScratch` instances.
#[derive(Debug, Clone)]
pub struct ScratchPool {
    inner: Arc<ScratchPoolInner>,
}

#[derive(Debug)]
struct ScratchPoolInner {
    shards: [Mutex<Vec<EvalScratch>>; POOL_SHARD_COUNT],
    next_shard: AtomicUsize,
}

impl ScratchPool {
    pub fn new() -> Self {
        let shards: [Mutex<Vec<EvalScratch>>; POOL_SHARD_COUNT] =
            std::array::from_fn(|_| Mutex::new(Vec::new()));
        Self {
            inner: Arc::new(ScratchPoolInner {
                shards,
                next_shard: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquires a cleared scratch, reusing a pooled one when available.
    pub fn acquire(&self) -> PooledScratch {
        let shard_idx =
            self.inner.next_shard.fetch_add(1, Ordering::Relaxed) & (POOL_SHARD_COUNT - 1);
        let scratch = self.inner.shards[shard_idx].lock().pop();
        let mut scratch = scratch.unwrap_or_default();
        scratch.set.clear();
        scratch.arena.reset();
        PooledScratch {
            scratch: ManuallyDrop::new(scratch),
            pool: Arc::clone(&self.inner),
            shard_idx,
        }
    }

    pub fn available(&self) -> usize {
        self.inner.shards.iter().map(|s| s.lock().len()).sum()
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch that returns to its pool when dropped.
pub struct PooledScratch {
    scratch: ManuallyDrop<EvalScratch>,
    pool: Arc<ScratchPoolInner>,
    shard_idx: usize,
}

impl Deref for PooledScratch {
    type Target = EvalScratch;

    fn deref(&self) -> &EvalScratch {
        &self.scratch
    }
}

impl DerefMut for PooledScratch {
    fn deref_mut(&mut self) -> &mut EvalScratch {
        &mut self.scratch
    }
}

impl Drop for PooledScratch {
    fn drop(&mut self) {
        // Safety: the scratch is never touched again after this take.
        let scratch = unsafe { ManuallyDrop::take(&mut self.scratch) };
        self.pool.shards[self.shard_idx].lock().push(scratch);
    }
}
