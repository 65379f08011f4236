//! # Row Buffer Pool
//!
//! Pre-allocated pool of row-sized buffers for zero-allocation insert paths.
//!
//! ## Purpose
//!
//! Every insert decodes a candidate row into a fixed-size buffer, and every
//! live row owns one for its whole lifetime. This pool hands those buffers
//! out and takes them back when the last reference to a row drops, so a
//! steady-state insert/delete workload stops allocating once warm.
//!
//! ## Design
//!
//! The pool uses lock sharding to reduce contention under concurrent row
//! teardown (readers dropping result sets return buffers from their own
//! threads). `PooledRowBuf` uses `ManuallyDrop` so the buffer is always
//! valid until `Drop` runs and ownership can be taken without an `Option`.

use crate::config::POOL_SHARD_COUNT;
use parking_lot::Mutex;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A pool of reusable row-sized buffers.
///
/// All buffers share one length, fixed at pool construction from the table
/// schema's row width.
#[derive(Debug, Clone)]
pub struct RowBufferPool {
    inner: Arc<RowBufferPoolInner>,
}

#[derive(Debug)]
struct RowBufferPoolInner {
    row_size: usize,
    shards: [Mutex<Vec<Box<[u8]>>>; POOL_SHARD_COUNT],
    next_shard: AtomicUsize,
}

impl RowBufferPool {
    /// Creates a pool handing out buffers of `row_size` bytes.
    pub fn new(row_size: usize) -> Self {
        let shards: [Mutex<Vec<Box<[u8]>>>; POOL_SHARD_COUNT] =
            std::array::from_fn(|_| Mutex::new(Vec::new()));
        Self {
            inner: Arc::new(RowBufferPoolInner {
                row_size,
                shards,
                next_shard: AtomicUsize::new(0),
            }),
        }
    }

    pub fn row_size(&self) -> usize {
        self.inner.row_size
    }

    /// Acquires a zeroed buffer, reusing a pooled one when available.
    ///
    /// The buffer returns to its shard when dropped.
    pub fn acquire(&self) -> PooledRowBuf {
        let shard_idx =
            self.inner.next_shard.fetch_add(1, Ordering::Relaxed) & (POOL_SHARD_COUNT - 1);
        let buffer = self.inner.shards[shard_idx].lock().pop();
        let mut buffer =
            buffer.unwrap_or_else(|| vec![0u8; self.inner.row_size].into_boxed_slice());
        buffer.fill(0);
        PooledRowBuf {
            buffer: ManuallyDrop::new(buffer),
            pool: Arc::clone(&self.inner),
            shard_idx,
        }
    }

    /// Buffers currently parked across all shards.
    pub fn available(&self) -> usize {
        self.inner.shards.iter().map(|s| s.lock().len()).sum()
    }
}

/// A row buffer that returns to its pool when dropped.
pub struct PooledRowBuf {
    buffer: ManuallyDrop<Box<[u8]>>,
    pool: Arc<RowBufferPoolInner>,
    shard_idx: usize,
}

impl std::fmt::Debug for PooledRowBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledRowBuf")
            .field("len", &self.buffer.len())
            .field("shard_idx", &self.shard_idx)
            .finish()
    }
}

impl Deref for PooledRowBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer
    }
}

impl DerefMut for PooledRowBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for PooledRowBuf {
    fn drop(&mut self) {
        // Safety: the buffer is never touched again after this take.
        let buffer = unsafe { ManuallyDrop::take(&mut self.buffer) };
        self.pool.shards[self.shard_idx].lock().push(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_zeroed_buffer_of_row_size() {
        let pool = RowBufferPool::new(24);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 24);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn dropped_buffers_are_reused() {
        let pool = RowBufferPool::new(8);
        {
            let mut buf = pool.acquire();
            buf[0] = 0xFF;
        }
        assert_eq!(pool.available(), 1);
        // The recycled buffer comes back zeroed even though a previous user
        // wrote to it.
        let bufs: Vec<_> = (0..POOL_SHARD_COUNT + 1).map(|_| pool.acquire()).collect();
        assert!(bufs.iter().all(|b| b.iter().all(|&x| x == 0)));
        drop(bufs);
        assert_eq!(pool.available(), POOL_SHARD_COUNT + 1);
    }
}
