//! # Row Lifecycle
//!
//! A row starts as a `RowBuilder`: a pooled fixed-width buffer the column
//! codecs write their slots into, plus an accumulating hash-input buffer
//! mirroring the wire bytes of every hashed column. Finishing the builder
//! seals it into an `ImmutableRow` carrying the content hash.
//!
//! The content hash is the table's only uniqueness constraint: two rows
//! whose hashed columns agree are the same row. `RowRef` therefore compares
//! and hashes by content hash alone, which is what lets row sets across the
//! row store and every index agree on identity without comparing buffers.
//!
//! An `ImmutableRow` is shared (`Arc`) between the row store and each index
//! holding it; the pooled buffer returns to its pool when the last reference
//! drops. Variable-length side entries are NOT released by dropping; the
//! registry destroys them through the codecs before a row leaves the store.

use crate::memory::{PooledRowBuf, RowBufferPool};
use crc::{Crc, CRC_64_ECMA_182};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

const ROW_HASH: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// A row under construction.
#[derive(Debug)]
pub struct RowBuilder {
    buf: PooledRowBuf,
    hash_input: Vec<u8>,
}

impl RowBuilder {
    /// Rents a zeroed buffer from the pool.
    pub fn new(pool: &RowBufferPool) -> Self {
        Self {
            buf: pool.acquire(),
            hash_input: Vec::new(),
        }
    }

    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Hash-accumulation sink hashed columns mirror their wire bytes into.
    pub fn hash_sink(&mut self) -> &mut Vec<u8> {
        &mut self.hash_input
    }

    /// Seals the builder, computing the content hash over everything the
    /// hashed columns mirrored in.
    pub fn finish(self) -> ImmutableRow {
        let hash = ROW_HASH.checksum(&self.hash_input);
        ImmutableRow {
            buf: self.buf,
            hash,
        }
    }
}

/// A sealed row: read-only buffer plus content hash.
#[derive(Debug)]
pub struct ImmutableRow {
    buf: PooledRowBuf,
    hash: u64,
}

impl ImmutableRow {
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }
}

/// Shared handle to an immutable row; identity is the content hash.
#[derive(Debug, Clone)]
pub struct RowRef(Arc<ImmutableRow>);

impl RowRef {
    pub fn new(row: ImmutableRow) -> Self {
        Self(Arc::new(row))
    }
}

impl Deref for RowRef {
    type Target = ImmutableRow;

    fn deref(&self) -> &ImmutableRow {
        &self.0
    }
}

impl PartialEq for RowRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for RowRef {}

impl Hash for RowRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

/// Set of rows, deduplicated by content hash.
pub type RowSet = hashbrown::HashSet<RowRef>;
