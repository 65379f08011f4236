//! # Point Index
//!
//! Hash-map equality index: column value to the set of rows holding it.
//! The cheapest index shape, answering `Equal` and nothing else.

use crate::rows::{RowRef, RowSet};
use crate::types::OwnedValue;
use hashbrown::HashMap;

#[derive(Debug, Default)]
pub struct PointIndex {
    buckets: HashMap<OwnedValue, RowSet>,
}

impl PointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row under its column value. Returns false when the row was
    /// already present in that bucket.
    pub fn add(&mut self, key: OwnedValue, row: RowRef) -> bool {
        self.buckets.entry(key).or_default().insert(row)
    }

    /// Removes one row from its value's bucket, dropping the bucket when it
    /// empties. Returns false when the row was not present.
    pub fn remove_exact(&mut self, key: &OwnedValue, row: &RowRef) -> bool {
        let Some(set) = self.buckets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(row);
        if set.is_empty() {
            self.buckets.remove(key);
        }
        removed
    }

    /// Removes a whole bucket.
    pub fn remove_bucket(&mut self, key: &OwnedValue) -> Option<RowSet> {
        self.buckets.remove(key)
    }

    pub fn restore_bucket(&mut self, key: OwnedValue, rows: RowSet) {
        self.buckets.insert(key, rows);
    }

    pub fn get(&self, key: &OwnedValue) -> Option<&RowSet> {
        self.buckets.get(key)
    }

    /// Distinct values in the index.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total rows across all buckets.
    pub fn row_count(&self) -> usize {
        self.buckets.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RowBufferPool;
    use crate::rows::{RowBuilder, RowRef};

    fn row(pool: &RowBufferPool, tag: &[u8]) -> RowRef {
        let mut b = RowBuilder::new(pool);
        b.hash_sink().extend_from_slice(tag);
        RowRef::new(b.finish())
    }

    #[test]
    fn add_and_remove_maintain_buckets() {
        let pool = RowBufferPool::new(4);
        let mut idx = PointIndex::new();
        let a = row(&pool, b"a");
        let b = row(&pool, b"b");

        assert!(idx.add(OwnedValue::Int4(1), a.clone()));
        assert!(idx.add(OwnedValue::Int4(1), b.clone()));
        assert!(!idx.add(OwnedValue::Int4(1), a.clone()));
        assert_eq!(idx.get(&OwnedValue::Int4(1)).unwrap().len(), 2);

        assert!(idx.remove_exact(&OwnedValue::Int4(1), &a));
        assert!(idx.remove_exact(&OwnedValue::Int4(1), &b));
        // bucket vanished with its last row
        assert!(idx.get(&OwnedValue::Int4(1)).is_none());
        assert_eq!(idx.bucket_count(), 0);
        assert!(!idx.remove_exact(&OwnedValue::Int4(1), &a));
    }

    #[test]
    fn remove_bucket_returns_all_rows() {
        let pool = RowBufferPool::new(4);
        let mut idx = PointIndex::new();
        idx.add(OwnedValue::Text("x".into()), row(&pool, b"1"));
        idx.add(OwnedValue::Text("x".into()), row(&pool, b"2"));
        let rows = idx.remove_bucket(&OwnedValue::Text("x".into())).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(idx.row_count(), 0);
    }
}
