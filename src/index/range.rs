//! # Range Index
//!
//! B-tree-backed ordered index: column value to the set of rows holding it,
//! answering equality and every comparison operator. Comparisons reduce to
//! the tree's closed-interval scan bounded by the current first/last key,
//! with the boundary key filtered out for the strict operators.

use crate::btree::{BTree, RangeMode};
use crate::rows::{RowRef, RowSet};
use crate::types::OwnedValue;
use eyre::Result;

#[derive(Debug)]
pub struct RangeIndex {
    tree: BTree<OwnedValue, RowSet>,
}

impl RangeIndex {
    pub fn new(degree: usize) -> Result<Self> {
        Ok(Self {
            tree: BTree::new(degree)?,
        })
    }

    pub fn degree(&self) -> usize {
        self.tree.degree()
    }

    pub fn add(&mut self, key: OwnedValue, row: RowRef) -> bool {
        if let Some(set) = self.tree.get_mut(&key) {
            set.insert(row)
        } else {
            let mut set = RowSet::default();
            set.insert(row);
            self.tree.insert(key, set);
            true
        }
    }

    pub fn remove_exact(&mut self, key: &OwnedValue, row: &RowRef) -> bool {
        let Some(set) = self.tree.get_mut(key) else {
            return false;
        };
        let removed = set.remove(row);
        if set.is_empty() {
            self.tree.remove(key);
        }
        removed
    }

    pub fn remove_bucket(&mut self, key: &OwnedValue) -> Option<RowSet> {
        self.tree.remove(key)
    }

    pub fn restore_bucket(&mut self, key: OwnedValue, rows: RowSet) {
        self.tree.insert(key, rows);
    }

    pub fn get(&self, key: &OwnedValue) -> Option<&RowSet> {
        self.tree.get(key)
    }

    pub fn bucket_count(&self) -> usize {
        self.tree.len()
    }

    pub fn row_count(&self) -> usize {
        match (self.tree.first_key(), self.tree.last_key()) {
            (Some(first), Some(last)) => self
                .tree
                .collect(first, last, RangeMode::Closed)
                .map(|scan| scan.map(|(_, set)| set.len()).sum())
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Collects every row whose key falls in `[low, high]`.
    pub fn collect_between(&self, low: &OwnedValue, high: &OwnedValue, out: &mut RowSet) -> Result<()> {
        for (_, set) in self.tree.collect(low, high, RangeMode::Closed)? {
            out.extend(set.iter().cloned());
        }
        Ok(())
    }

    /// Collects rows above `bound`; `inclusive` keeps the bound itself.
    pub fn collect_above(&self, bound: &OwnedValue, inclusive: bool, out: &mut RowSet) -> Result<()> {
        let Some(last) = self.tree.last_key().cloned() else {
            return Ok(());
        };
        for (key, set) in self.tree.collect(bound, &last, RangeMode::Closed)? {
            if !inclusive && key == bound {
                continue;
            }
            out.extend(set.iter().cloned());
        }
        Ok(())
    }

    /// Collects rows below `bound`; `inclusive` keeps the bound itself.
    pub fn collect_below(&self, bound: &OwnedValue, inclusive: bool, out: &mut RowSet) -> Result<()> {
        let Some(first) = self.tree.first_key().cloned() else {
            return Ok(());
        };
        for (key, set) in self.tree.collect(&first, bound, RangeMode::Closed)? {
            if !inclusive && key == bound {
                continue;
            }
            out.extend(set.iter().cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RowBufferPool;
    use crate::rows::RowBuilder;

    fn row(pool: &RowBufferPool, tag: i32) -> RowRef {
        let mut b = RowBuilder::new(pool);
        b.hash_sink().extend_from_slice(&tag.to_le_bytes());
        RowRef::new(b.finish())
    }

    fn sample() -> (RangeIndex, RowBufferPool) {
        let pool = RowBufferPool::new(4);
        let mut idx = RangeIndex::new(3).unwrap();
        for v in [5, 3, 8, 1, 4, 7, 2, 6] {
            idx.add(OwnedValue::Int4(v), row(&pool, v));
        }
        (idx, pool)
    }

    #[test]
    fn collect_between_is_closed() {
        let (idx, _pool) = sample();
        let mut out = RowSet::default();
        idx.collect_between(&OwnedValue::Int4(3), &OwnedValue::Int4(6), &mut out)
            .unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn comparison_scans_respect_inclusivity() {
        let (idx, _pool) = sample();

        let mut gt = RowSet::default();
        idx.collect_above(&OwnedValue::Int4(6), false, &mut gt).unwrap();
        assert_eq!(gt.len(), 2); // 7, 8

        let mut ge = RowSet::default();
        idx.collect_above(&OwnedValue::Int4(6), true, &mut ge).unwrap();
        assert_eq!(ge.len(), 3);

        let mut lt = RowSet::default();
        idx.collect_below(&OwnedValue::Int4(3), false, &mut lt).unwrap();
        assert_eq!(lt.len(), 2); // 1, 2

        let mut le = RowSet::default();
        idx.collect_below(&OwnedValue::Int4(3), true, &mut le).unwrap();
        assert_eq!(le.len(), 3);
    }

    #[test]
    fn empty_index_yields_empty_scans() {
        let idx = RangeIndex::new(2).unwrap();
        let mut out = RowSet::default();
        idx.collect_above(&OwnedValue::Int4(0), true, &mut out).unwrap();
        idx.collect_below(&OwnedValue::Int4(0), true, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn bucket_collapses_when_last_row_leaves() {
        let pool = RowBufferPool::new(4);
        let mut idx = RangeIndex::new(2).unwrap();
        let a = row(&pool, 1);
        let b = row(&pool, 2);
        idx.add(OwnedValue::Int4(9), a.clone());
        idx.add(OwnedValue::Int4(9), b.clone());
        assert!(idx.remove_exact(&OwnedValue::Int4(9), &a));
        assert_eq!(idx.bucket_count(), 1);
        assert!(idx.remove_exact(&OwnedValue::Int4(9), &b));
        assert_eq!(idx.bucket_count(), 0);
    }
}
