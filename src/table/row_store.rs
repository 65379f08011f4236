//! # Row Store
//!
//! The single source of truth for row membership: content hash to row
//! handle. Insert dedup, count-all, and serialize-all read this map; every
//! index is a projection of it that the write transaction keeps in sync.
//!
//! The write guard mirrors the index guards' discipline: eager mutation
//! with an undo journal, commit-or-rollback, rollback on drop.

use crate::rows::RowRef;
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;

#[derive(Debug, Default)]
pub struct RowStore {
    rows: HashMap<u64, RowRef>,
}

impl RowStore {
    pub fn contains(&self, hash: u64) -> bool {
        self.rows.contains_key(&hash)
    }

    pub fn get(&self, hash: u64) -> Option<&RowRef> {
        self.rows.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowRef> {
        self.rows.values()
    }

    fn insert(&mut self, row: RowRef) -> bool {
        self.rows.insert(row.content_hash(), row).is_none()
    }

    fn remove(&mut self, hash: u64) -> Option<RowRef> {
        self.rows.remove(&hash)
    }
}

enum StoreUndo {
    Inserted(u64),
    Removed(RowRef),
    Cleared(HashMap<u64, RowRef>),
}

/// The row store behind its reader/writer lock.
#[derive(Debug, Default)]
pub struct RowStoreCell {
    cell: RwLock<RowStore>,
}

impl RowStoreCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RowStoreReadGuard<'_> {
        RowStoreReadGuard {
            inner: self.cell.read(),
        }
    }

    pub fn write(&self) -> RowStoreWriteGuard<'_> {
        RowStoreWriteGuard {
            inner: self.cell.write(),
            journal: Vec::new(),
            committed: false,
        }
    }
}

pub struct RowStoreReadGuard<'a> {
    inner: RwLockReadGuard<'a, RowStore>,
}

impl Deref for RowStoreReadGuard<'_> {
    type Target = RowStore;

    fn deref(&self) -> &RowStore {
        &self.inner
    }
}

/// Write handle over the row store: eager mutation with an undo journal.
pub struct RowStoreWriteGuard<'a> {
    inner: RwLockWriteGuard<'a, RowStore>,
    journal: Vec<StoreUndo>,
    committed: bool,
}

impl RowStoreWriteGuard<'_> {
    pub fn contains(&self, hash: u64) -> bool {
        self.inner.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn insert(&mut self, row: RowRef) -> bool {
        let hash = row.content_hash();
        let inserted = self.inner.insert(row);
        if inserted {
            self.journal.push(StoreUndo::Inserted(hash));
        }
        inserted
    }

    pub fn remove(&mut self, hash: u64) -> Option<RowRef> {
        let removed = self.inner.remove(hash);
        if let Some(row) = &removed {
            self.journal.push(StoreUndo::Removed(row.clone()));
        }
        removed
    }

    pub fn clear(&mut self) {
        let previous = std::mem::take(&mut self.inner.rows);
        self.journal.push(StoreUndo::Cleared(previous));
    }

    pub fn commit(&mut self) {
        self.committed = true;
        self.journal.clear();
    }
}

impl Drop for RowStoreWriteGuard<'_> {
    fn drop(&mut self) {
        if self.committed || self.journal.is_empty() {
            return;
        }
        log::debug!("rolling back {} row store operation(s)", self.journal.len());
        for undo in std::mem::take(&mut self.journal).into_iter().rev() {
            match undo {
                StoreUndo::Inserted(hash) => {
                    self.inner.remove(hash);
                }
                StoreUndo::Removed(row) => {
                    self.inner.insert(row);
                }
                StoreUndo::Cleared(previous) => {
                    self.inner.rows = previous;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RowBufferPool;
    use crate::rows::RowBuilder;

    fn row(pool: &RowBufferPool, tag: u8) -> RowRef {
        let mut b = RowBuilder::new(pool);
        b.hash_sink().extend_from_slice(&[tag]);
        RowRef::new(b.finish())
    }

    #[test]
    fn dedup_by_content_hash() {
        let pool = RowBufferPool::new(4);
        let cell = RowStoreCell::new();
        let mut w = cell.write();
        assert!(w.insert(row(&pool, 1)));
        assert!(!w.insert(row(&pool, 1)));
        assert!(w.insert(row(&pool, 2)));
        w.commit();
        drop(w);
        assert_eq!(cell.read().len(), 2);
    }

    #[test]
    fn uncommitted_changes_roll_back() {
        let pool = RowBufferPool::new(4);
        let cell = RowStoreCell::new();
        let keep = row(&pool, 1);
        {
            let mut w = cell.write();
            w.insert(keep.clone());
            w.commit();
        }
        {
            let mut w = cell.write();
            w.insert(row(&pool, 2));
            w.remove(keep.content_hash());
            w.clear();
        }
        let r = cell.read();
        assert_eq!(r.len(), 1);
        assert!(r.contains(keep.content_hash()));
    }
}
