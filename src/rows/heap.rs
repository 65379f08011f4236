//! # Variable-Length Side Tables
//!
//! Variable-length column values (Text, Blob) do not live in the row buffer.
//! Each such column owns a `VarHeap`: a monotonically keyed table mapping a
//! surrogate id, the 8 bytes actually stored inline, to the heap payload.
//!
//! Surrogate id 0 is reserved as the null surrogate a fresh row buffer holds
//! before its first decode; it never resolves. Ids are never reused, so a
//! stale surrogate from a row deleted elsewhere fails loudly instead of
//! silently aliasing a newer value.
//!
//! ## Undo Journal
//!
//! `VarStore` bundles every column's heap behind the single write lock the
//! registry's transaction takes. While a journal is active, each mutation
//! records its inverse; rollback replays the journal in reverse, so a failed
//! transaction releases exactly the entries it allocated and restores exactly
//! the entries it released. Commit discards the journal and cannot fail.

use eyre::{bail, Result};
use hashbrown::HashMap;

/// Side table for one variable-length column.
#[derive(Debug, Default)]
pub struct VarHeap {
    entries: HashMap<u64, Box<[u8]>>,
    next_id: u64,
}

impl VarHeap {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            // id 0 is the null surrogate
            next_id: 1,
        }
    }

    fn alloc(&mut self, bytes: Box<[u8]>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, bytes);
        id
    }

    fn get(&self, id: u64) -> Result<&[u8]> {
        match self.entries.get(&id) {
            Some(bytes) => Ok(bytes),
            None => bail!("surrogate {} does not resolve to a live entry", id),
        }
    }

    fn release(&mut self, id: u64) -> Result<Box<[u8]>> {
        match self.entries.remove(&id) {
            Some(bytes) => Ok(bytes),
            None => bail!("surrogate {} released twice or never allocated", id),
        }
    }

    fn restore(&mut self, id: u64, bytes: Box<[u8]>) {
        self.entries.insert(id, bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
enum HeapUndo {
    Alloc { slot: usize, id: u64 },
    Released { slot: usize, id: u64, bytes: Box<[u8]> },
    Cleared { entries: Vec<HashMap<u64, Box<[u8]>>> },
}

/// All side tables of one table, plus the active transaction journal.
#[derive(Debug)]
pub struct VarStore {
    heaps: Vec<VarHeap>,
    journal: Option<Vec<HeapUndo>>,
}

impl VarStore {
    pub fn new(var_count: usize) -> Self {
        Self {
            heaps: (0..var_count).map(|_| VarHeap::new()).collect(),
            journal: None,
        }
    }

    pub fn heap(&self, slot: usize) -> &VarHeap {
        &self.heaps[slot]
    }

    /// Starts journaling mutations. Exactly one journal may be active; the
    /// registry's global write lock enforces single-writer.
    pub fn begin(&mut self) {
        debug_assert!(self.journal.is_none(), "nested var-store transaction");
        self.journal = Some(Vec::new());
    }

    /// Discards the journal, making every mutation since `begin` permanent.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Replays the journal in reverse, undoing every mutation since `begin`.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                HeapUndo::Alloc { slot, id } => {
                    // allocation may already have been released in-txn
                    let _ = self.heaps[slot].entries.remove(&id);
                }
                HeapUndo::Released { slot, id, bytes } => {
                    self.heaps[slot].restore(id, bytes);
                }
                HeapUndo::Cleared { entries } => {
                    for (heap, saved) in self.heaps.iter_mut().zip(entries) {
                        heap.entries = saved;
                    }
                }
            }
        }
    }

    /// Allocates a new entry, returning its surrogate id.
    pub fn insert(&mut self, slot: usize, bytes: &[u8]) -> u64 {
        let id = self.heaps[slot].alloc(bytes.into());
        if let Some(journal) = &mut self.journal {
            journal.push(HeapUndo::Alloc { slot, id });
        }
        id
    }

    pub fn get(&self, slot: usize, id: u64) -> Result<&[u8]> {
        self.heaps[slot].get(id)
    }

    /// Releases the entry behind a surrogate id.
    pub fn release(&mut self, slot: usize, id: u64) -> Result<()> {
        let bytes = self.heaps[slot].release(id)?;
        if let Some(journal) = &mut self.journal {
            journal.push(HeapUndo::Released { slot, id, bytes });
        }
        Ok(())
    }

    /// Drops every entry in every heap. Surrogate counters keep advancing.
    pub fn clear_all(&mut self) {
        let entries: Vec<_> = self
            .heaps
            .iter_mut()
            .map(|h| std::mem::take(&mut h.entries))
            .collect();
        if let Some(journal) = &mut self.journal {
            journal.push(HeapUndo::Cleared { entries });
        }
    }

    /// Total live entries across all heaps.
    pub fn total_len(&self) -> usize {
        self.heaps.iter().map(|h| h.len()).sum()
    }
}
