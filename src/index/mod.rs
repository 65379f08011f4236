//! # Per-Column Index Family
//!
//! One index per indexed column, in one of three shapes sharing a single
//! contract:
//!
//! | Shape | Backing | Operations |
//! |-------|---------|------------|
//! | `Point` | hash map | `Equal` |
//! | `Range` | B-tree | `Equal` + all comparisons |
//! | `Fuzzy` | hash map + trigram table | `Equal`, `FuzzySearch` |
//!
//! The shape is selected at schema-build time and wrapped in a tagged
//! [`ColumnIndex`]; capability dispatch happens in [`ColumnIndex::execute`],
//! so there is exactly one read path and one write path regardless of shape.
//!
//! ## Guards
//!
//! Every index lives behind its own reader/writer lock inside an
//! [`IndexCell`]. Read guards expose the query surface. Write guards apply
//! mutations eagerly while journaling their inverses; `commit` discards the
//! journal, and dropping an uncommitted guard replays it in reverse: the
//! rollback-by-default discipline the registry's write transaction relies
//! on for all-or-nothing visibility.
//!
//! An index's entries always partition exactly the rows the row store holds
//! for that column once a transaction commits; the journal exists to make
//! that invariant survive mid-transaction failures.

mod fuzzy;
mod point;
mod range;
mod trigram;

pub use fuzzy::FuzzyIndex;
pub use point::PointIndex;
pub use range::RangeIndex;

use crate::query::predicate::CompareOp;
use crate::rows::{RowRef, RowSet};
use crate::types::{IndexKind, OwnedValue};
use eyre::{bail, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;

/// Tagged index shape; see the module docs for the capability table.
#[derive(Debug)]
pub enum ColumnIndex {
    Point(PointIndex),
    Range(RangeIndex),
    Fuzzy(FuzzyIndex),
}

impl ColumnIndex {
    pub fn for_kind(kind: IndexKind, degree: usize) -> Result<Self> {
        Ok(match kind {
            IndexKind::Point => ColumnIndex::Point(PointIndex::new()),
            IndexKind::Range => ColumnIndex::Range(RangeIndex::new(degree)?),
            IndexKind::Fuzzy => ColumnIndex::Fuzzy(FuzzyIndex::new()),
            IndexKind::None => bail!("cannot build an index for an unindexed column"),
        })
    }

    fn add(&mut self, key: OwnedValue, row: RowRef) -> Result<bool> {
        Ok(match self {
            ColumnIndex::Point(idx) => idx.add(key, row),
            ColumnIndex::Range(idx) => idx.add(key, row),
            ColumnIndex::Fuzzy(idx) => idx.add(&key, row)?,
        })
    }

    fn remove_exact(&mut self, key: &OwnedValue, row: &RowRef) -> Result<bool> {
        Ok(match self {
            ColumnIndex::Point(idx) => idx.remove_exact(key, row),
            ColumnIndex::Range(idx) => idx.remove_exact(key, row),
            ColumnIndex::Fuzzy(idx) => idx.remove_exact(key, row)?,
        })
    }

    fn remove_bucket(&mut self, key: &OwnedValue) -> Result<Option<RowSet>> {
        Ok(match self {
            ColumnIndex::Point(idx) => idx.remove_bucket(key),
            ColumnIndex::Range(idx) => idx.remove_bucket(key),
            ColumnIndex::Fuzzy(idx) => idx.remove_bucket(key)?,
        })
    }

    fn restore_bucket(&mut self, key: OwnedValue, rows: RowSet) -> Result<()> {
        match self {
            ColumnIndex::Point(idx) => idx.restore_bucket(key, rows),
            ColumnIndex::Range(idx) => idx.restore_bucket(key, rows),
            ColumnIndex::Fuzzy(idx) => idx.restore_bucket(&key, rows)?,
        }
        Ok(())
    }

    /// Replaces this index with an empty one of the same shape, returning
    /// the previous contents.
    fn reset(&mut self) -> Result<ColumnIndex> {
        let empty = match self {
            ColumnIndex::Point(_) => ColumnIndex::Point(PointIndex::new()),
            ColumnIndex::Range(idx) => ColumnIndex::Range(RangeIndex::new(idx.degree())?),
            ColumnIndex::Fuzzy(_) => ColumnIndex::Fuzzy(FuzzyIndex::new()),
        };
        Ok(std::mem::replace(self, empty))
    }

    /// Total rows across all buckets; every committed transaction leaves
    /// this equal to the row store's population.
    pub fn row_count(&self) -> usize {
        match self {
            ColumnIndex::Point(idx) => idx.row_count(),
            ColumnIndex::Range(idx) => idx.row_count(),
            ColumnIndex::Fuzzy(idx) => idx.row_count(),
        }
    }

    /// Executes one comparison against this index, extending `out` with the
    /// matching rows. Operations outside the shape's capability fail.
    pub fn execute(
        &self,
        op: CompareOp,
        operand: &OwnedValue,
        operand_high: Option<&OwnedValue>,
        min_fuzzy: usize,
        out: &mut RowSet,
    ) -> Result<()> {
        match self {
            ColumnIndex::Point(idx) => match op {
                CompareOp::Equal => {
                    if let Some(set) = idx.get(operand) {
                        out.extend(set.iter().cloned());
                    }
                }
                other => bail!("operation {:?} is not supported by a point index", other),
            },
            ColumnIndex::Range(idx) => match op {
                CompareOp::Equal => {
                    if let Some(set) = idx.get(operand) {
                        out.extend(set.iter().cloned());
                    }
                }
                CompareOp::ClosedBetween => {
                    let high = match operand_high {
                        Some(high) => high,
                        None => bail!("ClosedBetween requires two operands"),
                    };
                    idx.collect_between(operand, high, out)?;
                }
                CompareOp::GreaterThan => idx.collect_above(operand, false, out)?,
                CompareOp::GreaterOrEqualsTo => idx.collect_above(operand, true, out)?,
                CompareOp::LesserThan => idx.collect_below(operand, false, out)?,
                CompareOp::LesserOrEqualsTo => idx.collect_below(operand, true, out)?,
                CompareOp::FuzzySearch => {
                    bail!("operation FuzzySearch is not supported by a range index")
                }
            },
            ColumnIndex::Fuzzy(idx) => match op {
                CompareOp::Equal => {
                    if let Some(set) = idx.get(operand)? {
                        out.extend(set.iter().cloned());
                    }
                }
                CompareOp::FuzzySearch => {
                    let query = match operand.as_text() {
                        Some(query) => query,
                        None => bail!("fuzzy search requires a Text operand"),
                    };
                    for (row, _) in idx.fuzzy_search(query, min_fuzzy) {
                        out.insert(row);
                    }
                }
                other => bail!("operation {:?} is not supported by a fuzzy index", other),
            },
        }
        Ok(())
    }
}

enum IndexUndo {
    Added { key: OwnedValue, row: RowRef },
    Removed { key: OwnedValue, row: RowRef },
    RemovedBucket { key: OwnedValue, rows: RowSet },
    Cleared { previous: ColumnIndex },
}

/// One column's index behind its reader/writer lock.
#[derive(Debug)]
pub struct IndexCell {
    column: usize,
    kind: IndexKind,
    cell: RwLock<ColumnIndex>,
}

impl IndexCell {
    pub fn new(column: usize, kind: IndexKind, degree: usize) -> Result<Self> {
        Ok(Self {
            column,
            kind,
            cell: RwLock::new(ColumnIndex::for_kind(kind, degree)?),
        })
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Scoped read handle; held only while this index is actually queried.
    pub fn read(&self) -> IndexReadGuard<'_> {
        IndexReadGuard {
            inner: self.cell.read(),
        }
    }

    /// Scoped write handle; rolls back on drop unless committed.
    pub fn write(&self) -> IndexWriteGuard<'_> {
        IndexWriteGuard {
            inner: self.cell.write(),
            journal: Vec::new(),
            committed: false,
        }
    }
}

pub struct IndexReadGuard<'a> {
    inner: RwLockReadGuard<'a, ColumnIndex>,
}

impl Deref for IndexReadGuard<'_> {
    type Target = ColumnIndex;

    fn deref(&self) -> &ColumnIndex {
        &self.inner
    }
}

/// Write handle over one index: eager mutation with an undo journal.
pub struct IndexWriteGuard<'a> {
    inner: RwLockWriteGuard<'a, ColumnIndex>,
    journal: Vec<IndexUndo>,
    committed: bool,
}

impl IndexWriteGuard<'_> {
    /// The index as the read path sees it, including in-transaction effects.
    pub fn index(&self) -> &ColumnIndex {
        &self.inner
    }

    pub fn add(&mut self, key: OwnedValue, row: RowRef) -> Result<()> {
        if self.inner.add(key.clone(), row.clone())? {
            self.journal.push(IndexUndo::Added { key, row });
        }
        Ok(())
    }

    pub fn remove_exact(&mut self, key: &OwnedValue, row: &RowRef) -> Result<()> {
        if self.inner.remove_exact(key, row)? {
            self.journal.push(IndexUndo::Removed {
                key: key.clone(),
                row: row.clone(),
            });
        }
        Ok(())
    }

    /// Removes every row under one value.
    pub fn remove(&mut self, key: &OwnedValue) -> Result<usize> {
        match self.inner.remove_bucket(key)? {
            Some(rows) => {
                let count = rows.len();
                self.journal.push(IndexUndo::RemovedBucket {
                    key: key.clone(),
                    rows,
                });
                Ok(count)
            }
            None => Ok(0),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        let previous = self.inner.reset()?;
        self.journal.push(IndexUndo::Cleared { previous });
        Ok(())
    }

    /// Makes every mutation since acquisition permanent.
    pub fn commit(&mut self) {
        self.committed = true;
        self.journal.clear();
    }

    /// Explicit rollback; equivalent to dropping without commit.
    pub fn rollback(self) {}
}

impl Drop for IndexWriteGuard<'_> {
    fn drop(&mut self) {
        if self.committed || self.journal.is_empty() {
            return;
        }
        log::debug!("rolling back {} index operation(s)", self.journal.len());
        for undo in std::mem::take(&mut self.journal).into_iter().rev() {
            let outcome = match undo {
                IndexUndo::Added { key, row } => {
                    self.inner.remove_exact(&key, &row).map(|_| ())
                }
                IndexUndo::Removed { key, row } => self.inner.add(key, row).map(|_| ()),
                IndexUndo::RemovedBucket { key, rows } => self.inner.restore_bucket(key, rows),
                IndexUndo::Cleared { previous } => {
                    *self.inner = previous;
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                // Keep unwinding; rollback is best-effort and must not
                // mask the error that triggered it.
                log::warn!("index rollback step failed: {err}");
            }
        }
    }
}
