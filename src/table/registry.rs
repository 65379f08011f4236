//! # Table Registry
//!
//! The orchestration layer tying schema, codecs, row store, side tables,
//! and the per-column indices into one table with the external operation
//! surface: insert, bulk insert, aggregate, conditional count/delete,
//! count-all, clear, serialize-all.
//!
//! ## Write Transactions
//!
//! Every mutation runs under one `WriteTxn`: write guards over the row
//! store, the variable-length store, and every index, acquired up front in
//! a fixed order. All guards journal their mutations; `commit` makes the
//! batch permanent everywhere, and dropping the transaction on any error
//! path rolls every guard back. Writers therefore serialize globally and
//! no partial commit is ever visible.
//!
//! ## Read Locking
//!
//! Aggregation holds no global lock. Each `UNARY` leaf takes its column's
//! read lock only while that index is queried, so reads over disjoint
//! columns run concurrently, and a multi-column predicate observes each
//! column at the moment it is visited, not one table-wide snapshot. A
//! writer committing between two visits can yield a combined result no
//! single instant would produce; callers needing stronger guarantees must
//! serialize externally.
//!
//! ## Insert & Dedup
//!
//! Insert decodes the candidate into a pooled buffer, hashing the hashed
//! columns' wire bytes as they stream in. A candidate whose content hash
//! already lives in the row store is silently dropped (not an error) and
//! its side-table entries are released on the spot.

use crate::config::{DEFAULT_BTREE_DEGREE, DEFAULT_MIN_FUZZY_MATCH, MIN_BTREE_DEGREE};
use crate::encoding::{ByteReader, ByteWriter};
use crate::index::{IndexCell, IndexWriteGuard};
use crate::memory::{RowBufferPool, ScratchPool};
use crate::query::eval;
use crate::query::predicate::{self, UnaryPredicate};
use crate::rows::{ColumnCodec, RowBuilder, RowRef, RowSet, TableSchema, VarStore};
use crate::table::row_store::RowStoreCell;
use crate::types::{ColumnDef, IndexKind, OwnedValue};
use eyre::{bail, ensure, Result};
use parking_lot::{RwLock, RwLockWriteGuard};

pub struct Table {
    schema: TableSchema,
    codecs: Vec<ColumnCodec>,
    rows: RowStoreCell,
    vars: RwLock<VarStore>,
    indices: Vec<IndexCell>,
    slot_of_column: Vec<Option<usize>>,
    row_pool: RowBufferPool,
    scratch: ScratchPool,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// One write transaction: every write guard, acquired up front.
struct WriteTxn<'t> {
    rows: crate::table::row_store::RowStoreWriteGuard<'t>,
    vars: RwLockWriteGuard<'t, VarStore>,
    indices: Vec<IndexWriteGuard<'t>>,
    committed: bool,
}

impl WriteTxn<'_> {
    fn commit(mut self) {
        self.rows.commit();
        self.vars.commit();
        for index in &mut self.indices {
            index.commit();
        }
        self.committed = true;
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("write transaction rolled back");
            self.vars.rollback();
            // row store and index guards roll back in their own Drop
        }
    }
}

impl Table {
    /// Builds a table with the default range-index branching factor.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Table> {
        Self::with_degree(columns, DEFAULT_BTREE_DEGREE)
    }

    /// Builds a table, choosing the range-index branching factor.
    pub fn with_degree(columns: Vec<ColumnDef>, degree: usize) -> Result<Table> {
        ensure!(
            degree >= MIN_BTREE_DEGREE,
            "degree {} below minimum {}",
            degree,
            MIN_BTREE_DEGREE
        );
        let schema = TableSchema::new(columns)?;
        let codecs = ColumnCodec::for_schema(&schema);

        let mut indices = Vec::new();
        let mut slot_of_column = vec![None; schema.column_count()];
        for column in 0..schema.column_count() {
            let kind = schema.column(column).index();
            if kind != IndexKind::None {
                slot_of_column[column] = Some(indices.len());
                indices.push(IndexCell::new(column, kind, degree)?);
            }
        }

        let row_pool = RowBufferPool::new(schema.row_size());
        let vars = RwLock::new(VarStore::new(schema.var_count()));

        Ok(Table {
            schema,
            codecs,
            rows: RowStoreCell::new(),
            vars,
            indices,
            slot_of_column,
            row_pool,
            scratch: ScratchPool::new(),
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Total live rows.
    pub fn count(&self) -> u64 {
        self.rows.read().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Rows currently indexed for a column, or `None` when unindexed.
    /// After any committed write this equals `count()`, the consistency
    /// invariant the transaction layer exists to uphold.
    pub fn index_row_count(&self, column: usize) -> Option<u64> {
        let slot = *self.slot_of_column.get(column)?;
        slot.map(|slot| self.indices[slot].read().row_count() as u64)
    }

    fn begin_write(&self) -> WriteTxn<'_> {
        let rows = self.rows.write();
        let mut vars = self.vars.write();
        vars.begin();
        let indices = self.indices.iter().map(|cell| cell.write()).collect();
        WriteTxn {
            rows,
            vars,
            indices,
            committed: false,
        }
    }

    /// Decodes and stages one row inside the open transaction. Duplicates
    /// are dropped silently and report `false`.
    fn insert_decoded(&self, txn: &mut WriteTxn<'_>, reader: &mut ByteReader<'_>) -> Result<bool> {
        let mut builder = RowBuilder::new(&self.row_pool);
        for codec in &self.codecs {
            codec.init_default(builder.buf_mut());
            codec.decode(reader, &mut builder, &mut txn.vars)?;
        }
        let row = builder.finish();

        if txn.rows.contains(row.content_hash()) {
            for codec in &self.codecs {
                if let Err(err) = codec.destroy(row.data(), &mut txn.vars) {
                    log::warn!("duplicate row cleanup failed: {err}");
                }
            }
            return Ok(false);
        }

        let row = RowRef::new(row);
        txn.rows.insert(row.clone());
        for (slot, cell) in self.indices.iter().enumerate() {
            let key = self.codecs[cell.column()].read_value(row.data(), &txn.vars)?;
            txn.indices[slot].add(key, row.clone())?;
        }
        Ok(true)
    }

    /// Inserts one encoded row. Returns false when an identical row (by
    /// content hash) already exists.
    pub fn insert(&self, row_bytes: &[u8]) -> Result<bool> {
        let mut reader = ByteReader::new(row_bytes);
        let mut txn = self.begin_write();
        let inserted = self.insert_decoded(&mut txn, &mut reader)?;
        ensure!(reader.is_empty(), "trailing bytes after encoded row");
        txn.commit();
        Ok(inserted)
    }

    /// Inserts a counted stream of encoded rows in one transaction,
    /// returning how many were actually inserted after dedup.
    pub fn bulk_insert(&self, payload: &[u8]) -> Result<u64> {
        let mut reader = ByteReader::new(payload);
        let count = reader.read_u32()?;
        let mut txn = self.begin_write();
        let mut inserted = 0u64;
        for _ in 0..count {
            if self.insert_decoded(&mut txn, &mut reader)? {
                inserted += 1;
            }
        }
        ensure!(reader.is_empty(), "trailing bytes after {} encoded rows", count);
        txn.commit();
        Ok(inserted)
    }

    /// Resolves a predicate leaf to its index slot, failing on a type tag
    /// mismatch or an unindexed column.
    fn resolve_unary(&self, unary: &UnaryPredicate) -> Result<usize> {
        let column = self.schema.column_at_offset(unary.offset)?;
        let def = self.schema.column(column);
        if unary.ty != def.data_type() {
            bail!(
                "mismatched data type for column '{}': predicate has {:?}, column is {:?}",
                def.name(),
                unary.ty,
                def.data_type()
            );
        }
        match self.slot_of_column[column] {
            Some(slot) => Ok(slot),
            None => bail!("column '{}' is not indexed", def.name()),
        }
    }

    /// Evaluates an encoded predicate under lazy per-index read locks.
    fn collect_matching(&self, predicate_bytes: &[u8]) -> Result<RowSet> {
        let mut scratch_guard = self.scratch.acquire();
        let scratch = &mut *scratch_guard;
        let mut reader = ByteReader::new(predicate_bytes);
        let pred = predicate::decode(&mut reader, &scratch.arena)?;
        ensure!(reader.is_empty(), "trailing bytes after encoded predicate");

        let mut fetch = |unary: &UnaryPredicate| -> Result<RowSet> {
            let slot = self.resolve_unary(unary)?;
            let mut out = RowSet::default();
            // the read lock lives exactly as long as this one index visit
            let guard = self.indices[slot].read();
            guard.execute(
                unary.op,
                &unary.operand,
                unary.operand_high.as_ref(),
                DEFAULT_MIN_FUZZY_MATCH,
                &mut out,
            )?;
            Ok(out)
        };
        let matched = eval::evaluate(pred, &mut fetch, &mut scratch.set)?;
        Ok(matched.unwrap_or_default())
    }

    /// Rows matching an encoded predicate, decoded lazily.
    pub fn aggregate(&self, predicate_bytes: &[u8]) -> Result<Rows<'_>> {
        let matched = self.collect_matching(predicate_bytes)?;
        Ok(Rows {
            table: self,
            matched: matched.into_iter().collect::<Vec<_>>().into_iter(),
        })
    }

    /// Number of rows matching an encoded predicate.
    pub fn count_where(&self, predicate_bytes: &[u8]) -> Result<u64> {
        Ok(self.collect_matching(predicate_bytes)?.len() as u64)
    }

    /// Deletes every row matching an encoded predicate, returning the
    /// deleted count.
    pub fn delete_where(&self, predicate_bytes: &[u8]) -> Result<u64> {
        let mut scratch_guard = self.scratch.acquire();
        let scratch = &mut *scratch_guard;
        let mut reader = ByteReader::new(predicate_bytes);
        let pred = predicate::decode(&mut reader, &scratch.arena)?;
        ensure!(reader.is_empty(), "trailing bytes after encoded predicate");

        let mut txn = self.begin_write();
        let matched = {
            let txn = &txn;
            let mut fetch = |unary: &UnaryPredicate| -> Result<RowSet> {
                let slot = self.resolve_unary(unary)?;
                let mut out = RowSet::default();
                txn.indices[slot].index().execute(
                    unary.op,
                    &unary.operand,
                    unary.operand_high.as_ref(),
                    DEFAULT_MIN_FUZZY_MATCH,
                    &mut out,
                )?;
                Ok(out)
            };
            eval::evaluate(pred, &mut fetch, &mut scratch.set)?.unwrap_or_default()
        };

        for row in &matched {
            ensure!(
                txn.rows.remove(row.content_hash()).is_some(),
                "matched row missing from the row store"
            );
            for (slot, cell) in self.indices.iter().enumerate() {
                let key = self.codecs[cell.column()].read_value(row.data(), &txn.vars)?;
                txn.indices[slot].remove_exact(&key, row)?;
            }
            for codec in &self.codecs {
                codec.destroy(row.data(), &mut txn.vars)?;
            }
        }
        txn.commit();
        Ok(matched.len() as u64)
    }

    /// Removes every row in one pass, returning the removed count.
    pub fn clear(&self) -> Result<u64> {
        let mut txn = self.begin_write();
        let count = txn.rows.len() as u64;
        txn.rows.clear();
        txn.vars.clear_all();
        for index in &mut txn.indices {
            index.clear()?;
        }
        txn.commit();
        Ok(count)
    }

    /// Serializes every column of every row in schema order, prefixed with
    /// the row count; this is the exact stream `bulk_insert` reloads.
    pub fn serialize_all(&self) -> Result<Vec<u8>> {
        let rows = self.rows.read();
        let vars = self.vars.read();
        let mut writer = ByteWriter::with_capacity(4 + rows.len() * self.schema.row_size());
        writer.write_u32(rows.len() as u32);
        for row in rows.iter() {
            for codec in &self.codecs {
                codec.serialize(row.data(), &vars, &mut writer)?;
            }
        }
        Ok(writer.into_vec())
    }

    fn decode_row(&self, row: &RowRef) -> Result<Vec<OwnedValue>> {
        let vars = self.vars.read();
        self.codecs
            .iter()
            .map(|codec| codec.read_value(row.data(), &vars))
            .collect()
    }
}

/// Lazily-decoding cursor over an aggregation's matched rows.
///
/// The match set is fixed at aggregation time; each `next` decodes one row
/// under a fresh side-table read lock. A row deleted between aggregation
/// and iteration yields an error item for that row instead of a value.
pub struct Rows<'t> {
    table: &'t Table,
    matched: std::vec::IntoIter<RowRef>,
}

impl Rows<'_> {
    /// Matched rows not yet decoded.
    pub fn remaining(&self) -> usize {
        self.matched.len()
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Vec<OwnedValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.matched.next()?;
        Some(self.table.decode_row(&row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.matched.size_hint()
    }
}

impl ExactSizeIterator for Rows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::PredicateExpr;
    use crate::rows::encode_row;
    use crate::types::DataType;

    fn table() -> Table {
        Table::new(vec![
            ColumnDef::range("col1", DataType::Int4),
            ColumnDef::point("col2", DataType::Text),
        ])
        .unwrap()
    }

    fn encode(table: &Table, id: i32, name: &str) -> Vec<u8> {
        let mut w = ByteWriter::new();
        encode_row(
            table.schema(),
            &[OwnedValue::Int4(id), OwnedValue::Text(name.into())],
            &mut w,
        )
        .unwrap();
        w.into_vec()
    }

    #[test]
    fn duplicate_insert_is_dropped_silently() {
        let t = table();
        assert!(t.insert(&encode(&t, 1, "a")).unwrap());
        assert!(t.insert(&encode(&t, 2, "b")).unwrap());
        assert!(!t.insert(&encode(&t, 1, "a")).unwrap());
        assert_eq!(t.count(), 2);
        // the duplicate's side entries were released
        assert_eq!(t.vars.read().total_len(), 2);
    }

    #[test]
    fn failed_insert_rolls_back_everything() {
        let t = table();
        t.insert(&encode(&t, 1, "a")).unwrap();

        let mut bad = encode(&t, 2, "b");
        bad.truncate(bad.len() - 1);
        assert!(t.insert(&bad).is_err());

        // a trailing-garbage row also rolls back
        let mut trailing = encode(&t, 3, "c");
        trailing.push(0xAA);
        assert!(t.insert(&trailing).is_err());

        assert_eq!(t.count(), 1);
        assert_eq!(t.index_row_count(0), Some(1));
        assert_eq!(t.index_row_count(1), Some(1));
        assert_eq!(t.vars.read().total_len(), 1);
    }

    #[test]
    fn degree_below_minimum_fails_construction() {
        let err = Table::with_degree(
            vec![ColumnDef::range("k", DataType::Int8)],
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("below minimum"));
    }

    #[test]
    fn predicates_on_unindexed_columns_fail() {
        let t = Table::new(vec![
            ColumnDef::range("a", DataType::Int4),
            ColumnDef::new("b", DataType::Int8).hashed(true),
        ])
        .unwrap();
        let offset = t.schema().column_offset(1);
        let err = t
            .count_where(&PredicateExpr::equal(offset, OwnedValue::Int8(1)).encode_to_vec())
            .unwrap_err();
        assert!(err.to_string().contains("is not indexed"));
    }

    #[test]
    fn type_tag_mismatch_fails() {
        let t = table();
        let err = t
            .count_where(&PredicateExpr::equal(0, OwnedValue::Int8(1)).encode_to_vec())
            .unwrap_err();
        assert!(err.to_string().contains("mismatched data type"));
    }
}
