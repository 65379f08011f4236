//! # Table Schema
//!
//! `TableSchema` fixes the physical layout of a table's rows at construction:
//! per-column byte offsets (the sum of all prior columns' slot widths), the
//! total row width, which columns feed the content hash, and which occupy a
//! variable-length surrogate slot.
//!
//! Offsets double as the column identifiers predicates use on the wire, so
//! the schema also carries the reverse offset-to-column lookup.

use crate::types::{ColumnDef, DataType, IndexKind};
use eyre::{bail, ensure, Result};
use hashbrown::HashMap;

#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    offsets: Vec<usize>,
    row_size: usize,
    var_slots: Vec<Option<usize>>,
    var_count: usize,
    hashed_columns: Vec<usize>,
    by_offset: HashMap<u32, usize>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        ensure!(!columns.is_empty(), "a schema requires at least one column");

        let mut offsets = Vec::with_capacity(columns.len());
        let mut var_slots = Vec::with_capacity(columns.len());
        let mut hashed_columns = Vec::new();
        let mut by_offset = HashMap::with_capacity(columns.len());
        let mut offset = 0usize;
        let mut var_count = 0usize;

        for (idx, col) in columns.iter().enumerate() {
            if col.index() == IndexKind::Fuzzy && col.data_type() != DataType::Text {
                bail!(
                    "column '{}': fuzzy index requires a Text column, got {:?}",
                    col.name(),
                    col.data_type()
                );
            }
            if columns[..idx].iter().any(|c| c.name() == col.name()) {
                bail!("duplicate column name '{}'", col.name());
            }

            offsets.push(offset);
            by_offset.insert(offset as u32, idx);
            if col.data_type().is_variable() {
                var_slots.push(Some(var_count));
                var_count += 1;
            } else {
                var_slots.push(None);
            }
            if col.is_hashed() {
                hashed_columns.push(idx);
            }
            offset += col.data_type().slot_width();
        }

        ensure!(
            !hashed_columns.is_empty(),
            "a schema requires at least one hashed or indexed column"
        );

        Ok(Self {
            columns,
            offsets,
            row_size: offset,
            var_slots,
            var_count,
            hashed_columns,
            by_offset,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> &ColumnDef {
        &self.columns[idx]
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Byte offset of the column's slot inside a row buffer.
    pub fn offset(&self, idx: usize) -> usize {
        self.offsets[idx]
    }

    /// The offset a predicate uses to address this column on the wire.
    pub fn column_offset(&self, idx: usize) -> u32 {
        self.offsets[idx] as u32
    }

    /// Total fixed width of one row buffer.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Side-table slot for a variable-length column.
    pub fn var_slot(&self, idx: usize) -> Option<usize> {
        self.var_slots[idx]
    }

    /// Number of variable-length columns.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Columns feeding the content hash, in schema order.
    pub fn hashed_columns(&self) -> &[usize] {
        &self.hashed_columns
    }

    /// Resolves a wire column offset back to a column index.
    pub fn column_at_offset(&self, offset: u32) -> Result<usize> {
        match self.by_offset.get(&offset) {
            Some(&idx) => Ok(idx),
            None => bail!("no column starts at byte offset {}", offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_slot_widths() {
        let schema = TableSchema::new(vec![
            ColumnDef::range("a", DataType::Int4),
            ColumnDef::point("b", DataType::Int8),
            ColumnDef::point("c", DataType::Text),
            ColumnDef::new("d", DataType::Int2),
        ])
        .unwrap();

        assert_eq!(schema.offset(0), 0);
        assert_eq!(schema.offset(1), 4);
        assert_eq!(schema.offset(2), 12);
        assert_eq!(schema.offset(3), 20);
        assert_eq!(schema.row_size(), 22);
    }

    #[test]
    fn var_slots_are_assigned_in_schema_order() {
        let schema = TableSchema::new(vec![
            ColumnDef::point("id", DataType::Int4),
            ColumnDef::point("name", DataType::Text),
            ColumnDef::new("age", DataType::Int2).hashed(true),
            ColumnDef::new("bio", DataType::Blob).hashed(true),
        ])
        .unwrap();

        assert_eq!(schema.var_slot(0), None);
        assert_eq!(schema.var_slot(1), Some(0));
        assert_eq!(schema.var_slot(2), None);
        assert_eq!(schema.var_slot(3), Some(1));
        assert_eq!(schema.var_count(), 2);
    }

    #[test]
    fn hashed_defaults_to_indexed_columns() {
        let schema = TableSchema::new(vec![
            ColumnDef::range("k", DataType::Int8),
            ColumnDef::new("payload", DataType::Blob),
        ])
        .unwrap();
        assert_eq!(schema.hashed_columns(), &[0]);
    }

    #[test]
    fn offset_lookup_round_trips() {
        let schema = TableSchema::new(vec![
            ColumnDef::range("a", DataType::Int4),
            ColumnDef::point("b", DataType::Text),
        ])
        .unwrap();
        assert_eq!(schema.column_at_offset(0).unwrap(), 0);
        assert_eq!(schema.column_at_offset(4).unwrap(), 1);
        assert!(schema.column_at_offset(2).is_err());
    }

    #[test]
    fn fuzzy_requires_text() {
        let err = TableSchema::new(vec![
            ColumnDef::new("n", DataType::Int4).with_index(IndexKind::Fuzzy)
        ])
        .unwrap_err();
        assert!(err.to_string().contains("fuzzy index requires a Text column"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = TableSchema::new(vec![
            ColumnDef::point("x", DataType::Int4),
            ColumnDef::point("x", DataType::Int8),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }
}
