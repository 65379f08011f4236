//! # Column Definitions
//!
//! A `ColumnDef` pairs a `DataType` with the column's name, the index shape
//! built over it, and whether the column participates in the row content
//! hash. Hash participation defaults to "indexed": two rows agreeing on all
//! indexed columns are the same row unless a schema says otherwise.

use super::DataType;

/// Index shape built over a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// No index; the column cannot appear in predicates.
    None,
    /// Hash-map equality index.
    Point,
    /// Ordered B-tree index supporting range scans.
    Range,
    /// Trigram-backed substring index over Text columns.
    Fuzzy,
}

/// Column definition: type, name, index shape, hash participation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    data_type: DataType,
    index: IndexKind,
    hashed: Option<bool>,
}

impl ColumnDef {
    /// Creates an unindexed column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            index: IndexKind::None,
            hashed: None,
        }
    }

    /// Creates a point-indexed column.
    pub fn point(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type).with_index(IndexKind::Point)
    }

    /// Creates a range-indexed column.
    pub fn range(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type).with_index(IndexKind::Range)
    }

    /// Creates a fuzzy-indexed Text column.
    pub fn fuzzy(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Text).with_index(IndexKind::Fuzzy)
    }

    /// Sets the index shape.
    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    /// Overrides hash participation. Without an override, indexed columns
    /// are hashed and unindexed columns are not.
    pub fn hashed(mut self, hashed: bool) -> Self {
        self.hashed = Some(hashed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn index(&self) -> IndexKind {
        self.index
    }

    /// Resolved hash participation.
    pub fn is_hashed(&self) -> bool {
        self.hashed.unwrap_or(self.index != IndexKind::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_defaults_to_indexed() {
        assert!(ColumnDef::point("id", DataType::Int4).is_hashed());
        assert!(!ColumnDef::new("note", DataType::Text).is_hashed());
        assert!(ColumnDef::new("note", DataType::Text).hashed(true).is_hashed());
        assert!(!ColumnDef::range("ts", DataType::Int8).hashed(false).is_hashed());
    }
}
