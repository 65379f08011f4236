//! # Fuzzy Index
//!
//! Equality buckets over Text values plus a trigram posting table answering
//! substring and near-match queries. Bucket maintenance keeps the posting
//! table in lockstep: a value enters the table with its first row and leaves
//! it with its last.

use super::trigram::TrigramTable;
use crate::rows::{RowRef, RowSet};
use crate::types::OwnedValue;
use eyre::{bail, Result};
use hashbrown::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FuzzyIndex {
    buckets: HashMap<Arc<str>, RowSet>,
    grams: TrigramTable,
}

fn text_key(key: &OwnedValue) -> Result<&str> {
    match key.as_text() {
        Some(text) => Ok(text),
        None => bail!("fuzzy index requires Text keys, got {:?}", key.data_type()),
    }
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &OwnedValue, row: RowRef) -> Result<bool> {
        let text = text_key(key)?;
        if let Some(set) = self.buckets.get_mut(text) {
            return Ok(set.insert(row));
        }
        let key: Arc<str> = Arc::from(text);
        self.grams.index(&key);
        let mut set = RowSet::default();
        set.insert(row);
        self.buckets.insert(key, set);
        Ok(true)
    }

    pub fn remove_exact(&mut self, key: &OwnedValue, row: &RowRef) -> Result<bool> {
        let text = text_key(key)?;
        let Some(set) = self.buckets.get_mut(text) else {
            return Ok(false);
        };
        let removed = set.remove(row);
        if set.is_empty() {
            self.buckets.remove(text);
            self.grams.forget(text);
        }
        Ok(removed)
    }

    pub fn remove_bucket(&mut self, key: &OwnedValue) -> Result<Option<RowSet>> {
        let text = text_key(key)?;
        let removed = self.buckets.remove(text);
        if removed.is_some() {
            self.grams.forget(text);
        }
        Ok(removed)
    }

    pub fn restore_bucket(&mut self, key: &OwnedValue, rows: RowSet) -> Result<()> {
        let key: Arc<str> = Arc::from(text_key(key)?);
        self.grams.index(&key);
        self.buckets.insert(key, rows);
        Ok(())
    }

    pub fn get(&self, key: &OwnedValue) -> Result<Option<&RowSet>> {
        Ok(self.buckets.get(text_key(key)?))
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn row_count(&self) -> usize {
        self.buckets.values().map(|s| s.len()).sum()
    }

    /// Rows whose value matches at least `min_match` characters of `query`,
    /// ranked by descending matched length.
    ///
    /// Queries shorter than a trigram window bypass the posting table and
    /// scan bucket keys for containment.
    pub fn fuzzy_search(&self, query: &str, min_match: usize) -> Vec<(RowRef, usize)> {
        let mut ranked: Vec<(&Arc<str>, usize)> = if query.len() < crate::config::TRIGRAM_WIDTH {
            self.buckets
                .keys()
                .filter(|key| !query.is_empty() && key.contains(query))
                .map(|key| (key, query.len()))
                .collect()
        } else {
            let hits = self.grams.search(query);
            hits.into_iter()
                .filter_map(|(key, len)| self.buckets.get_key_value(&*key).map(|(k, _)| (k, len)))
                .collect()
        };
        ranked.retain(|(_, len)| *len >= min_match);
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut out = Vec::new();
        for (key, len) in ranked {
            for row in &self.buckets[key] {
                out.push((row.clone(), len));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RowBufferPool;
    use crate::rows::RowBuilder;

    fn row(pool: &RowBufferPool, tag: &str) -> RowRef {
        let mut b = RowBuilder::new(pool);
        b.hash_sink().extend_from_slice(tag.as_bytes());
        RowRef::new(b.finish())
    }

    fn text(s: &str) -> OwnedValue {
        OwnedValue::Text(s.into())
    }

    #[test]
    fn fuzzy_search_ranks_longer_matches_first() {
        let pool = RowBufferPool::new(4);
        let mut idx = FuzzyIndex::new();
        idx.add(&text("warehouse"), row(&pool, "a")).unwrap();
        idx.add(&text("house"), row(&pool, "b")).unwrap();
        idx.add(&text("mouse"), row(&pool, "c")).unwrap();

        let hits = idx.fuzzy_search("house", 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].1, 5);
        assert_eq!(hits[1].1, 5);
        // "mouse" shares only "ous"/"use" with "house"
        assert!(hits[2].1 < 5);
    }

    #[test]
    fn min_match_filters_weak_hits() {
        let pool = RowBufferPool::new(4);
        let mut idx = FuzzyIndex::new();
        idx.add(&text("abcdef"), row(&pool, "a")).unwrap();
        idx.add(&text("abzzzz"), row(&pool, "b")).unwrap();

        let hits = idx.fuzzy_search("abcdef", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 6);
    }

    #[test]
    fn short_query_falls_back_to_containment() {
        let pool = RowBufferPool::new(4);
        let mut idx = FuzzyIndex::new();
        idx.add(&text("cat"), row(&pool, "a")).unwrap();
        idx.add(&text("dog"), row(&pool, "b")).unwrap();

        let hits = idx.fuzzy_search("at", 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 2);
    }

    #[test]
    fn removing_last_row_forgets_the_value() {
        let pool = RowBufferPool::new(4);
        let mut idx = FuzzyIndex::new();
        let r = row(&pool, "a");
        idx.add(&text("hello"), r.clone()).unwrap();
        idx.remove_exact(&text("hello"), &r).unwrap();

        assert_eq!(idx.bucket_count(), 0);
        assert!(idx.fuzzy_search("hello", 3).is_empty());
    }

    #[test]
    fn non_text_keys_are_rejected() {
        let pool = RowBufferPool::new(4);
        let mut idx = FuzzyIndex::new();
        let err = idx.add(&OwnedValue::Int4(1), row(&pool, "a")).unwrap_err();
        assert!(err.to_string().contains("requires Text keys"));
    }
}
