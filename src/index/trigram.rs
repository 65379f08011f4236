//! # Trigram Match Table
//!
//! The matching collaborator behind the fuzzy index: a posting table from
//! every 3-byte window of an indexed string to the set of strings containing
//! it. A common substring of length `L` shares `L - 2` trigrams, so the
//! number of postings a query hits approximates the longest overlap with
//! each candidate; `matched_len` reports that estimate, capped at both the
//! candidate's and the query's length.
//!
//! Queries shorter than one trigram window cannot hit the posting table and
//! fall back to a containment scan over the bucket keys.

use crate::config::TRIGRAM_WIDTH;
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;

type Trigram = [u8; TRIGRAM_WIDTH];

#[derive(Debug, Default)]
pub(crate) struct TrigramTable {
    postings: HashMap<Trigram, HashSet<Arc<str>>>,
}

fn trigrams(text: &str) -> impl Iterator<Item = Trigram> + '_ {
    text.as_bytes()
        .windows(TRIGRAM_WIDTH)
        .map(|w| w.try_into().expect("window width mismatch"))
}

impl TrigramTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an indexed string in the posting table.
    pub fn index(&mut self, key: &Arc<str>) {
        for gram in trigrams(key) {
            self.postings.entry(gram).or_default().insert(Arc::clone(key));
        }
    }

    /// Removes an indexed string from the posting table.
    pub fn forget(&mut self, key: &str) {
        for gram in trigrams(key) {
            if let Some(set) = self.postings.get_mut(&gram) {
                set.remove(key);
                if set.is_empty() {
                    self.postings.remove(&gram);
                }
            }
        }
    }

    /// Estimated matched length per candidate containing part of `query`.
    pub fn search(&self, query: &str) -> HashMap<Arc<str>, usize> {
        let mut shared: HashMap<Arc<str>, usize> = HashMap::new();
        let unique: HashSet<Trigram> = trigrams(query).collect();
        for gram in &unique {
            if let Some(keys) = self.postings.get(gram) {
                for key in keys {
                    *shared.entry(Arc::clone(key)).or_insert(0) += 1;
                }
            }
        }
        shared
            .into_iter()
            .map(|(key, count)| {
                let len = (count + TRIGRAM_WIDTH - 1).min(key.len()).min(query.len());
                (key, len)
            })
            .collect()
    }
}
