use std::collections::HashSet;
use std::hash::Hash;

use crate::model::{JobKey, MergeKey, PlayerRecord};

/// Keeps the first record seen for each key, in arrival order.
///
/// The key type picks the policy: [`JobKey`] inside a crawl job,
/// [`MergeKey`] when folding a fresh scrape into a historical dataset.
#[derive(Debug)]
pub struct Deduplicator<K> {
    seen: HashSet<K>,
    records: Vec<PlayerRecord>,
}

pub type JobDeduplicator = Deduplicator<JobKey>;
pub type MergeDeduplicator = Deduplicator<MergeKey>;

impl<K> Default for Deduplicator<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            records: Vec::new(),
        }
    }
}

impl<K> Deduplicator<K>
where
    K: Eq + Hash + for<'r> From<&'r PlayerRecord>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing dataset. Its records are all kept as they are;
    /// their keys only guard what comes after.
    pub fn seeded(existing: Vec<PlayerRecord>) -> Self {
        let seen = existing.iter().map(K::from).collect();
        Self {
            seen,
            records: existing,
        }
    }

    /// Keep `record` unless its key was already seen.
    pub fn push(&mut self, record: PlayerRecord) -> bool {
        let fresh = self.seen.insert(K::from(&record));
        if fresh {
            self.records.push(record);
        }
        fresh
    }

    /// Push every record, returning how many were kept.
    pub fn extend(&mut self, records: impl IntoIterator<Item = PlayerRecord>) -> usize {
        records
            .into_iter()
            .map(|record| self.push(record))
            .filter(|kept| *kept)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PlayerRecord> {
        self.records
    }
}
