//! Insertion-ordered label counters.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// A mapping from label to count that remembers first-insertion order.
///
/// Column order in every report is derived from these, so iteration order
/// must be stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `label`.
    pub fn increment(&mut self, label: &str) {
        self.add(label, 1);
    }

    /// Add `count` occurrences of `label`, registering it if unseen.
    pub fn add(&mut self, label: &str, count: usize) {
        match self.index.get(label) {
            Some(&pos) => self.entries[pos].1 += count,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), count));
            }
        }
    }

    /// Count for `label`, zero when absent.
    pub fn get(&self, label: &str) -> usize {
        self.index
            .get(label)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    /// Labels in first-seen order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for Tally {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}
