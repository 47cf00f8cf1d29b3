//! Immutable property snapshots and the differences between them

use super::Locator;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Flat, ordered string map
pub type Properties = BTreeMap<String, String>;

/// Fully merged, un-expanded property set at one point in time
///
/// A snapshot is never mutated once published. Reloads build a new one and
/// swap it in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    properties: Properties,
    version: u64,
    loaded_at: DateTime<Utc>,
    sources: Vec<Locator>,
}

impl Snapshot {
    /// Create a snapshot
    pub fn new(properties: Properties, version: u64, sources: Vec<Locator>) -> Self {
        Self {
            properties,
            version,
            loaded_at: Utc::now(),
            sources,
        }
    }

    /// Raw (un-expanded) value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// All properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Monotonic version, starting at 1 for the initial load
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When this snapshot was built
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Sources that contributed data
    pub fn contributing_sources(&self) -> &[Locator] {
        &self.sources
    }

    /// New snapshot with `changes` applied on top of this one
    pub fn apply(&self, changes: &ChangeSet, version: u64, sources: Vec<Locator>) -> Self {
        let mut properties = self.properties.clone();
        for change in changes {
            match &change.new_value {
                Some(value) => properties.insert(change.key.clone(), value.clone()),
                None => properties.remove(&change.key),
            };
        }
        Self::new(properties, version, sources)
    }
}

/// Kind of a single key-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Key absent before, present now
    Added,
    /// Key present before, absent now
    Removed,
    /// Key present in both with different values
    Modified,
}

/// One key-level difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    /// Property key
    pub key: String,
    /// Value before the change
    pub old_value: Option<String>,
    /// Value after the change
    pub new_value: Option<String>,
}

impl PropertyChange {
    /// Kind of this change
    pub fn kind(&self) -> ChangeKind {
        match (&self.old_value, &self.new_value) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Removed,
            _ => ChangeKind::Modified,
        }
    }
}

/// Ordered (by key) list of differences between two property maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<PropertyChange>,
}

impl ChangeSet {
    /// Compute the differences going from `old` to `new`
    pub fn diff(old: &Properties, new: &Properties) -> Self {
        let mut changes = Vec::new();
        let mut old_iter = old.iter().peekable();
        let mut new_iter = new.iter().peekable();

        loop {
            let order = match (old_iter.peek(), new_iter.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((ok, _)), Some((nk, _))) => ok.cmp(nk),
            };
            match order {
                Ordering::Less => {
                    if let Some((key, value)) = old_iter.next() {
                        changes.push(PropertyChange {
                            key: key.clone(),
                            old_value: Some(value.clone()),
                            new_value: None,
                        });
                    }
                }
                Ordering::Greater => {
                    if let Some((key, value)) = new_iter.next() {
                        changes.push(PropertyChange {
                            key: key.clone(),
                            old_value: None,
                            new_value: Some(value.clone()),
                        });
                    }
                }
                Ordering::Equal => {
                    if let (Some((key, old_value)), Some((_, new_value))) =
                        (old_iter.next(), new_iter.next())
                        && old_value != new_value
                    {
                        changes.push(PropertyChange {
                            key: key.clone(),
                            old_value: Some(old_value.clone()),
                            new_value: Some(new_value.clone()),
                        });
                    }
                }
            }
        }

        Self { changes }
    }

    /// Check whether there are no changes
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterate over changes
    pub fn iter(&self) -> std::slice::Iter<'_, PropertyChange> {
        self.changes.iter()
    }

    /// Change for a given key
    pub fn get(&self, key: &str) -> Option<&PropertyChange> {
        self.changes
            .binary_search_by(|c| c.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.changes[i])
    }

    /// Drop the change for a key, keeping its old value in effect
    pub(crate) fn remove(&mut self, key: &str) -> Option<PropertyChange> {
        let index = self
            .changes
            .binary_search_by(|c| c.key.as_str().cmp(key))
            .ok()?;
        Some(self.changes.remove(index))
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a PropertyChange;
    type IntoIter = std::slice::Iter<'a, PropertyChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_diff_added_removed_modified() {
        let old = props(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = props(&[("b", "2"), ("c", "30"), ("d", "4")]);
        let diff = ChangeSet::diff(&old, &new);

        let summary: Vec<_> = diff.iter().map(|c| (c.key.as_str(), c.kind())).collect();
        assert_eq!(
            summary,
            vec![
                ("a", ChangeKind::Removed),
                ("c", ChangeKind::Modified),
                ("d", ChangeKind::Added),
            ]
        );
        assert_eq!(diff.get("c").unwrap().new_value.as_deref(), Some("30"));
        assert!(diff.get("b").is_none());
    }

    #[test]
    fn test_diff_of_equal_maps_is_empty() {
        let map = props(&[("x", "1")]);
        assert!(ChangeSet::diff(&map, &map.clone()).is_empty());
    }

    #[test]
    fn test_apply_changes() {
        let old = props(&[("a", "1"), ("b", "2")]);
        let new = props(&[("a", "10"), ("c", "3")]);
        let mut diff = ChangeSet::diff(&old, &new);
        diff.remove("a");

        let snapshot = Snapshot::new(old, 1, Vec::new());
        let next = snapshot.apply(&diff, 2, Vec::new());
        assert_eq!(next.properties(), &props(&[("a", "1"), ("c", "3")]));
        assert_eq!(next.version(), 2);
    }
}
