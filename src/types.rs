// src/types.rs

//! Value types shared by the change source, the aggregator and the
//! controller.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "added" | "add" | "created" => Ok(ChangeKind::Added),
            "modified" | "change" | "changed" => Ok(ChangeKind::Modified),
            "removed" | "remove" | "deleted" => Ok(ChangeKind::Removed),
            other => Err(format!(
                "invalid change kind: {other} (expected \"added\", \"modified\" or \"removed\")"
            )),
        }
    }
}

/// A single raw notification produced by a change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: SystemTime,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: SystemTime::now(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Added)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Removed)
    }
}

/// A cumulative set of changed and removed paths.
///
/// A path lives in at most one of the two sets: the most recent observation
/// for a path wins, so "edit then delete" ends up in `removed` and
/// "delete then recreate" ends up in `changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changed: BTreeSet<PathBuf>,
    removed: BTreeSet<PathBuf>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len() + self.removed.len()
    }

    pub fn changed(&self) -> &BTreeSet<PathBuf> {
        &self.changed
    }

    pub fn removed(&self) -> &BTreeSet<PathBuf> {
        &self.removed
    }

    pub fn contains_changed(&self, path: impl AsRef<Path>) -> bool {
        self.changed.contains(path.as_ref())
    }

    pub fn contains_removed(&self, path: impl AsRef<Path>) -> bool {
        self.removed.contains(path.as_ref())
    }

    /// Record one observation. Duplicates are absorbed.
    pub fn record(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
        let path = path.into();
        match kind {
            ChangeKind::Added | ChangeKind::Modified => {
                self.removed.remove(&path);
                self.changed.insert(path);
            }
            ChangeKind::Removed => {
                self.changed.remove(&path);
                self.removed.insert(path);
            }
        }
    }

    pub fn record_event(&mut self, event: &ChangeEvent) {
        self.record(event.path.clone(), event.kind);
    }

    /// Merge a newer set into this one. Entries in `newer` take precedence.
    pub fn merge(&mut self, newer: ChangeSet) {
        for path in newer.changed {
            self.record(path, ChangeKind::Modified);
        }
        for path in newer.removed {
            self.record(path, ChangeKind::Removed);
        }
    }

    /// Move the whole set out, leaving this one empty.
    pub fn take(&mut self) -> ChangeSet {
        std::mem::take(self)
    }

    /// Consume into `(changed, removed)` vectors in sorted order.
    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        (
            self.changed.into_iter().collect(),
            self.removed.into_iter().collect(),
        )
    }
}

impl FromIterator<ChangeEvent> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ChangeEvent>>(iter: I) -> Self {
        let mut set = ChangeSet::new();
        for event in iter {
            set.record(event.path, event.kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_observation_wins_per_path() {
        let mut set = ChangeSet::new();
        set.record("a.js", ChangeKind::Modified);
        set.record("a.js", ChangeKind::Removed);
        assert!(set.contains_removed("a.js"));
        assert!(!set.contains_changed("a.js"));

        set.record("a.js", ChangeKind::Added);
        assert!(set.contains_changed("a.js"));
        assert!(!set.contains_removed("a.js"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn merge_unions_and_prefers_newer() {
        let mut older: ChangeSet = [
            ChangeEvent::modified("a.js"),
            ChangeEvent::removed("b.js"),
        ]
        .into_iter()
        .collect();
        let newer: ChangeSet = [
            ChangeEvent::added("b.js"),
            ChangeEvent::modified("c.js"),
        ]
        .into_iter()
        .collect();

        older.merge(newer);

        let (changed, removed) = older.into_parts();
        assert_eq!(
            changed,
            vec![
                PathBuf::from("a.js"),
                PathBuf::from("b.js"),
                PathBuf::from("c.js")
            ]
        );
        assert!(removed.is_empty());
    }

    #[test]
    fn change_kind_parses_aliases() {
        assert_eq!("changed".parse::<ChangeKind>(), Ok(ChangeKind::Modified));
        assert_eq!(" Deleted ".parse::<ChangeKind>(), Ok(ChangeKind::Removed));
        assert!("renamed".parse::<ChangeKind>().is_err());
    }
}
