// src/engine/pending.rs

use tracing::debug;

use crate::types::ChangeSet;

/// Changes accumulated since the last build start.
///
/// Semantics:
/// - Every aggregated window is merged in, whatever the suspend or build
///   state is. Windows never overwrite each other.
/// - A manual invalidation sets a `forced` flag that makes the set count as
///   non-empty even when no path changed.
/// - [`PendingChanges::drain`] empties everything in one go; it is only
///   called by the controller at the instant a build starts.
#[derive(Debug, Default)]
pub struct PendingChanges {
    changes: ChangeSet,
    forced: bool,
    windows: usize,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there is nothing that would justify a build.
    pub fn is_empty(&self) -> bool {
        !self.forced && self.changes.is_empty()
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Aggregated windows merged since the last drain.
    pub fn windows(&self) -> usize {
        self.windows
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn merge_window(&mut self, window: ChangeSet) {
        self.windows += 1;
        self.changes.merge(window);
        debug!(
            windows = self.windows,
            changed = self.changes.changed().len(),
            removed = self.changes.removed().len(),
            "merged aggregated window into pending changes"
        );
    }

    pub fn force(&mut self) {
        self.forced = true;
    }

    /// Take the full accumulated set and reset.
    pub fn drain(&mut self) -> ChangeSet {
        let drained = self.changes.take();
        debug!(
            windows = self.windows,
            forced = self.forced,
            paths = drained.len(),
            "drained pending changes for build"
        );
        self.forced = false;
        self.windows = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeKind;

    fn window(paths: &[(&str, ChangeKind)]) -> ChangeSet {
        let mut set = ChangeSet::new();
        for (p, k) in paths {
            set.record(*p, *k);
        }
        set
    }

    #[test]
    fn windows_accumulate_instead_of_overwriting() {
        let mut pending = PendingChanges::new();
        pending.merge_window(window(&[("a.js", ChangeKind::Modified)]));
        pending.merge_window(window(&[("b.js", ChangeKind::Modified)]));
        pending.merge_window(window(&[("c.js", ChangeKind::Removed)]));

        assert_eq!(pending.windows(), 3);
        let drained = pending.drain();
        assert!(drained.contains_changed("a.js"));
        assert!(drained.contains_changed("b.js"));
        assert!(drained.contains_removed("c.js"));
        assert!(pending.is_empty());
        assert_eq!(pending.windows(), 0);
    }

    #[test]
    fn forced_counts_as_pending_and_clears_on_drain() {
        let mut pending = PendingChanges::new();
        assert!(pending.is_empty());

        pending.force();
        assert!(!pending.is_empty());

        let drained = pending.drain();
        assert!(drained.is_empty());
        assert!(pending.is_empty());
        assert!(!pending.is_forced());
    }
}
