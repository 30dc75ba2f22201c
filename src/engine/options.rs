// src/engine/options.rs

//! Mutable watch options shared between the caller and the control loop.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Default inactivity window before a burst of changes is signalled.
pub const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_millis(200);

/// How the change source learns about filesystem mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollSettings {
    /// Native OS notifications (inotify, FSEvents, ReadDirectoryChangesW).
    #[default]
    Native,
    /// Periodic scanning at the given interval.
    Interval(Duration),
}

/// Options that govern a watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Sliding inactivity window of the aggregator.
    pub aggregate_timeout: Duration,
    pub poll: PollSettings,
    /// Glob patterns, relative to each watched root, whose changes are dropped.
    pub ignored: Vec<String>,
    /// Drop modify events whose file content did not actually change.
    pub use_hash: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            poll: PollSettings::Native,
            ignored: Vec::new(),
            use_hash: false,
        }
    }
}

impl WatchOptions {
    pub fn with_aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.aggregate_timeout = timeout;
        self
    }
}

/// Owned, shared handle to a session's [`WatchOptions`].
///
/// Only `aggregate_timeout` is live: the caller changes it through
/// [`crate::Watching::options`] and the control loop reads it each time it
/// arms the aggregation timer, so a change only affects windows armed after
/// it. `poll`, `ignored` and `use_hash` are consumed by the change source when
/// it is built and are read-only here.
#[derive(Debug, Clone, Default)]
pub struct SharedWatchOptions {
    inner: Arc<RwLock<WatchOptions>>,
}

impl SharedWatchOptions {
    pub fn new(options: WatchOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(options)),
        }
    }

    /// Copy of the current options.
    pub fn snapshot(&self) -> WatchOptions {
        self.read().clone()
    }

    pub fn aggregate_timeout(&self) -> Duration {
        self.read().aggregate_timeout
    }

    pub fn set_aggregate_timeout(&self, timeout: Duration) {
        self.write().aggregate_timeout = timeout;
    }

    // Poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, WatchOptions> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WatchOptions> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_options() {
        let mut initial = WatchOptions::default();
        initial.ignored.push("dist/**".to_string());
        let options = SharedWatchOptions::new(initial);
        let caller_side = options.clone();

        caller_side.set_aggregate_timeout(Duration::from_millis(500));
        assert_eq!(options.aggregate_timeout(), Duration::from_millis(500));

        // Only the timeout moved.
        let snapshot = options.snapshot();
        assert_eq!(snapshot.ignored, vec!["dist/**".to_string()]);
        assert_eq!(snapshot.poll, PollSettings::Native);
        assert!(!snapshot.use_hash);
    }
}
