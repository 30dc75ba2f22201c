// src/engine/aggregator.rs

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::types::{ChangeEvent, ChangeSet};

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Debounces raw change events into one cumulative signal per inactivity
/// window.
///
/// Semantics:
/// - Every recorded event restarts the window (sliding debounce).
/// - The window length is read by the caller from the live options at the
///   moment of (re)arming and stored here as an absolute deadline, so a later
///   change to `aggregate_timeout` only affects windows armed afterwards.
/// - The snapshot handed out by [`Aggregator::take_due`] covers everything
///   since the previous emission, independent of the controller's own
///   pending set.
/// - An emission is never empty.
///
/// The aggregator owns no timer task. The control loop sleeps until
/// [`Aggregator::deadline`], so cancelling is just clearing the deadline and
/// cannot leave a callback behind.
#[derive(Debug, Default)]
pub struct Aggregator {
    window: ChangeSet,
    deadline: Option<Instant>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the current window closes, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Number of distinct paths collected in the open window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Record a raw event and (re)arm the window with `timeout`.
    pub fn record(&mut self, event: &ChangeEvent, now: Instant, timeout: Duration) {
        self.window.record_event(event);
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.deadline = Some(deadline);
        trace!(
            path = ?event.path,
            kind = ?event.kind,
            timeout = ?timeout,
            "aggregation window re-armed"
        );
    }

    /// If the window has elapsed at `now`, disarm and return its snapshot.
    ///
    /// Returns `None` when no window is armed, when it has not elapsed yet,
    /// or when the window collected nothing.
    pub fn take_due(&mut self, now: Instant) -> Option<ChangeSet> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                if self.window.is_empty() {
                    return None;
                }
                let snapshot = self.window.take();
                debug!(
                    changed = snapshot.changed().len(),
                    removed = snapshot.removed().len(),
                    "aggregation window elapsed"
                );
                Some(snapshot)
            }
            _ => None,
        }
    }

    /// Disarm and forget the open window.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            debug!(
                discarded = self.window.len(),
                "aggregation window cancelled"
            );
        }
        self.window = ChangeSet::new();
    }
}
