// src/engine/mod.rs

//! Watch-mode controller.
//!
//! This module ties together:
//! - the aggregator (debounces raw change events into windows)
//! - the pending change set (everything observed since the last build start)
//! - the suspend/resume-aware controller state machine
//! - the async control loop that reacts to:
//!   - raw change events from the change source
//!   - aggregation timer expiry
//!   - build completion
//!   - caller commands (suspend, resume, invalidate, close)
//!
//! The pure state machine lives in [`core`] with its transition functions in
//! [`transitions`]; the async/IO shell is implemented in [`runtime`].

use std::time::Duration;

use crate::build::BuildOutcome;
use crate::types::ChangeSet;

/// Monotonic identifier of a build within one session.
pub type BuildId = u64;

/// Why the current output was declared stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// An aggregation window with file changes elapsed.
    FileChange,
    /// The caller asked for a rebuild.
    Manual,
}

/// Payload of the `invalid` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub reason: InvalidReason,
    /// Paths of the window that triggered this notification (empty for
    /// manual invalidation).
    pub changes: ChangeSet,
    /// Whether builds were suspended when the notification fired.
    pub suspended: bool,
}

/// A build the shell should hand to the build engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub build_id: BuildId,
    pub changes: ChangeSet,
}

/// Payload of the `done` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub build_id: BuildId,
    /// The change set the build was started with.
    pub changes: ChangeSet,
    pub outcome: BuildOutcome,
    pub elapsed: Duration,
}

/// Observable controller mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No build running and nothing pending.
    Idle,
    /// Changes are pending but no build started for them yet, because builds
    /// are suspended or one is already running.
    PendingInvalid,
    /// A build is in flight.
    Compiling,
}

/// Snapshot answered by the control loop for [`crate::Watching::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStatus {
    pub mode: Mode,
    pub suspended: bool,
    pub pending_changed: usize,
    pub pending_removed: usize,
    pub builds_started: u64,
    pub builds_completed: u64,
    pub closed: bool,
}

/// Inputs to the pure controller.
#[derive(Debug, Clone)]
pub enum ControllerInput {
    /// Session started; run the initial build.
    Start,
    /// The aggregator emitted a window.
    Aggregated(ChangeSet),
    /// Manual rebuild request.
    Invalidate,
    /// The build engine finished a build.
    BuildFinished {
        build_id: BuildId,
        outcome: BuildOutcome,
        elapsed: Duration,
    },
    Suspend,
    Resume,
    Close,
    /// The change source reported a terminal error.
    SourceFailed(String),
}

pub mod aggregator;
pub mod core;
pub mod hooks;
pub mod options;
pub mod pending;
pub mod runtime;
pub mod transitions;

pub use aggregator::Aggregator;
pub use core::WatchController;
pub use hooks::{Hook, Hooks};
pub use options::{PollSettings, SharedWatchOptions, WatchOptions};
pub use pending::PendingChanges;
pub use runtime::Runtime;
pub use transitions::{ControllerCommand, ControllerStep};
