// src/engine/transitions.rs

//! Transition functions of the controller state machine.
//!
//! Each function handles one [`ControllerInput`](crate::engine::ControllerInput)
//! kind against the controller state and returns the commands the IO shell
//! has to carry out. Two axes make up the state: the suspend flag and the
//! build state. Together with the pending set they give the observable modes
//! Idle, PendingInvalid and Compiling:
//!
//! | input        | suspended                 | idle, active                 | compiling                    |
//! |--------------|---------------------------|------------------------------|------------------------------|
//! | aggregated   | merge, invalid            | merge, invalid, start build  | merge, invalid (deferred)    |
//! | build done   | done, stay pending        | done, catch-up if pending    | n/a                          |
//! | suspend      | no-op                     | set flag                     | set flag                     |
//! | resume       | clear flag, start if idle | no-op                        | no-op                        |
//! | close        | teardown, ack             | teardown, ack                | teardown, ack after build    |

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::build::BuildOutcome;
use crate::engine::core::{BuildState, ControllerState, Lifecycle};
use crate::engine::{
    BuildId, BuildReport, BuildRequest, InvalidReason, Invalidation,
};
use crate::types::ChangeSet;

/// Command produced by the pure controller, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Dispatch the `invalid` hook.
    NotifyInvalid(Invalidation),
    /// Hand this build to the build engine.
    StartBuild(BuildRequest),
    /// Dispatch the `done` hook.
    NotifyDone(BuildReport),
    /// Dispatch the `failed` hook.
    NotifyFailed(String),
    /// Cancel the aggregation timer and unsubscribe from the change source.
    Teardown,
    /// Teardown is complete: dispatch `closed` and acknowledge close callers.
    AcknowledgeClose,
}

/// Decision returned by the controller after handling a single input.
#[derive(Debug, Clone, Default)]
pub struct ControllerStep {
    pub commands: Vec<ControllerCommand>,
    /// Whether the outer control loop should keep running.
    pub keep_running: bool,
}

impl ControllerStep {
    fn running(commands: Vec<ControllerCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

pub fn handle_start(state: &mut ControllerState) -> ControllerStep {
    if state.lifecycle != Lifecycle::Open {
        return ControllerStep::running(Vec::new());
    }
    // The initial build is a full build: an empty, forced change set.
    state.pending.force();
    ControllerStep::running(maybe_start_build(state).into_iter().collect())
}

/// Merge an aggregated window and start a build if allowed.
pub fn handle_aggregated(state: &mut ControllerState, window: ChangeSet) -> ControllerStep {
    if state.lifecycle != Lifecycle::Open {
        debug!(paths = window.len(), "discarding aggregated window after close");
        return ControllerStep::running(Vec::new());
    }
    if window.is_empty() {
        return ControllerStep::running(Vec::new());
    }

    state.pending.merge_window(window.clone());

    let mut commands = vec![ControllerCommand::NotifyInvalid(Invalidation {
        reason: InvalidReason::FileChange,
        changes: window,
        suspended: state.suspended,
    })];

    if state.suspended {
        debug!("builds suspended; keeping changes pending");
    } else if state.build.is_compiling() {
        debug!("build in flight; deferring changes to a catch-up build");
    }
    commands.extend(maybe_start_build(state));

    ControllerStep::running(commands)
}

pub fn handle_invalidate(state: &mut ControllerState) -> ControllerStep {
    if state.lifecycle != Lifecycle::Open {
        return ControllerStep::running(Vec::new());
    }

    state.pending.force();

    let mut commands = vec![ControllerCommand::NotifyInvalid(Invalidation {
        reason: InvalidReason::Manual,
        changes: ChangeSet::new(),
        suspended: state.suspended,
    })];
    commands.extend(maybe_start_build(state));

    ControllerStep::running(commands)
}

/// Handle completion of the in-flight build.
///
/// Completions that do not match the in-flight build are stale and ignored.
pub fn handle_build_finished(
    state: &mut ControllerState,
    build_id: BuildId,
    outcome: BuildOutcome,
    elapsed: Duration,
) -> ControllerStep {
    let changes = match &mut state.build {
        BuildState::Compiling {
            build_id: current,
            changes,
        } if *current == build_id => changes.take(),
        _ => {
            warn!(build_id, "ignoring completion of a build that is not in flight");
            return ControllerStep::running(Vec::new());
        }
    };

    state.build = BuildState::Idle;
    state.builds_completed += 1;

    match state.lifecycle {
        Lifecycle::Open => {}
        Lifecycle::Closing => {
            info!(build_id, "in-flight build finished; completing close");
            state.lifecycle = Lifecycle::Closed;
            return ControllerStep {
                commands: vec![ControllerCommand::AcknowledgeClose],
                keep_running: false,
            };
        }
        Lifecycle::Closed => {
            return ControllerStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }
    }

    info!(
        build_id,
        success = outcome.is_success(),
        elapsed = ?elapsed,
        "build finished"
    );

    let mut commands = vec![ControllerCommand::NotifyDone(BuildReport {
        build_id,
        changes,
        outcome,
        elapsed,
    })];
    // Catch-up build for anything that arrived while compiling.
    commands.extend(maybe_start_build(state));

    ControllerStep::running(commands)
}

pub fn handle_suspend(state: &mut ControllerState) -> ControllerStep {
    if state.lifecycle == Lifecycle::Open && !state.suspended {
        info!("builds suspended");
        state.suspended = true;
    }
    ControllerStep::running(Vec::new())
}

pub fn handle_resume(state: &mut ControllerState) -> ControllerStep {
    if state.lifecycle != Lifecycle::Open || !state.suspended {
        return ControllerStep::running(Vec::new());
    }

    info!(
        pending = state.pending.changes().len(),
        windows = state.pending.windows(),
        "builds resumed"
    );
    state.suspended = false;

    ControllerStep::running(maybe_start_build(state).into_iter().collect())
}

pub fn handle_close(state: &mut ControllerState) -> ControllerStep {
    match state.lifecycle {
        Lifecycle::Open => {
            let mut commands = vec![ControllerCommand::Teardown];
            if state.build.is_compiling() {
                info!("close requested; waiting for in-flight build");
                state.lifecycle = Lifecycle::Closing;
                ControllerStep::running(commands)
            } else {
                info!("close requested; session idle");
                state.lifecycle = Lifecycle::Closed;
                commands.push(ControllerCommand::AcknowledgeClose);
                ControllerStep {
                    commands,
                    keep_running: false,
                }
            }
        }
        Lifecycle::Closing => ControllerStep::running(Vec::new()),
        Lifecycle::Closed => ControllerStep {
            commands: vec![ControllerCommand::AcknowledgeClose],
            keep_running: false,
        },
    }
}

/// Terminal change-source error: report it, then close.
pub fn handle_source_failed(state: &mut ControllerState, message: String) -> ControllerStep {
    if state.lifecycle != Lifecycle::Open {
        return ControllerStep::running(Vec::new());
    }

    warn!(error = %message, "change source failed; closing session");
    let mut step = handle_close(state);
    step.commands
        .insert(0, ControllerCommand::NotifyFailed(message));
    step
}

/// Start a build if the session is open, not suspended, idle, and has
/// something pending.
fn maybe_start_build(state: &mut ControllerState) -> Option<ControllerCommand> {
    if state.lifecycle != Lifecycle::Open
        || state.suspended
        || state.build.is_compiling()
        || state.pending.is_empty()
    {
        return None;
    }

    let changes = state.pending.drain();
    state.next_build_id += 1;
    let build_id = state.next_build_id;
    state.builds_started += 1;
    state.build = BuildState::Compiling {
        build_id,
        changes: changes.clone(),
    };

    debug!(
        build_id,
        changed = changes.changed().len(),
        removed = changes.removed().len(),
        "starting build"
    );

    Some(ControllerCommand::StartBuild(BuildRequest { build_id, changes }))
}
