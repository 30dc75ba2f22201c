// src/engine/core.rs

//! Pure controller state machine.
//!
//! This module contains a synchronous, deterministic controller that
//! consumes [`ControllerInput`]s and produces:
//! - an updated controller state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading change events, timer expiry, build completions and caller
//!   commands in one serialized loop
//! - running builds on the build engine
//! - dispatching hooks
//!
//! Because every input goes through [`WatchController::step`] one at a time,
//! the pending set, the suspend flag and the build state never see
//! concurrent mutation, and build serialization falls out of the state
//! machine rather than out of a lock.

use crate::engine::pending::PendingChanges;
use crate::engine::transitions::{
    ControllerStep, handle_aggregated, handle_build_finished, handle_close,
    handle_invalidate, handle_resume, handle_source_failed, handle_start,
    handle_suspend,
};
use crate::engine::{BuildId, ControllerInput, Mode, WatchStatus};
use crate::types::ChangeSet;

/// Whether a build is in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuildState {
    #[default]
    Idle,
    Compiling {
        build_id: BuildId,
        /// The change set the build was started with.
        changes: ChangeSet,
    },
}

impl BuildState {
    pub fn is_compiling(&self) -> bool {
        matches!(self, BuildState::Compiling { .. })
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Open,
    /// Close requested while a build was in flight.
    Closing,
    Closed,
}

/// Raw controller state, mutated only by the transition functions.
#[derive(Debug, Default)]
pub struct ControllerState {
    pub(crate) pending: PendingChanges,
    pub(crate) suspended: bool,
    pub(crate) build: BuildState,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) next_build_id: BuildId,
    pub(crate) builds_started: u64,
    pub(crate) builds_completed: u64,
}

/// The suspend/resume-aware watch controller.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug, Default)]
pub struct WatchController {
    state: ControllerState,
}

impl WatchController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a single input, updating state and returning the resulting
    /// commands for the IO shell.
    pub fn step(&mut self, input: ControllerInput) -> ControllerStep {
        let state = &mut self.state;
        match input {
            ControllerInput::Start => handle_start(state),
            ControllerInput::Aggregated(window) => handle_aggregated(state, window),
            ControllerInput::Invalidate => handle_invalidate(state),
            ControllerInput::BuildFinished {
                build_id,
                outcome,
                elapsed,
            } => handle_build_finished(state, build_id, outcome, elapsed),
            ControllerInput::Suspend => handle_suspend(state),
            ControllerInput::Resume => handle_resume(state),
            ControllerInput::Close => handle_close(state),
            ControllerInput::SourceFailed(message) => handle_source_failed(state, message),
        }
    }

    pub fn mode(&self) -> Mode {
        if self.state.build.is_compiling() {
            Mode::Compiling
        } else if self.state.pending.is_empty() {
            Mode::Idle
        } else {
            Mode::PendingInvalid
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state.suspended
    }

    /// True until close has been requested.
    pub fn is_open(&self) -> bool {
        self.state.lifecycle == Lifecycle::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state.lifecycle == Lifecycle::Closed
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.state.pending
    }

    /// Id of the build in flight, if any.
    pub fn current_build(&self) -> Option<BuildId> {
        match &self.state.build {
            BuildState::Compiling { build_id, .. } => Some(*build_id),
            BuildState::Idle => None,
        }
    }

    pub fn status(&self) -> WatchStatus {
        let changes = self.state.pending.changes();
        WatchStatus {
            mode: self.mode(),
            suspended: self.state.suspended,
            pending_changed: changes.changed().len(),
            pending_removed: changes.removed().len(),
            builds_started: self.state.builds_started,
            builds_completed: self.state.builds_completed,
            closed: self.state.lifecycle != Lifecycle::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::build::{BuildOutcome, BuildResult};
    use crate::engine::transitions::ControllerCommand;
    use crate::engine::{BuildRequest, InvalidReason};
    use crate::types::ChangeKind;

    fn window(paths: &[&str]) -> ChangeSet {
        let mut set = ChangeSet::new();
        for p in paths {
            set.record(*p, ChangeKind::Modified);
        }
        set
    }

    fn finished(build_id: BuildId) -> ControllerInput {
        ControllerInput::BuildFinished {
            build_id,
            outcome: BuildOutcome::Completed(BuildResult::success()),
            elapsed: Duration::from_millis(5),
        }
    }

    fn started(step: &ControllerStep) -> Vec<BuildRequest> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                ControllerCommand::StartBuild(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    fn invalid_count(step: &ControllerStep) -> usize {
        step.commands
            .iter()
            .filter(|c| matches!(c, ControllerCommand::NotifyInvalid(_)))
            .count()
    }

    /// Controller that has finished its initial build and is idle.
    fn settled() -> WatchController {
        let mut ctl = WatchController::new();
        let step = ctl.step(ControllerInput::Start);
        let initial = started(&step);
        assert_eq!(initial.len(), 1);
        assert!(initial[0].changes.is_empty());
        ctl.step(finished(initial[0].build_id));
        assert_eq!(ctl.mode(), Mode::Idle);
        ctl
    }

    #[test]
    fn aggregated_window_starts_build_when_idle() {
        let mut ctl = settled();

        let step = ctl.step(ControllerInput::Aggregated(window(&["a.js"])));

        assert_eq!(invalid_count(&step), 1);
        let builds = started(&step);
        assert_eq!(builds.len(), 1);
        assert!(builds[0].changes.contains_changed("a.js"));
        assert_eq!(ctl.mode(), Mode::Compiling);
        assert!(ctl.pending().is_empty());
    }

    #[test]
    fn invalid_precedes_build_start() {
        let mut ctl = settled();
        let step = ctl.step(ControllerInput::Aggregated(window(&["a.js"])));
        assert!(matches!(step.commands[0], ControllerCommand::NotifyInvalid(_)));
        assert!(matches!(step.commands[1], ControllerCommand::StartBuild(_)));
    }

    #[test]
    fn suspended_windows_accumulate_into_one_build_on_resume() {
        let mut ctl = settled();
        ctl.step(ControllerInput::Suspend);

        for paths in [&["a.js"][..], &["b.js"][..], &["a.js", "c.js"][..]] {
            let step = ctl.step(ControllerInput::Aggregated(window(paths)));
            assert_eq!(invalid_count(&step), 1, "invalid fires while suspended");
            assert!(started(&step).is_empty(), "no build while suspended");
        }
        assert_eq!(ctl.mode(), Mode::PendingInvalid);
        assert_eq!(ctl.pending().windows(), 3);

        let step = ctl.step(ControllerInput::Resume);
        let builds = started(&step);
        assert_eq!(builds.len(), 1);
        let (changed, _) = builds[0].changes.clone().into_parts();
        assert_eq!(changed.len(), 3);
        assert!(ctl.pending().is_empty());
    }

    #[test]
    fn suspend_and_resume_are_idempotent() {
        let mut ctl = settled();

        assert!(ctl.step(ControllerInput::Resume).commands.is_empty());

        ctl.step(ControllerInput::Suspend);
        ctl.step(ControllerInput::Suspend);
        ctl.step(ControllerInput::Aggregated(window(&["a.js"])));

        let first = ctl.step(ControllerInput::Resume);
        assert_eq!(started(&first).len(), 1);
        let second = ctl.step(ControllerInput::Resume);
        assert!(second.commands.is_empty());
    }

    #[test]
    fn resume_without_pending_changes_starts_nothing() {
        let mut ctl = settled();
        ctl.step(ControllerInput::Suspend);
        let step = ctl.step(ControllerInput::Resume);
        assert!(started(&step).is_empty());
        assert_eq!(ctl.mode(), Mode::Idle);
    }

    #[test]
    fn changes_during_build_trigger_one_catch_up_build() {
        let mut ctl = settled();
        let first = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))));
        let id = first[0].build_id;

        let during_a = ctl.step(ControllerInput::Aggregated(window(&["b.js"])));
        let during_b = ctl.step(ControllerInput::Aggregated(window(&["c.js"])));
        assert!(started(&during_a).is_empty());
        assert!(started(&during_b).is_empty());
        assert_eq!(ctl.current_build(), Some(id));

        let step = ctl.step(finished(id));
        assert!(matches!(step.commands[0], ControllerCommand::NotifyDone(_)));
        let catch_up = started(&step);
        assert_eq!(catch_up.len(), 1);
        assert!(catch_up[0].changes.contains_changed("b.js"));
        assert!(catch_up[0].changes.contains_changed("c.js"));
        assert!(!catch_up[0].changes.contains_changed("a.js"));
    }

    #[test]
    fn suspend_during_build_defers_catch_up_until_resume() {
        let mut ctl = settled();
        let id = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))))[0].build_id;

        ctl.step(ControllerInput::Suspend);
        ctl.step(ControllerInput::Aggregated(window(&["b.js"])));

        let step = ctl.step(finished(id));
        assert!(started(&step).is_empty());
        assert_eq!(ctl.mode(), Mode::PendingInvalid);

        let step = ctl.step(ControllerInput::Resume);
        assert_eq!(started(&step).len(), 1);
    }

    #[test]
    fn resume_during_build_waits_for_completion() {
        let mut ctl = settled();
        let id = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))))[0].build_id;

        ctl.step(ControllerInput::Suspend);
        ctl.step(ControllerInput::Aggregated(window(&["b.js"])));
        let step = ctl.step(ControllerInput::Resume);
        assert!(started(&step).is_empty(), "a build is already in flight");

        let step = ctl.step(finished(id));
        assert_eq!(started(&step).len(), 1);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut ctl = settled();
        let id = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))))[0].build_id;

        let step = ctl.step(finished(id + 7));
        assert!(step.commands.is_empty());
        assert_eq!(ctl.current_build(), Some(id));
    }

    #[test]
    fn manual_invalidate_builds_without_changes() {
        let mut ctl = settled();
        let step = ctl.step(ControllerInput::Invalidate);

        match &step.commands[0] {
            ControllerCommand::NotifyInvalid(inv) => {
                assert_eq!(inv.reason, InvalidReason::Manual);
                assert!(inv.changes.is_empty());
            }
            other => panic!("expected invalid notification, got {other:?}"),
        }
        assert_eq!(started(&step).len(), 1);
    }

    #[test]
    fn manual_invalidate_obeys_suspension() {
        let mut ctl = settled();
        ctl.step(ControllerInput::Suspend);
        let step = ctl.step(ControllerInput::Invalidate);
        assert!(started(&step).is_empty());
        assert_eq!(ctl.mode(), Mode::PendingInvalid);

        assert_eq!(started(&ctl.step(ControllerInput::Resume)).len(), 1);
    }

    #[test]
    fn close_when_idle_acknowledges_immediately() {
        let mut ctl = settled();
        let step = ctl.step(ControllerInput::Close);
        assert_eq!(
            step.commands,
            vec![ControllerCommand::Teardown, ControllerCommand::AcknowledgeClose]
        );
        assert!(!step.keep_running);
        assert!(ctl.is_closed());
    }

    #[test]
    fn close_during_build_waits_and_suppresses_done() {
        let mut ctl = settled();
        let id = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))))[0].build_id;
        ctl.step(ControllerInput::Aggregated(window(&["b.js"])));

        let step = ctl.step(ControllerInput::Close);
        assert_eq!(step.commands, vec![ControllerCommand::Teardown]);
        assert!(step.keep_running);
        assert!(!ctl.is_open());

        // Late windows and suspend/resume are ignored while closing.
        assert!(ctl.step(ControllerInput::Aggregated(window(&["c.js"]))).commands.is_empty());
        assert!(ctl.step(ControllerInput::Resume).commands.is_empty());

        let step = ctl.step(finished(id));
        assert_eq!(step.commands, vec![ControllerCommand::AcknowledgeClose]);
        assert!(!step.keep_running);
    }

    #[test]
    fn close_is_idempotent() {
        let mut ctl = settled();
        ctl.step(ControllerInput::Close);
        let again = ctl.step(ControllerInput::Close);
        assert_eq!(again.commands, vec![ControllerCommand::AcknowledgeClose]);
        assert!(!again.keep_running);
    }

    #[test]
    fn source_failure_reports_then_closes() {
        let mut ctl = settled();
        let step = ctl.step(ControllerInput::SourceFailed("permission denied".into()));
        assert_eq!(
            step.commands,
            vec![
                ControllerCommand::NotifyFailed("permission denied".into()),
                ControllerCommand::Teardown,
                ControllerCommand::AcknowledgeClose,
            ]
        );
        assert!(ctl.is_closed());
    }

    #[test]
    fn build_failure_keeps_session_alive() {
        let mut ctl = settled();
        let id = started(&ctl.step(ControllerInput::Aggregated(window(&["a.js"]))))[0].build_id;

        let step = ctl.step(ControllerInput::BuildFinished {
            build_id: id,
            outcome: BuildOutcome::Failed("engine crashed".into()),
            elapsed: Duration::ZERO,
        });
        assert!(step.keep_running);
        assert_eq!(ctl.mode(), Mode::Idle);

        let step = ctl.step(ControllerInput::Aggregated(window(&["a.js"])));
        assert_eq!(started(&step).len(), 1);
    }
}
