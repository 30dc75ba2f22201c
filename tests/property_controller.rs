// tests/property_controller.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;
use watchbuild::build::{BuildOutcome, BuildResult};
use watchbuild::engine::{ControllerCommand, ControllerInput, Mode, WatchController};
use watchbuild::types::{ChangeKind, ChangeSet};

#[derive(Debug, Clone)]
enum Op {
    /// An aggregation window with (path index, removed?) entries.
    Window(Vec<(u8, bool)>),
    Suspend,
    Resume,
    Invalidate,
    /// Complete the in-flight build, if any.
    Finish,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::collection::vec((0u8..12, any::<bool>()), 1..4).prop_map(Op::Window),
        2 => Just(Op::Suspend),
        2 => Just(Op::Resume),
        1 => Just(Op::Invalidate),
        3 => Just(Op::Finish),
    ]
}

fn path(idx: u8) -> PathBuf {
    PathBuf::from(format!("src/m{idx}.js"))
}

/// Drives a controller and checks every step against a simple model.
struct Harness {
    ctl: WatchController,
    suspended: bool,
    in_flight: Option<u64>,
    seen_paths: BTreeSet<PathBuf>,
    built_paths: BTreeSet<PathBuf>,
    builds: usize,
    invalids: usize,
    windows: usize,
}

impl Harness {
    fn new() -> Self {
        Self {
            ctl: WatchController::new(),
            suspended: false,
            in_flight: None,
            seen_paths: BTreeSet::new(),
            built_paths: BTreeSet::new(),
            builds: 0,
            invalids: 0,
            windows: 0,
        }
    }

    fn step(&mut self, input: ControllerInput) -> Result<(), TestCaseError> {
        let step = self.ctl.step(input);
        prop_assert!(step.keep_running);

        for command in step.commands {
            match command {
                ControllerCommand::StartBuild(request) => {
                    prop_assert!(self.in_flight.is_none(), "build started while another runs");
                    prop_assert!(!self.suspended, "build started while suspended");
                    self.in_flight = Some(request.build_id);
                    self.builds += 1;
                    self.built_paths.extend(request.changes.changed().iter().cloned());
                    self.built_paths.extend(request.changes.removed().iter().cloned());
                }
                ControllerCommand::NotifyInvalid(_) => self.invalids += 1,
                ControllerCommand::NotifyDone(report) => {
                    prop_assert_eq!(Some(report.build_id), self.in_flight);
                }
                other => prop_assert!(false, "unexpected command {:?}", other),
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: Op) -> Result<(), TestCaseError> {
        match op {
            Op::Window(entries) => {
                let mut window = ChangeSet::new();
                for (idx, removed) in entries {
                    let kind = if removed {
                        ChangeKind::Removed
                    } else {
                        ChangeKind::Modified
                    };
                    window.record(path(idx), kind);
                    self.seen_paths.insert(path(idx));
                }
                self.windows += 1;
                self.step(ControllerInput::Aggregated(window))
            }
            Op::Suspend => {
                self.suspended = true;
                self.step(ControllerInput::Suspend)
            }
            Op::Resume => {
                self.suspended = false;
                self.step(ControllerInput::Resume)
            }
            Op::Invalidate => self.step(ControllerInput::Invalidate),
            Op::Finish => self.finish(),
        }
    }

    fn finish(&mut self) -> Result<(), TestCaseError> {
        let Some(build_id) = self.in_flight.take() else {
            return Ok(());
        };
        // `in_flight` is cleared first so a catch-up start is accepted.
        let step = self.ctl.step(ControllerInput::BuildFinished {
            build_id,
            outcome: BuildOutcome::Completed(BuildResult::success()),
            elapsed: Duration::from_millis(1),
        });
        prop_assert!(step.keep_running);
        let mut done = 0;
        for command in step.commands {
            match command {
                ControllerCommand::NotifyDone(report) => {
                    prop_assert_eq!(report.build_id, build_id);
                    done += 1;
                }
                ControllerCommand::StartBuild(request) => {
                    prop_assert_eq!(done, 1, "done must precede the catch-up build");
                    prop_assert!(!self.suspended);
                    self.in_flight = Some(request.build_id);
                    self.builds += 1;
                    self.built_paths.extend(request.changes.changed().iter().cloned());
                    self.built_paths.extend(request.changes.removed().iter().cloned());
                }
                other => prop_assert!(false, "unexpected command {:?}", other),
            }
        }
        prop_assert_eq!(done, 1);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn interleavings_never_overlap_or_lose_changes(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let mut h = Harness::new();
        h.step(ControllerInput::Start)?;
        prop_assert_eq!(h.builds, 1);

        let mut manual = 0;
        for op in ops {
            if matches!(op, Op::Invalidate) {
                manual += 1;
            }
            h.apply(op)?;
            prop_assert_eq!(h.ctl.is_suspended(), h.suspended);
            prop_assert_eq!(h.ctl.current_build(), h.in_flight);
        }

        // One invalid per window and per manual request, suspended or not.
        prop_assert_eq!(h.invalids, h.windows + manual);

        // Settle: resume and let every build (including catch-ups) finish.
        h.apply(Op::Resume)?;
        while h.in_flight.is_some() {
            h.finish()?;
        }

        prop_assert_eq!(h.ctl.mode(), Mode::Idle);
        prop_assert!(h.ctl.pending().is_empty());
        prop_assert!(
            h.seen_paths.is_subset(&h.built_paths),
            "paths never built: {:?}",
            h.seen_paths.difference(&h.built_paths).collect::<Vec<_>>()
        );

        let status = h.ctl.status();
        prop_assert_eq!(status.builds_started as usize, h.builds);
        prop_assert_eq!(status.builds_completed, status.builds_started);
    }
}
