// src/engine/runtime.rs

use std::fmt;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::build::{BuildEngine, BuildOutcome};
use crate::engine::aggregator::Aggregator;
use crate::engine::core::WatchController;
use crate::engine::hooks::Hooks;
use crate::engine::options::SharedWatchOptions;
use crate::engine::transitions::{ControllerCommand, ControllerStep};
use crate::engine::{BuildId, BuildRequest, ControllerInput, WatchStatus};
use crate::errors::{Result, WatchbuildError};
use crate::types::ChangeEvent;
use crate::watch::{ChangeSource, SourceMessage};

/// Command from a [`crate::Watching`] handle into the control loop.
#[derive(Debug)]
pub enum ControlCommand {
    Suspend,
    Resume,
    Invalidate,
    /// Close the session; the sender is completed once teardown is done.
    Close(oneshot::Sender<()>),
    Status(oneshot::Sender<WatchStatus>),
}

/// A build future resolved.
#[derive(Debug)]
struct BuildCompletion {
    build_id: BuildId,
    outcome: BuildOutcome,
    elapsed: Duration,
}

/// Drives the [`WatchController`] in response to change events, timer
/// expiry, build completions and caller commands, and delegates builds to a
/// [`BuildEngine`].
///
/// This is an IO shell around the pure controller: all decisions are made by
/// `WatchController::step`, and this struct only reads the inputs in one
/// serialized loop and executes the resulting commands.
pub struct Runtime<E: BuildEngine> {
    core: WatchController,
    aggregator: Aggregator,
    options: SharedWatchOptions,
    hooks: Arc<Hooks>,
    source: Box<dyn ChangeSource>,
    engine: E,
    control_rx: mpsc::UnboundedReceiver<ControlCommand>,
    source_rx: mpsc::UnboundedReceiver<SourceMessage>,
    build_tx: mpsc::UnboundedSender<BuildCompletion>,
    build_rx: mpsc::UnboundedReceiver<BuildCompletion>,
    close_waiters: Vec<oneshot::Sender<()>>,
}

impl<E: BuildEngine> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl<E: BuildEngine> Runtime<E> {
    /// `source` must already be subscribed with a sink feeding `source_rx`.
    pub fn new(
        options: SharedWatchOptions,
        hooks: Arc<Hooks>,
        source: Box<dyn ChangeSource>,
        engine: E,
        control_rx: mpsc::UnboundedReceiver<ControlCommand>,
        source_rx: mpsc::UnboundedReceiver<SourceMessage>,
    ) -> Self {
        let (build_tx, build_rx) = mpsc::unbounded_channel();
        Self {
            core: WatchController::new(),
            aggregator: Aggregator::new(),
            options,
            hooks,
            source,
            engine,
            control_rx,
            source_rx,
            build_tx,
            build_rx,
            close_waiters: Vec::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Starts the initial build.
    /// - Consumes caller commands, build completions and change events, and
    ///   fires the aggregation window when its deadline passes.
    /// - Feeds them into the controller and executes the returned commands.
    pub async fn run(mut self) -> Result<()> {
        info!("watch session started");

        let mut keep_running = self.step(ControllerInput::Start);
        let mut control_open = true;
        let mut source_open = true;

        while keep_running {
            let deadline = self.aggregator.deadline();

            keep_running = tokio::select! {
                biased;

                cmd = self.control_rx.recv(), if control_open => match cmd {
                    Some(cmd) => self.handle_control(cmd),
                    None => {
                        info!("all watch handles dropped; closing session");
                        control_open = false;
                        self.step(ControllerInput::Close)
                    }
                },

                Some(done) = self.build_rx.recv() => self.step(ControllerInput::BuildFinished {
                    build_id: done.build_id,
                    outcome: done.outcome,
                    elapsed: done.elapsed,
                }),

                msg = self.source_rx.recv(), if source_open => match msg {
                    Some(SourceMessage::Change(event)) => {
                        self.record_change(event);
                        true
                    }
                    Some(SourceMessage::Failed(message)) => {
                        self.step(ControllerInput::SourceFailed(message))
                    }
                    None => {
                        debug!("change source channel closed");
                        source_open = false;
                        true
                    }
                },

                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    match self.aggregator.take_due(Instant::now()) {
                        Some(window) => self.step(ControllerInput::Aggregated(window)),
                        None => true,
                    }
                }
            };
        }

        // Every exit goes through a close step, so teardown already ran.
        debug_assert!(!self.aggregator.is_armed());
        info!(status = ?self.core.status(), "watch session finished");
        Ok(())
    }

    fn handle_control(&mut self, cmd: ControlCommand) -> bool {
        match cmd {
            ControlCommand::Suspend => self.step(ControllerInput::Suspend),
            ControlCommand::Resume => self.step(ControllerInput::Resume),
            ControlCommand::Invalidate => self.step(ControllerInput::Invalidate),
            ControlCommand::Close(ack) => {
                self.close_waiters.push(ack);
                self.step(ControllerInput::Close)
            }
            ControlCommand::Status(reply) => {
                let _ = reply.send(self.core.status());
                true
            }
        }
    }

    /// Feed a raw change into the aggregator, reading the window length from
    /// the live options at (re)arm time.
    fn record_change(&mut self, event: ChangeEvent) {
        if !self.core.is_open() {
            debug!(path = ?event.path, "dropping change event after close");
            return;
        }
        let timeout = self.options.aggregate_timeout();
        self.aggregator.record(&event, Instant::now(), timeout);
    }

    /// Run one controller step and execute its commands.
    fn step(&mut self, input: ControllerInput) -> bool {
        let ControllerStep {
            commands,
            keep_running,
        } = self.core.step(input);

        for command in commands {
            self.execute_command(command);
        }

        keep_running
    }

    fn execute_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::NotifyInvalid(invalidation) => {
                self.hooks.invalid.call(&invalidation);
            }
            ControllerCommand::StartBuild(request) => {
                self.spawn_build(request);
            }
            ControllerCommand::NotifyDone(report) => {
                self.hooks.done.call(&report);
            }
            ControllerCommand::NotifyFailed(message) => {
                self.hooks.failed.call(&WatchbuildError::ChangeSource(message));
            }
            ControllerCommand::Teardown => {
                self.aggregator.cancel();
                self.source.unsubscribe();
            }
            ControllerCommand::AcknowledgeClose => {
                self.hooks.closed.call(&());
                for waiter in self.close_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
    }

    /// Hand a build to the engine and report its completion back into the
    /// loop. A panicking build is reported as a failed build so the session
    /// does not stay in `Compiling` forever.
    fn spawn_build(&mut self, request: BuildRequest) {
        let BuildRequest { build_id, changes } = request;
        info!(
            build_id,
            changed = changes.changed().len(),
            removed = changes.removed().len(),
            "dispatching build"
        );

        let build = self.engine.run(&changes);
        let tx = self.build_tx.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match tokio::spawn(build).await {
                Ok(Ok(result)) => BuildOutcome::Completed(result),
                Ok(Err(err)) => {
                    warn!(build_id, error = %err, "build engine failed");
                    BuildOutcome::Failed(err.to_string())
                }
                Err(join_err) => {
                    warn!(build_id, error = %join_err, "build task aborted");
                    BuildOutcome::Failed(format!("build task aborted: {join_err}"))
                }
            };
            let completion = BuildCompletion {
                build_id,
                outcome,
                elapsed: started.elapsed(),
            };
            if tx.send(completion).is_err() {
                debug!(build_id, "session ended before build completion was delivered");
            }
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
