// src/watching.rs

//! The caller-facing handle of a watch session.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::build::BuildEngine;
use crate::engine::runtime::ControlCommand;
use crate::engine::{
    BuildReport, Hooks, Invalidation, Runtime, SharedWatchOptions, WatchOptions, WatchStatus,
};
use crate::errors::{Result, WatchbuildError};
use crate::watch::{ChangeSink, ChangeSource};

/// Handle to a running watch session.
///
/// Cloning is cheap; all clones control the same session. `suspend`,
/// `resume` and `invalidate` are non-blocking and may be called from
/// anywhere, including from inside a hook listener. Dropping every clone
/// closes the session.
///
/// A listener that needs the handle should capture a [`WeakWatching`] from
/// [`Watching::downgrade`]. A strong clone stored inside a listener keeps the
/// session alive until `close()` is called.
#[derive(Debug, Clone)]
pub struct Watching {
    control_tx: mpsc::UnboundedSender<ControlCommand>,
    options: SharedWatchOptions,
    hooks: Arc<Hooks>,
}

impl Watching {
    /// Stop starting builds. Changes keep being observed and accumulated.
    pub fn suspend(&self) {
        self.send(ControlCommand::Suspend);
    }

    /// Start building again. If anything changed while suspended and no
    /// build is running, one build starts with everything accumulated.
    /// No-op when not suspended.
    pub fn resume(&self) {
        self.send(ControlCommand::Resume);
    }

    /// Request a rebuild without a file change.
    pub fn invalidate(&self) {
        self.send(ControlCommand::Invalidate);
    }

    /// Close the session and wait until teardown has completed.
    ///
    /// A build in flight is allowed to finish first, but its result is not
    /// delivered. Safe to call repeatedly; once the session is gone this
    /// returns immediately.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(ControlCommand::Close(ack_tx)).is_err() {
            return;
        }
        // An error only means the loop ended without acknowledging us, which
        // is still "closed".
        let _ = ack_rx.await;
    }

    /// Close the session and call `on_closed` once teardown has completed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn close_with(&self, on_closed: impl FnOnce() + Send + 'static) {
        let this = self.clone();
        tokio::spawn(async move {
            this.close().await;
            on_closed();
        });
    }

    /// Snapshot of the controller state, taken in order with every other
    /// input of the session.
    pub async fn status(&self) -> Result<WatchStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(ControlCommand::Status(reply_tx))
            .map_err(|_| WatchbuildError::SessionClosed)?;
        reply_rx.await.map_err(|_| WatchbuildError::SessionClosed)
    }

    /// True once the control loop has exited.
    pub fn is_closed(&self) -> bool {
        self.control_tx.is_closed()
    }

    /// Live options of this session. Changing `aggregate_timeout` affects
    /// aggregation windows armed after the change.
    pub fn options(&self) -> &SharedWatchOptions {
        &self.options
    }

    /// A handle that does not keep the session alive.
    pub fn downgrade(&self) -> WeakWatching {
        WeakWatching {
            control_tx: self.control_tx.downgrade(),
            options: self.options.clone(),
            hooks: Arc::downgrade(&self.hooks),
        }
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn on_invalid(&self, listener: impl Fn(&Invalidation) + Send + Sync + 'static) {
        self.hooks.invalid.register(listener);
    }

    pub fn on_done(&self, listener: impl Fn(&BuildReport) + Send + Sync + 'static) {
        self.hooks.done.register(listener);
    }

    pub fn on_failed(&self, listener: impl Fn(&WatchbuildError) + Send + Sync + 'static) {
        self.hooks.failed.register(listener);
    }

    pub fn on_closed(&self, listener: impl Fn(&()) + Send + Sync + 'static) {
        self.hooks.closed.register(listener);
    }

    fn send(&self, cmd: ControlCommand) {
        if self.control_tx.send(cmd).is_err() {
            debug!("watch session already closed; ignoring command");
        }
    }
}

/// Non-owning counterpart of [`Watching`], for use inside hook listeners.
#[derive(Debug, Clone)]
pub struct WeakWatching {
    control_tx: mpsc::WeakUnboundedSender<ControlCommand>,
    options: SharedWatchOptions,
    hooks: Weak<Hooks>,
}

impl WeakWatching {
    /// A strong handle, or `None` once every [`Watching`] is gone.
    pub fn upgrade(&self) -> Option<Watching> {
        Some(Watching {
            control_tx: self.control_tx.upgrade()?,
            options: self.options.clone(),
            hooks: self.hooks.upgrade()?,
        })
    }

    pub fn suspend(&self) {
        if let Some(watching) = self.upgrade() {
            watching.suspend();
        }
    }

    pub fn resume(&self) {
        if let Some(watching) = self.upgrade() {
            watching.resume();
        }
    }

    pub fn invalidate(&self) {
        if let Some(watching) = self.upgrade() {
            watching.invalidate();
        }
    }
}

/// Start a watch session.
///
/// - Subscribes `source` to `paths` (errors here are returned directly).
/// - Spawns the control loop, which immediately starts an initial full build.
/// - `handler` is registered before the loop starts, so it sees every build:
///   it receives `Ok(report)` after each completed build and `Err(error)` if
///   the change source fails terminally.
///
/// Hook listeners added through the returned handle on a multi-threaded
/// runtime may miss the initial build; use `handler` when that matters.
///
/// Must be called from within a Tokio runtime.
pub fn start_watch<S, E, H>(
    paths: Vec<PathBuf>,
    options: WatchOptions,
    mut source: S,
    engine: E,
    handler: H,
) -> Result<Watching>
where
    S: ChangeSource + 'static,
    E: BuildEngine,
    H: Fn(std::result::Result<&BuildReport, &WatchbuildError>) + Send + Sync + 'static,
{
    let hooks = Arc::new(Hooks::default());
    let handler = Arc::new(handler);
    {
        let handler = Arc::clone(&handler);
        hooks.done.register(move |report| handler(Ok(report)));
    }
    hooks.failed.register(move |err| handler(Err(err)));

    let (source_tx, source_rx) = mpsc::unbounded_channel();
    source.subscribe(&paths, ChangeSink::new(source_tx))?;

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let options = SharedWatchOptions::new(options);

    let runtime = Runtime::new(
        options.clone(),
        Arc::clone(&hooks),
        Box::new(source),
        engine,
        control_rx,
        source_rx,
    );

    tokio::spawn(async move {
        if let Err(err) = runtime.run().await {
            tracing::error!(error = %err, "watch session ended with an error");
        }
    });

    Ok(Watching {
        control_tx,
        options,
        hooks,
    })
}
