#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use watchbuild::build::BuildEngine;
use watchbuild::engine::{BuildReport, Invalidation, WatchOptions};
use watchbuild::errors::Result;
use watchbuild::watch::ChangeSource;
use watchbuild::{Watching, start_watch};

pub use watchbuild_test_utils::{init_tracing, with_timeout};

/// Window length used by the paused-time tests.
pub const WINDOW: Duration = Duration::from_millis(200);

/// One notification observed by a test session, in dispatch order.
#[derive(Debug, Clone)]
pub enum Seen {
    Invalid(Invalidation),
    Done(BuildReport),
    Failed(String),
    Closed,
}

impl Seen {
    pub fn is_done(&self) -> bool {
        matches!(self, Seen::Done(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Seen::Invalid(_))
    }
}

/// A started session plus the stream of everything its hooks reported.
pub struct Session {
    pub watching: Watching,
    pub seen: mpsc::UnboundedReceiver<Seen>,
}

impl Session {
    /// Start watching `src/` with the given source and engine and record every
    /// hook notification.
    ///
    /// Must be called on a current-thread runtime (the `tokio::test` default)
    /// so the `invalid` and `closed` listeners are in place before the control
    /// loop first runs.
    pub fn start<S, E>(source: S, engine: E, options: WatchOptions) -> Result<Self>
    where
        S: ChangeSource + 'static,
        E: BuildEngine,
    {
        let (tx, seen) = mpsc::unbounded_channel();

        let handler_tx = tx.clone();
        let watching = start_watch(
            vec![PathBuf::from("src")],
            options,
            source,
            engine,
            move |event| {
                let _ = handler_tx.send(match event {
                    Ok(report) => Seen::Done(report.clone()),
                    Err(err) => Seen::Failed(err.to_string()),
                });
            },
        )?;

        {
            let tx = tx.clone();
            watching.on_invalid(move |inv| {
                let _ = tx.send(Seen::Invalid(inv.clone()));
            });
        }
        watching.on_closed(move |_| {
            let _ = tx.send(Seen::Closed);
        });

        Ok(Self { watching, seen })
    }

    /// Next notification, failing the test if none arrives in time.
    pub async fn next(&mut self) -> Seen {
        with_timeout(self.seen.recv())
            .await
            .expect("notification channel closed")
    }

    /// Next `done` report, skipping any `invalid` notifications before it.
    pub async fn next_done(&mut self) -> BuildReport {
        loop {
            match self.next().await {
                Seen::Done(report) => return report,
                Seen::Invalid(_) => continue,
                other => panic!("expected done, got {other:?}"),
            }
        }
    }

    /// Everything reported so far, without waiting.
    pub fn drain(&mut self) -> Vec<Seen> {
        let mut out = Vec::new();
        while let Ok(seen) = self.seen.try_recv() {
            out.push(seen);
        }
        out
    }
}

/// Options with the test window and native watching.
pub fn options() -> WatchOptions {
    WatchOptions::default().with_aggregate_timeout(WINDOW)
}

pub fn count_done(seen: &[Seen]) -> usize {
    seen.iter().filter(|s| s.is_done()).count()
}

pub fn count_invalid(seen: &[Seen]) -> usize {
    seen.iter().filter(|s| s.is_invalid()).count()
}
