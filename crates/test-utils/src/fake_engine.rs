use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use watchbuild::build::{BuildEngine, BuildFuture, BuildResult};
use watchbuild::errors::WatchbuildError;
use watchbuild::types::ChangeSet;

/// How the fake completes a build.
#[derive(Debug, Clone, Copy)]
enum Completion {
    /// Resolve on the next poll.
    Immediate,
    /// Resolve after sleeping (works with paused Tokio time).
    After(Duration),
    /// Resolve only when the test calls [`FakeBuildEngine::release_next`].
    Gated,
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Vec<ChangeSet>,
    in_flight: usize,
    max_in_flight: usize,
    gates: VecDeque<oneshot::Sender<()>>,
    failures: VecDeque<String>,
}

/// A fake build engine that:
/// - records the change set of every build it is asked to run
/// - tracks how many builds are in flight at once
/// - completes builds immediately, after a delay, or when released
#[derive(Debug, Clone)]
pub struct FakeBuildEngine {
    completion: Completion,
    state: Arc<Mutex<EngineState>>,
    started_tx: Arc<watch::Sender<usize>>,
}

impl FakeBuildEngine {
    fn with_completion(completion: Completion) -> Self {
        let (started_tx, _) = watch::channel(0);
        Self {
            completion,
            state: Arc::new(Mutex::new(EngineState::default())),
            started_tx: Arc::new(started_tx),
        }
    }

    pub fn immediate() -> Self {
        Self::with_completion(Completion::Immediate)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::with_completion(Completion::After(delay))
    }

    pub fn gated() -> Self {
        Self::with_completion(Completion::Gated)
    }

    /// Make the next build return an engine error.
    pub fn fail_next(&self, message: &str) {
        self.state.lock().unwrap().failures.push_back(message.to_string());
    }

    /// Let the oldest gated build complete. Returns false if none is waiting.
    pub fn release_next(&self) -> bool {
        let gate = self.state.lock().unwrap().gates.pop_front();
        match gate {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Change sets of all builds started so far, in order.
    pub fn calls(&self) -> Vec<ChangeSet> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }

    /// Highest number of builds that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Wait until at least `n` builds have been started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.started_tx.subscribe();
        rx.wait_for(|count| *count >= n)
            .await
            .expect("fake engine dropped while waiting for builds");
    }
}

/// Decrements the in-flight counter when the build future finishes or is
/// dropped.
struct InFlightGuard {
    state: Arc<Mutex<EngineState>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.in_flight -= 1;
        }
    }
}

impl BuildEngine for FakeBuildEngine {
    fn run(&mut self, changes: &ChangeSet) -> BuildFuture {
        let (failure, gate, count) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(changes.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);

            let gate = match self.completion {
                Completion::Gated => {
                    let (tx, rx) = oneshot::channel();
                    state.gates.push_back(tx);
                    Some(rx)
                }
                _ => None,
            };
            (state.failures.pop_front(), gate, state.calls.len())
        };
        self.started_tx.send_replace(count);

        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
        };
        let completion = self.completion;

        Box::pin(async move {
            let _guard = guard;
            match completion {
                Completion::Immediate => {}
                Completion::After(delay) => tokio::time::sleep(delay).await,
                Completion::Gated => {
                    if let Some(rx) = gate {
                        let _ = rx.await;
                    }
                }
            }
            match failure {
                Some(message) => Err(WatchbuildError::Other(anyhow::anyhow!(message))),
                None => Ok(BuildResult::success()),
            }
        })
    }
}
