use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use watchbuild::errors::{Result, WatchbuildError};
use watchbuild::types::ChangeEvent;
use watchbuild::watch::{ChangeSink, ChangeSource};

#[derive(Debug, Default)]
struct SourceState {
    sink: Option<ChangeSink>,
    paths: Vec<PathBuf>,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    subscribe_error: Option<String>,
}

/// A change source driven by hand from the test.
///
/// Hand the source to `start_watch` and keep the [`SourceHandle`] to push
/// events, report failures and check whether the session unsubscribed.
#[derive(Debug)]
pub struct ScriptedChangeSource {
    state: Arc<Mutex<SourceState>>,
}

/// Test-side half of a [`ScriptedChangeSource`].
#[derive(Debug, Clone)]
pub struct SourceHandle {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedChangeSource {
    pub fn new() -> (Self, SourceHandle) {
        let state = Arc::new(Mutex::new(SourceState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SourceHandle { state },
        )
    }

    /// A source whose `subscribe` fails with the given message.
    pub fn failing_subscribe(message: &str) -> (Self, SourceHandle) {
        let (source, handle) = Self::new();
        handle.lock().subscribe_error = Some(message.to_string());
        (source, handle)
    }
}

impl ChangeSource for ScriptedChangeSource {
    fn subscribe(&mut self, paths: &[PathBuf], sink: ChangeSink) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.subscribe_calls += 1;
        if let Some(message) = state.subscribe_error.clone() {
            return Err(WatchbuildError::ChangeSource(message));
        }
        state.paths = paths.to_vec();
        state.sink = Some(sink);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.unsubscribe_calls += 1;
        state.sink = None;
    }
}

impl SourceHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, SourceState> {
        self.state.lock().unwrap()
    }

    /// Deliver one event. Returns false if nobody is subscribed.
    pub fn emit(&self, event: ChangeEvent) -> bool {
        match &self.lock().sink {
            Some(sink) => sink.notify(event),
            None => false,
        }
    }

    pub fn modify(&self, path: &str) -> bool {
        self.emit(ChangeEvent::modified(path))
    }

    pub fn add(&self, path: &str) -> bool {
        self.emit(ChangeEvent::added(path))
    }

    pub fn remove(&self, path: &str) -> bool {
        self.emit(ChangeEvent::removed(path))
    }

    /// Report a terminal source error.
    pub fn fail(&self, message: &str) -> bool {
        match &self.lock().sink {
            Some(sink) => sink.fail(message),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().sink.is_some()
    }

    pub fn subscribed_paths(&self) -> Vec<PathBuf> {
        self.lock().paths.clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.lock().unsubscribe_calls
    }
}
