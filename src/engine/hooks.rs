// src/engine/hooks.rs

//! Listener registration for session notifications.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::engine::{BuildReport, Invalidation};
use crate::errors::WatchbuildError;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of listeners for one notification kind.
///
/// Listeners are called synchronously on the control loop, in registration
/// order. The list is snapshotted before dispatch, so a listener may register
/// further listeners or call back into the [`crate::Watching`] handle.
///
/// A panicking listener is logged and skipped; the remaining listeners still
/// run and the session keeps going.
pub struct Hook<T: ?Sized> {
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T: ?Sized> Default for Hook<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<T: ?Sized> Hook<T> {
    pub fn register(&self, listener: impl Fn(&T) + Send + Sync + 'static) {
        self.lock().push(Arc::new(listener));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn call(&self, arg: &T) {
        let snapshot: Vec<Listener<T>> = self.lock().clone();
        for (index, listener) in snapshot.into_iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(arg))) {
                warn!(
                    listener = index,
                    panic = panic_message(payload.as_ref()),
                    "hook listener panicked"
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener<T>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// All hooks of one watch session.
#[derive(Debug, Default)]
pub struct Hooks {
    /// Fires once per merged aggregation window (and per manual
    /// invalidation), whether or not builds are suspended.
    pub invalid: Hook<Invalidation>,
    /// Fires once per completed build.
    pub done: Hook<BuildReport>,
    /// Fires once if the change source fails.
    pub failed: Hook<WatchbuildError>,
    /// Fires once when teardown completes.
    pub closed: Hook<()>,
}
