// src/build/engine.rs

//! Pluggable build engine abstraction.
//!
//! The control loop hands every build to a `BuildEngine` and awaits the
//! returned future on a separate Tokio task, so it keeps observing changes
//! while a build runs. It never calls `run` again before the previous future
//! has resolved.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::ChangeSet;

/// Future returned by [`BuildEngine::run`].
///
/// It must be `'static` because the control loop spawns it.
pub type BuildFuture = Pin<Box<dyn Future<Output = Result<BuildResult>> + Send + 'static>>;

/// Trait abstracting how one build is performed.
pub trait BuildEngine: Send + 'static {
    /// Start a build for the given change set.
    ///
    /// An empty set means "build everything" (initial or manual build).
    fn run(&mut self, changes: &ChangeSet) -> BuildFuture;
}

/// What a completed build produced.
///
/// Errors and warnings here are build failures reported as data; the watch
/// session keeps going regardless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Files written by the build, if the engine reports them.
    pub artifacts: Vec<PathBuf>,
    /// Captured output lines, in order.
    pub output: Vec<String>,
}

impl BuildResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// How a build ended, as delivered through the `done` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The engine ran to completion. The result may still carry errors.
    Completed(BuildResult),
    /// The engine itself failed (could not spawn, panicked, ...).
    Failed(String),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Completed(result) if !result.has_errors())
    }

    pub fn result(&self) -> Option<&BuildResult> {
        match self {
            BuildOutcome::Completed(result) => Some(result),
            BuildOutcome::Failed(_) => None,
        }
    }
}
