// src/build/mod.rs

//! Build engine abstraction.
//!
//! The controller talks to a [`BuildEngine`] instead of running anything
//! itself. Production uses [`CommandBuildEngine`], which runs a shell
//! command; tests plug in fakes that record invocations and complete on
//! demand.
//!
//! - [`engine`] defines the trait and the result types.
//! - [`command`] runs a configured shell command as a build.

pub mod command;
pub mod engine;

pub use command::CommandBuildEngine;
pub use engine::{BuildEngine, BuildFuture, BuildOutcome, BuildResult};
