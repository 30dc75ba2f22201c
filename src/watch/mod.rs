// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - The [`ChangeSource`] contract the control loop consumes.
//! - A cross-platform filesystem change source on top of `notify`
//!   ([`NotifyChangeSource`]), native or polling.
//! - Compiling `ignored` glob patterns.
//! - (Optionally) content hashing to drop notifications for files whose
//!   content did not actually change.
//!
//! It does **not** know about builds or suspension; it only turns filesystem
//! activity into [`ChangeEvent`](crate::types::ChangeEvent)s.

pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod source;
pub mod watcher;

pub use hash::{compute_file_hash, ContentFilter};
pub use patterns::IgnoreFilter;
pub use source::{ChangeSink, ChangeSource, SourceMessage};
pub use watcher::{translate_event, NotifyChangeSource};
