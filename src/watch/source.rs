// src/watch/source.rs

//! Change source contract consumed by the control loop.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::ChangeEvent;

/// Message from a change source into the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
    Change(ChangeEvent),
    /// Terminal error; the session closes after reporting it.
    Failed(String),
}

/// Where a change source delivers its notifications.
///
/// Cheap to clone and usable from any thread, including the synchronous
/// callbacks of OS watcher backends.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    tx: mpsc::UnboundedSender<SourceMessage>,
}

impl ChangeSink {
    pub fn new(tx: mpsc::UnboundedSender<SourceMessage>) -> Self {
        Self { tx }
    }

    /// Deliver one change. Returns false once the session is gone.
    pub fn notify(&self, event: ChangeEvent) -> bool {
        self.tx.send(SourceMessage::Change(event)).is_ok()
    }

    /// Report a terminal error. Returns false once the session is gone.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(SourceMessage::Failed(message.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Trait abstracting where raw change notifications come from.
///
/// Production code uses [`crate::watch::NotifyChangeSource`]; tests drive a
/// scripted source by hand.
///
/// Delivery is at-least-once: the same physical edit may be reported more
/// than once, and there is no ordering across unrelated paths. A remove
/// followed by a recreate of one path must arrive as two ordered events.
pub trait ChangeSource: Send {
    /// Start delivering changes under `paths` to `sink`.
    fn subscribe(&mut self, paths: &[PathBuf], sink: ChangeSink) -> Result<()>;

    /// Stop delivering changes. Must be safe to call more than once.
    fn unsubscribe(&mut self);
}
