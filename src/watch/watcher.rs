// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{
    AccessKind, AccessMode, EventKind, MetadataKind, ModifyKind, RenameMode,
};
use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::engine::{PollSettings, WatchOptions};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::hash::ContentFilter;
use crate::watch::path_utils::canonical_roots;
use crate::watch::patterns::IgnoreFilter;
use crate::watch::source::{ChangeSink, ChangeSource};

/// Change source backed by the `notify` crate.
///
/// - Native OS notifications by default, or a `PollWatcher` when the options
///   ask for polling.
/// - Paths matching `ignored` are dropped.
/// - With `use_hash`, modify events whose content did not change are dropped.
/// - Watcher errors are reported as terminal failures through the sink.
pub struct NotifyChangeSource {
    poll: PollSettings,
    ignored: Vec<String>,
    use_hash: bool,
    fs: Arc<dyn FileSystem>,
    roots: Vec<PathBuf>,
    watcher: Option<Box<dyn Watcher + Send>>,
}

impl std::fmt::Debug for NotifyChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyChangeSource")
            .field("poll", &self.poll)
            .field("roots", &self.roots)
            .field("subscribed", &self.watcher.is_some())
            .finish_non_exhaustive()
    }
}

impl NotifyChangeSource {
    pub fn new(options: &WatchOptions) -> Self {
        Self {
            poll: options.poll,
            ignored: options.ignored.clone(),
            use_hash: options.use_hash,
            fs: Arc::new(RealFileSystem),
            roots: Vec::new(),
            watcher: None,
        }
    }
}

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&mut self, paths: &[PathBuf], sink: ChangeSink) -> Result<()> {
        self.unsubscribe();

        let roots = canonical_roots(paths);
        let ignore = IgnoreFilter::new(roots.clone(), &self.ignored)?;
        let mut content = self.use_hash.then(|| {
            let mut filter = ContentFilter::new(Arc::clone(&self.fs));
            filter.prime(&roots);
            filter
        });

        // Called synchronously by notify on its own thread.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate_event(&event, |p| p.exists()) {
                    if ignore.is_ignored(&change.path) {
                        continue;
                    }
                    if let Some(filter) = content.as_mut() {
                        if !filter.admit(&change) {
                            continue;
                        }
                    }
                    if !sink.notify(change) {
                        // Session is gone; nothing left to deliver to.
                        return;
                    }
                }
            }
            Err(err) => {
                sink.fail(err.to_string());
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.poll {
            PollSettings::Native => Box::new(RecommendedWatcher::new(handler, Config::default())?),
            PollSettings::Interval(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
        };

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        info!(roots = ?roots, poll = ?self.poll, "file watcher started");
        self.roots = roots;
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let Some(mut watcher) = self.watcher.take() else {
            return;
        };
        for root in &self.roots {
            if let Err(err) = watcher.unwatch(root) {
                debug!(root = ?root, error = %err, "unwatch failed");
            }
        }
        info!(roots = ?self.roots, "file watcher stopped");
        self.roots.clear();
    }
}

impl Drop for NotifyChangeSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Map a notify event onto zero or more change events.
///
/// `exists` resolves renames whose direction the backend did not report.
pub fn translate_event(event: &Event, exists: impl Fn(&Path) -> bool) -> Vec<ChangeEvent> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            return vec![
                ChangeEvent::removed(event.paths[0].clone()),
                ChangeEvent::added(event.paths[1].clone()),
            ];
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Added,
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .map(|p| {
                    if exists(p) {
                        ChangeEvent::added(p.clone())
                    } else {
                        ChangeEvent::removed(p.clone())
                    }
                })
                .collect();
        }
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => return Vec::new(),
        EventKind::Modify(_) | EventKind::Any => ChangeKind::Modified,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Modified,
        EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };

    if event.paths.is_empty() {
        warn!(?event, "notify event without paths");
    }

    event
        .paths
        .iter()
        .map(|p| ChangeEvent::new(p.clone(), kind))
        .collect()
}
