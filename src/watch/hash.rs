// src/watch/hash.rs

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::types::{ChangeEvent, ChangeKind};

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut hasher = Hasher::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Drops modify notifications whose file content did not change.
///
/// Editors and tools often touch files (save without edits, rewrite with the
/// same bytes). With `use_hash` enabled the change source remembers a
/// content hash per file and only forwards a `Modified`/`Added` event when
/// the hash differs from the last one seen. Removals always pass and forget
/// the hash, so a later recreate is reported again.
///
/// Anything that cannot be hashed (directories, unreadable files) passes.
#[derive(Debug)]
pub struct ContentFilter {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, String>,
}

impl ContentFilter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Record hashes for every file under `roots`, so the first touch of an
    /// unchanged file is already filtered.
    pub fn prime(&mut self, roots: &[PathBuf]) {
        let mut stack: Vec<PathBuf> = roots.to_vec();
        while let Some(path) = stack.pop() {
            if self.fs.is_dir(&path) {
                match self.fs.read_dir(&path) {
                    Ok(children) => stack.extend(children),
                    Err(err) => warn!(dir = ?path, error = %err, "failed to list directory for hashing"),
                }
            } else if self.fs.is_file(&path) {
                if let Ok(hash) = compute_file_hash(self.fs.as_ref(), &path) {
                    self.hashes.insert(path, hash);
                }
            }
        }
        debug!(files = self.hashes.len(), "primed content hashes");
    }

    /// Whether `event` should be forwarded.
    pub fn admit(&mut self, event: &ChangeEvent) -> bool {
        if event.kind == ChangeKind::Removed {
            self.hashes.remove(&event.path);
            return true;
        }
        if !self.fs.is_file(&event.path) {
            return true;
        }

        let hash = match compute_file_hash(self.fs.as_ref(), &event.path) {
            Ok(h) => h,
            Err(err) => {
                debug!(path = ?event.path, error = %err, "could not hash changed file; forwarding");
                return true;
            }
        };

        match self.hashes.get(&event.path) {
            Some(old) if *old == hash => {
                debug!(path = ?event.path, "content unchanged; dropping event");
                false
            }
            _ => {
                self.hashes.insert(event.path.clone(), hash);
                true
            }
        }
    }
}
