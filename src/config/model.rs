// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{PollSettings, WatchOptions};
use crate::engine::options::DEFAULT_AGGREGATE_TIMEOUT;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// paths = ["src"]
/// aggregate_timeout_ms = 200
/// ignored = ["**/*.tmp"]
///
/// [build]
/// cmd = "cat src/*.js > dist/bundle.js"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub watch: WatchSection,
    pub build: BuildSection,
}

/// Validated configuration.
///
/// Constructed via `ConfigFile::try_from(RawConfigFile)` (see `validate.rs`),
/// so everything downstream can assume the invariants hold.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    watch: WatchSection,
    build: BuildSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, build: BuildSection) -> Self {
        Self { watch, build }
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    pub fn build_section(&self) -> &BuildSection {
        &self.build
    }

    /// Runtime options derived from `[watch]`.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            aggregate_timeout: Duration::from_millis(self.watch.aggregate_timeout_ms),
            poll: match self.watch.poll_interval_ms {
                Some(ms) => PollSettings::Interval(Duration::from_millis(ms)),
                None => PollSettings::Native,
            },
            ignored: self.watch.ignored.clone(),
            use_hash: self.watch.use_hash,
        }
    }

    /// Watched paths, resolved against `root` when relative.
    pub fn watch_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.watch
            .paths
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
            .collect()
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Files or directories to watch (recursively), relative to the config
    /// file's directory.
    pub paths: Vec<PathBuf>,

    /// Inactivity window in milliseconds before a burst of changes triggers
    /// a build.
    #[serde(default = "default_aggregate_timeout_ms")]
    pub aggregate_timeout_ms: u64,

    /// Poll the filesystem at this interval instead of using native events.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    /// Glob patterns whose changes are ignored.
    #[serde(default)]
    pub ignored: Vec<String>,

    /// Only report modifications that change file content.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_aggregate_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_AGGREGATE_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Shell command that performs one build.
    pub cmd: String,

    /// Regex; output lines matching it are reported as build errors.
    #[serde(default)]
    pub error_pattern: Option<String>,

    /// Regex; output lines matching it are reported as build warnings.
    #[serde(default)]
    pub warning_pattern: Option<String>,
}
