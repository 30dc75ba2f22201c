// src/build/command.rs

//! Shell-command build engine.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::build::engine::{BuildEngine, BuildFuture, BuildResult};
use crate::errors::{Result, WatchbuildError};
use crate::types::ChangeSet;

/// Environment variable listing changed paths, one per line.
pub const CHANGED_ENV: &str = "WATCHBUILD_CHANGED";
/// Environment variable listing removed paths, one per line.
pub const REMOVED_ENV: &str = "WATCHBUILD_REMOVED";

/// Runs a shell command as the build.
///
/// - The command runs through `sh -c` (or `cmd /C` on Windows).
/// - The change set is exported through [`CHANGED_ENV`] / [`REMOVED_ENV`] so
///   the command can do incremental work.
/// - Exit status 0 is a success; anything else adds an error to the result.
/// - Output lines matching `error_pattern` / `warning_pattern` become
///   result errors / warnings.
#[derive(Debug, Clone)]
pub struct CommandBuildEngine {
    cmd: String,
    cwd: Option<PathBuf>,
    error_pattern: Option<Regex>,
    warning_pattern: Option<Regex>,
}

impl CommandBuildEngine {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: None,
            error_pattern: None,
            warning_pattern: None,
        }
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn error_pattern(mut self, pattern: &str) -> Result<Self> {
        self.error_pattern = Some(compile_pattern("error_pattern", pattern)?);
        Ok(self)
    }

    pub fn warning_pattern(mut self, pattern: &str) -> Result<Self> {
        self.warning_pattern = Some(compile_pattern("warning_pattern", pattern)?);
        Ok(self)
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn execute(self, changed: Vec<PathBuf>, removed: Vec<PathBuf>) -> Result<BuildResult> {
        info!(
            cmd = %self.cmd,
            changed = changed.len(),
            removed = removed.len(),
            "starting build command"
        );

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        cmd.env(CHANGED_ENV, join_paths(&changed))
            .env(REMOVED_ENV, join_paths(&removed))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning build command '{}'", self.cmd))?;

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for build command '{}'", self.cmd))?;

        let mut result = BuildResult::default();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            self.classify_line(line, &mut result);
        }

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            result
                .errors
                .push(format!("build command exited with code {code}"));
        }

        info!(
            cmd = %self.cmd,
            exit_code = code,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "build command finished"
        );

        Ok(result)
    }

    fn classify_line(&self, line: &str, result: &mut BuildResult) {
        debug!(cmd = %self.cmd, "output: {}", line);
        if self.error_pattern.as_ref().is_some_and(|re| re.is_match(line)) {
            result.errors.push(line.to_string());
        } else if self
            .warning_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(line))
        {
            result.warnings.push(line.to_string());
        }
        result.output.push(line.to_string());
    }
}

impl BuildEngine for CommandBuildEngine {
    fn run(&mut self, changes: &ChangeSet) -> BuildFuture {
        // Clone so the future doesn't borrow `self` past this call.
        let engine = self.clone();
        let (changed, removed) = changes.clone().into_parts();
        Box::pin(engine.execute(changed, removed))
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        WatchbuildError::ConfigError(format!("invalid {field} regex '{pattern}': {e}"))
    })
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n")
}
