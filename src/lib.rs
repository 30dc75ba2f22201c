// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;
pub mod watching;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::build::{BuildEngine, BuildOutcome, CommandBuildEngine};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::BuildReport;
use crate::types::ChangeSet;
use crate::watch::NotifyChangeSource;

pub use crate::build::BuildResult;
pub use crate::engine::{Invalidation, WatchOptions, WatchStatus};
pub use crate::errors::WatchbuildError;
pub use crate::watching::{Watching, WeakWatching, start_watch};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the command build engine
/// - the notify change source and the watch session
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root_dir = config_root_dir(&config_path);

    if args.dry_run {
        print_dry_run(&cfg, &root_dir);
        return Ok(());
    }

    let mut engine = command_engine(&cfg, &root_dir)?;

    if args.once {
        info!("running a single build (--once)");
        let result = engine.run(&ChangeSet::new()).await?;
        print_outcome(&BuildOutcome::Completed(result.clone()));
        if result.has_errors() {
            bail!("build failed with {} error(s)", result.errors.len());
        }
        return Ok(());
    }

    let options = cfg.watch_options();
    let paths = cfg.watch_paths(&root_dir);
    info!(?paths, aggregate_timeout = ?options.aggregate_timeout, "starting watch");

    let source = NotifyChangeSource::new(&options);
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<String>();

    let watching = start_watch(paths, options, source, engine, move |event| match event {
        Ok(report) => print_report(report),
        Err(err) => {
            let _ = fatal_tx.send(err.to_string());
        }
    })?;

    watching.on_invalid(|invalidation| {
        debug!(
            reason = ?invalidation.reason,
            changed = invalidation.changes.changed().len(),
            removed = invalidation.changes.removed().len(),
            "output invalidated"
        );
    });

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("shutdown requested");
            watching.close().await;
            Ok(())
        }
        Some(message) = fatal_rx.recv() => {
            watching.close().await;
            bail!("watching stopped: {message}")
        }
    }
}

/// Build the configured command engine, running in the config directory.
fn command_engine(cfg: &ConfigFile, root_dir: &Path) -> crate::errors::Result<CommandBuildEngine> {
    let build = cfg.build_section();
    let mut engine = CommandBuildEngine::new(build.cmd.clone()).current_dir(root_dir);
    if let Some(pattern) = &build.error_pattern {
        engine = engine.error_pattern(pattern)?;
    }
    if let Some(pattern) = &build.warning_pattern {
        engine = engine.warning_pattern(pattern)?;
    }
    Ok(engine)
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "configs/Watchbuild.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Watchbuild.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_report(report: &BuildReport) {
    println!(
        "build #{} finished in {} ms ({} changed, {} removed)",
        report.build_id,
        report.elapsed.as_millis(),
        report.changes.changed().len(),
        report.changes.removed().len(),
    );
    print_outcome(&report.outcome);
}

fn print_outcome(outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::Completed(result) => {
            for warning in &result.warnings {
                println!("  warning: {warning}");
            }
            for error in &result.errors {
                println!("  error: {error}");
            }
            if !result.has_errors() {
                println!("  ok");
            }
        }
        BuildOutcome::Failed(message) => println!("  build engine failed: {message}"),
    }
}

/// Simple dry-run output: print the resolved watch and build settings.
fn print_dry_run(cfg: &ConfigFile, root_dir: &Path) {
    let watch = cfg.watch_section();
    let build = cfg.build_section();
    let options = cfg.watch_options();

    println!("watchbuild dry-run");
    println!("  root = {}", root_dir.display());
    println!();

    println!("watch:");
    for path in cfg.watch_paths(root_dir) {
        println!("  - {}", path.display());
    }
    println!("  aggregate_timeout = {:?}", options.aggregate_timeout);
    println!("  poll = {:?}", options.poll);
    if !watch.ignored.is_empty() {
        println!("  ignored: {:?}", watch.ignored);
    }
    if watch.use_hash {
        println!("  use_hash: true");
    }
    println!();

    println!("build:");
    println!("  cmd: {}", build.cmd);
    if let Some(ref p) = build.error_pattern {
        println!("  error_pattern: {p}");
    }
    if let Some(ref p) = build.warning_pattern {
        println!("  warning_pattern: {p}");
    }

    debug!("dry-run complete (no build)");
}
