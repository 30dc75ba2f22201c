// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchbuildError};
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WatchbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.build))
    }
}

/// Check semantic invariants that serde cannot express.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch_section(cfg)?;
    validate_build_section(cfg)?;
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.paths.is_empty() {
        return Err(WatchbuildError::ConfigError(
            "[watch].paths must list at least one path".to_string(),
        ));
    }

    if cfg.watch.poll_interval_ms == Some(0) {
        return Err(WatchbuildError::ConfigError(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    build_globset(&cfg.watch.ignored).map_err(|e| {
        WatchbuildError::ConfigError(format!("[watch].ignored: {e:#}"))
    })?;

    Ok(())
}

fn validate_build_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.cmd.trim().is_empty() {
        return Err(WatchbuildError::ConfigError(
            "[build].cmd must not be empty".to_string(),
        ));
    }

    for (field, pattern) in [
        ("error_pattern", &cfg.build.error_pattern),
        ("warning_pattern", &cfg.build.warning_pattern),
    ] {
        if let Some(pattern) = pattern {
            Regex::new(pattern).map_err(|e| {
                WatchbuildError::ConfigError(format!(
                    "[build].{field} is not a valid regex: {e}"
                ))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;
    use crate::config::loader::parse_str;
    use crate::engine::PollSettings;

    fn load(toml: &str) -> Result<ConfigFile> {
        ConfigFile::try_from(parse_str(toml)?)
    }

    #[test]
    fn minimal_config_gets_defaults() -> Result<()> {
        let cfg = load(
            r#"
[watch]
paths = ["src"]

[build]
cmd = "make"
"#,
        )?;

        let options = cfg.watch_options();
        assert_eq!(options.aggregate_timeout, Duration::from_millis(200));
        assert_eq!(options.poll, PollSettings::Native);
        assert!(!options.use_hash);
        assert_eq!(
            cfg.watch_paths(Path::new("/proj")),
            vec![PathBuf::from("/proj/src")]
        );
        Ok(())
    }

    #[test]
    fn poll_interval_selects_polling() -> Result<()> {
        let cfg = load(
            r#"
[watch]
paths = ["/abs/src"]
poll_interval_ms = 250
aggregate_timeout_ms = 50

[build]
cmd = "make"
"#,
        )?;

        let options = cfg.watch_options();
        assert_eq!(options.poll, PollSettings::Interval(Duration::from_millis(250)));
        assert_eq!(options.aggregate_timeout, Duration::from_millis(50));
        assert_eq!(
            cfg.watch_paths(Path::new("/proj")),
            vec![PathBuf::from("/abs/src")]
        );
        Ok(())
    }

    #[test]
    fn empty_paths_are_rejected() {
        let err = load(
            r#"
[watch]
paths = []

[build]
cmd = "make"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, WatchbuildError::ConfigError(msg) if msg.contains("paths")));
    }

    #[test]
    fn bad_regex_is_rejected() {
        let err = load(
            r#"
[watch]
paths = ["src"]

[build]
cmd = "make"
warning_pattern = "(unclosed"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, WatchbuildError::ConfigError(msg) if msg.contains("warning_pattern")));
    }

    #[test]
    fn unknown_fields_are_a_toml_error() {
        let err = load(
            r#"
[watch]
paths = ["src"]
aggregateTimeout = 10

[build]
cmd = "make"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, WatchbuildError::TomlError(_)));
    }
}
