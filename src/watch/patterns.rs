// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::watch::path_utils::relative_str;

/// Compiled `ignored` patterns for a set of watched roots.
///
/// Patterns are matched against the path relative to each watched root
/// (e.g. `"dist/bundle.js"` for `<root>/dist/bundle.js`), and also against
/// the full path so absolute patterns work.
///
/// ```toml
/// [watch]
/// paths = ["src"]
/// ignored = ["**/node_modules/**", "**/*.tmp"]
/// ```
#[derive(Clone)]
pub struct IgnoreFilter {
    roots: Vec<PathBuf>,
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for IgnoreFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreFilter")
            .field("roots", &self.roots)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl IgnoreFilter {
    pub fn new(roots: Vec<PathBuf>, patterns: &[String]) -> Result<Self> {
        let set = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns).context("building ignored globset")?)
        };
        Ok(Self {
            roots,
            patterns: patterns.to_vec(),
            set,
        })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(set) = &self.set else {
            return false;
        };

        for root in &self.roots {
            if let Some(rel) = relative_str(root, path) {
                if !rel.is_empty() && set.is_match(&rel) {
                    return true;
                }
            }
        }

        set.is_match(path)
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> IgnoreFilter {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        IgnoreFilter::new(vec![PathBuf::from("/proj")], &patterns).unwrap()
    }

    #[test]
    fn matches_relative_to_root() {
        let f = filter(&["dist/**", "**/node_modules/**"]);

        assert!(f.is_ignored(Path::new("/proj/dist/bundle.js")));
        assert!(f.is_ignored(Path::new("/proj/node_modules/lodash/index.js")));
        assert!(f.is_ignored(Path::new("/proj/pkg/node_modules/x.js")));
        assert!(!f.is_ignored(Path::new("/proj/src/index.js")));
    }

    #[test]
    fn empty_patterns_ignore_nothing() {
        assert!(!filter(&[]).is_ignored(Path::new("/proj/dist/bundle.js")));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let err = IgnoreFilter::new(Vec::new(), &["a[".to_string()]).unwrap_err();
        assert!(format!("{err:#}").contains("invalid glob pattern"));
    }
}
