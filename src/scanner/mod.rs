//! Dependency scanning.
//!
//! A scanner reads one file's content and reports the files it directly
//! depends on. It never runs the compiler and never follows dependencies
//! itself; the build graph computes transitivity.

mod c;

pub use c::CIncludeScanner;

use crate::error::{ConfigError, ScanWarning};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Search paths a scanner resolves dependencies against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub include_dirs: Vec<PathBuf>,
}

impl ScanContext {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }

    /// Derive search paths from `-I<dir>`, `-I <dir>` and `-isystem <dir>` flags.
    ///
    /// Relative directories are resolved against `root`.
    pub fn from_flags<'a>(root: &Path, flags: impl IntoIterator<Item = &'a String>) -> Self {
        let mut include_dirs = Vec::new();
        let mut flags = flags.into_iter();
        while let Some(flag) = flags.next() {
            let dir = match flag.as_str() {
                "-I" | "-isystem" => flags.next().map(String::as_str),
                f => f.strip_prefix("-I").or_else(|| f.strip_prefix("-isystem")),
            };
            if let Some(dir) = dir.filter(|d| !d.is_empty()) {
                let dir = root.join(dir);
                if !include_dirs.contains(&dir) {
                    include_dirs.push(dir);
                }
            }
        }
        Self { include_dirs }
    }
}

/// Result of scanning a single file.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Resolved, existing dependency paths.
    pub dependencies: Vec<PathBuf>,
    pub warnings: Vec<ScanWarning>,
}

/// Per-language dependency extraction.
pub trait DependencyScanner: Send + Sync {
    fn scan(&self, file: &Path, content: &str, ctx: &ScanContext) -> ScanOutcome;
}

/// Scanner for languages without file-level dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScanner;

impl DependencyScanner for NullScanner {
    fn scan(&self, _file: &Path, _content: &str, _ctx: &ScanContext) -> ScanOutcome {
        ScanOutcome::default()
    }
}

/// Look up a scanner by its configuration name.
pub fn scanner_by_name(name: &str) -> Result<Arc<dyn DependencyScanner>, ConfigError> {
    match name.to_lowercase().as_str() {
        "c" | "cpp" | "c++" => Ok(Arc::new(CIncludeScanner::new())),
        "none" => Ok(Arc::new(NullScanner)),
        other => Err(ConfigError::UnknownScanner(other.to_string())),
    }
}
