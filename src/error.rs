//! Error taxonomy for a build invocation.
//!
//! Only [`ConfigError`] and the fatal [`BuildError`] variants stop a build.
//! [`ScanWarning`]s and [`CompileError`]s are collected and reported together
//! in the final [`crate::build::BuildResult`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration, detected before any scanning begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("project name must not be empty")]
    EmptyName,

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("unknown build type '{0}' (expected debug, release or release-small)")]
    UnknownBuildType(String),

    #[error("language binding '{0}' has no file extensions")]
    NoExtensions(String),

    #[error("extension '.{extension}' is already bound to language '{owner}'")]
    ExtensionTaken { extension: String, owner: String },

    #[error("unknown dependency scanner '{0}' (expected c or none)")]
    UnknownScanner(String),

    #[error("no C compiler found on PATH (tried clang and gcc)")]
    NoCompiler,
}

/// A dependency that could not be resolved on any search path.
///
/// Recoverable: the edge is treated as absent and the build proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    /// File containing the unresolved directive.
    pub file: PathBuf,
    /// The dependency as written in the file.
    pub include: String,
    /// Whether this was a system (`<...>`) include.
    pub system: bool,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.system { ('<', '>') } else { ('"', '"') };
        write!(
            f,
            "{}: unresolved include {}{}{}",
            self.file.display(),
            open,
            self.include,
            close
        )
    }
}

/// Why a single compilation unit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileFailure {
    /// The toolchain ran and exited unsuccessfully.
    Exit(Option<i32>),
    /// The toolchain process could not be started.
    Spawn(String),
    /// The toolchain exceeded the configured timeout and was killed.
    TimedOut(Duration),
    /// The artifact could not be written.
    Io(String),
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileFailure::Exit(Some(code)) => write!(f, "exited with status {}", code),
            CompileFailure::Exit(None) => write!(f, "terminated by signal"),
            CompileFailure::Spawn(msg) => write!(f, "could not start compiler: {}", msg),
            CompileFailure::TimedOut(after) => write!(f, "timed out after {:.2?}", after),
            CompileFailure::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

/// A failed compilation of one source file, with the toolchain output verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to compile {}: {failure}", .file.display())]
pub struct CompileError {
    pub file: PathBuf,
    pub failure: CompileFailure,
    /// Captured diagnostic output (stderr followed by stdout).
    pub diagnostics: String,
}

impl CompileError {
    pub fn new(file: impl Into<PathBuf>, failure: CompileFailure, diagnostics: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            failure,
            diagnostics: diagnostics.into(),
        }
    }
}

/// The external linker could not produce the binary.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("linker exited with status {status:?}")]
    Failed {
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("could not start linker: {0}")]
    Spawn(String),

    #[error("linker timed out after {0:.2?}")]
    TimedOut(Duration),
}

impl LinkError {
    /// Captured linker output, if the linker ran.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            LinkError::Failed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Fatal outcome of a build invocation.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build incomplete: {} file(s) without a current artifact: {}", .files.len(), display_paths(.files))]
    Incomplete { files: Vec<PathBuf> },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no source files found in the registered paths")]
    NoSources,

    #[error("source path does not exist: {}", .0.display())]
    MissingSourcePath(PathBuf),

    #[error("no linker configured")]
    NoLinker,

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("build cache error at {}: {message}", .path.display())]
    Cache { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn cache(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Cache {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

fn display_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
