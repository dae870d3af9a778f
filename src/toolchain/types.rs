use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Supported compiler families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum CompilerType {
    /// Clang/LLVM (clang or clang++)
    Clang,
    /// GNU Compiler Collection (gcc or g++)
    GCC,
}

impl CompilerType {
    pub fn program(&self) -> &'static str {
        match self {
            CompilerType::Clang => "clang",
            CompilerType::GCC => "gcc",
        }
    }
}

/// A compiler found on the host
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler_type: CompilerType,
    /// Program name of the C compiler driver, resolved through PATH when spawned
    pub cc_path: PathBuf,
    /// First line of `--version`
    pub version: String,
}

/// Captured result of an external tool that ran to completion.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Diagnostics as the user would have seen them: stderr, then stdout.
    pub fn diagnostics(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}{}", self.stderr, self.stdout),
            (false, true) => self.stderr.clone(),
            (true, false) => self.stdout.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Error type for external tool invocation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {after:.2?}")]
    TimedOut { program: String, after: Duration },

    #[error("I/O error while waiting for '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
