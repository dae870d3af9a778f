//! Compiler and linker adapters.
//!
//! An adapter turns a request into a deterministic argument vector and runs
//! it through [`crate::toolchain::run_tool`]. The provided `compile` and
//! `link` methods do the invocation and error mapping, so most adapters only
//! implement the `*_command` methods.

mod clang;

pub use clang::ClangCompiler;

use crate::error::{CompileError, CompileFailure, LinkError};
use crate::toolchain::{self, ToolError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One compilation unit as handed to a compiler adapter.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub source: &'a Path,
    pub object: &'a Path,
    /// Directory the compiler runs in; relative flags resolve against it
    pub working_dir: &'a Path,
    /// Binding flags, then source-path flags, then build-type flags
    pub flags: &'a [String],
}

/// Captured output of a successful compilation (usually warnings).
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub diagnostics: String,
}

pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    /// Full argument vector, program first. Must be a pure function of the request.
    fn compile_command(&self, req: &CompileRequest<'_>) -> Vec<String>;

    /// Run the compiler, writing `req.object`.
    fn compile(
        &self,
        req: &CompileRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<CompileOutput, CompileError> {
        let argv = self.compile_command(req);
        match toolchain::run_tool(&argv, Some(req.working_dir), timeout) {
            Ok(out) if out.success() => Ok(CompileOutput {
                diagnostics: out.diagnostics(),
            }),
            Ok(out) => Err(CompileError::new(
                req.source,
                CompileFailure::Exit(out.status.code()),
                out.diagnostics(),
            )),
            Err(e) => Err(CompileError::new(req.source, tool_failure(&e), e.to_string())),
        }
    }
}

pub trait Linker: Send + Sync {
    fn link_command(&self, objects: &[PathBuf], libs: &[String], output: &Path) -> Vec<String>;

    /// Run the linker once over all objects, returning its captured output.
    fn link(
        &self,
        objects: &[PathBuf],
        libs: &[String],
        output: &Path,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<String, LinkError> {
        let argv = self.link_command(objects, libs, output);
        match toolchain::run_tool(&argv, Some(working_dir), timeout) {
            Ok(out) if out.success() => Ok(out.diagnostics()),
            Ok(out) => Err(LinkError::Failed {
                status: out.status.code(),
                diagnostics: out.diagnostics(),
            }),
            Err(ToolError::TimedOut { after, .. }) => Err(LinkError::TimedOut(after)),
            Err(e) => Err(LinkError::Spawn(e.to_string())),
        }
    }
}

fn tool_failure(err: &ToolError) -> CompileFailure {
    match err {
        ToolError::TimedOut { after, .. } => CompileFailure::TimedOut(*after),
        ToolError::Io { source, .. } => CompileFailure::Io(source.to_string()),
        ToolError::Spawn { .. } | ToolError::EmptyCommand => CompileFailure::Spawn(err.to_string()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Adapter running a shell snippet instead of a real compiler.
    struct ShellCompiler(&'static str);

    impl Compiler for ShellCompiler {
        fn name(&self) -> &str {
            "sh"
        }

        fn compile_command(&self, _req: &CompileRequest<'_>) -> Vec<String> {
            vec!["sh".into(), "-c".into(), self.0.into()]
        }
    }

    fn request<'a>(flags: &'a [String]) -> CompileRequest<'a> {
        CompileRequest {
            source: Path::new("src/bad.c"),
            object: Path::new("obj/bad.o"),
            working_dir: Path::new("."),
            flags,
        }
    }

    #[test]
    fn test_nonzero_exit_keeps_output_verbatim() {
        let flags = Vec::new();
        let err = ShellCompiler("echo 'bad.c:3: error: expected ;' >&2; exit 1")
            .compile(&request(&flags), None)
            .unwrap_err();
        assert_eq!(err.file, PathBuf::from("src/bad.c"));
        assert_eq!(err.failure, CompileFailure::Exit(Some(1)));
        assert_eq!(err.diagnostics, "bad.c:3: error: expected ;\n");
    }

    #[test]
    fn test_success_returns_warnings() {
        let flags = Vec::new();
        let out = ShellCompiler("echo 'warning: unused' >&2")
            .compile(&request(&flags), None)
            .unwrap();
        assert_eq!(out.diagnostics.trim(), "warning: unused");
    }

    #[test]
    fn test_timeout_is_unit_failure() {
        let flags = Vec::new();
        let err = ShellCompiler("exec sleep 5")
            .compile(&request(&flags), Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err.failure, CompileFailure::TimedOut(_)));
    }
}
