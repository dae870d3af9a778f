use super::{CompileRequest, Compiler, Linker};
use std::path::{Path, PathBuf};

/// Adapter for gcc-compatible drivers (`clang`, `gcc`, `clang++`, `g++`, ...).
///
/// The same driver doubles as the linker.
#[derive(Debug, Clone)]
pub struct ClangCompiler {
    program: String,
}

impl ClangCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ClangCompiler {
    fn default() -> Self {
        Self::new("clang")
    }
}

impl Compiler for ClangCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile_command(&self, req: &CompileRequest<'_>) -> Vec<String> {
        let mut args = Vec::with_capacity(req.flags.len() + 5);
        args.push(self.program.clone());
        args.push("-c".to_string());
        args.extend(req.flags.iter().cloned());
        args.push(req.source.to_string_lossy().to_string());
        args.push("-o".to_string());
        args.push(req.object.to_string_lossy().to_string());
        args
    }
}

impl Linker for ClangCompiler {
    fn link_command(&self, objects: &[PathBuf], libs: &[String], output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(objects.len() + libs.len() + 3);
        args.push(self.program.clone());
        args.extend(objects.iter().map(|o| o.to_string_lossy().to_string()));
        args.push("-o".to_string());
        args.push(output.to_string_lossy().to_string());
        args.extend(libs.iter().cloned());
        args
    }
}
