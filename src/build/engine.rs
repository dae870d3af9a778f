//! Bounded parallel execution of compilation units.

use crate::compiler::{CompileRequest, Compiler};
use crate::error::{BuildError, CompileError, CompileFailure};
use crate::graph::{Fingerprint, RecompileReason};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One stale source, with everything needed to compile it.
#[derive(Clone)]
pub struct CompileUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    pub flags: Vec<String>,
    pub fingerprint: Fingerprint,
    pub command: Fingerprint,
    pub compiler: Arc<dyn Compiler>,
    pub reason: RecompileReason,
}

impl std::fmt::Debug for CompileUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileUnit")
            .field("source", &self.source)
            .field("object", &self.object)
            .field("compiler", &self.compiler.name())
            .field("reason", &self.reason)
            .finish()
    }
}

/// Object code produced for exactly one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: PathBuf,
    pub object: PathBuf,
    /// Source fingerprint the object was built from
    pub fingerprint: Fingerprint,
    pub command: Fingerprint,
    /// Compiler output on success, usually warnings
    pub diagnostics: String,
}

#[derive(Debug, Default)]
pub struct EngineOutcome {
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<CompileError>,
}

impl EngineOutcome {
    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Fixed-size worker pool for compilation units.
///
/// Each build owns its pool, so concurrent builds (or tests) never share a
/// worker bound.
pub struct ExecutionEngine {
    pool: rayon::ThreadPool,
    timeout: Option<Duration>,
}

impl ExecutionEngine {
    pub fn new(workers: usize, timeout: Option<Duration>) -> Result<Self, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kiln-worker-{}", i))
            .build()
            .map_err(|e| BuildError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, timeout })
    }

    /// Run `op` inside the pool, so any rayon work it does honours the worker bound.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Compile every unit. A failing unit never cancels its siblings.
    pub fn execute(&self, units: &[CompileUnit], working_dir: &Path) -> EngineOutcome {
        if units.is_empty() {
            return EngineOutcome::default();
        }

        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

        let pb = ProgressBar::new(units.len() as u64);
        pb.set_style(style);
        pb.set_message("Compiling...");

        let results: Vec<Result<Artifact, CompileError>> = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let result = self.compile_unit(unit, working_dir);
                    match &result {
                        Ok(artifact) if !artifact.diagnostics.trim().is_empty() => emit(&pb, format!(
                            "{} Warning in {}:\n{}",
                            "!".yellow(),
                            unit.source.display(),
                            artifact.diagnostics.trim_end()
                        )),
                        Err(e) => emit(&pb, format!(
                            "{} Error compiling {} ({}):\n{}",
                            "x".red(),
                            unit.source.display(),
                            e.failure,
                            e.diagnostics.trim_end()
                        )),
                        _ => {}
                    }
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut outcome = EngineOutcome::default();
        for result in results {
            match result {
                Ok(artifact) => outcome.artifacts.push(artifact),
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome
    }

    fn compile_unit(&self, unit: &CompileUnit, working_dir: &Path) -> Result<Artifact, CompileError> {
        if let Some(parent) = unit.object.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CompileError::new(&unit.source, CompileFailure::Io(e.to_string()), String::new())
            })?;
        }

        let req = CompileRequest {
            source: &unit.source,
            object: &unit.object,
            working_dir,
            flags: &unit.flags,
        };
        let output = unit.compiler.compile(&req, self.timeout)?;

        Ok(Artifact {
            source: unit.source.clone(),
            object: unit.object.clone(),
            fingerprint: unit.fingerprint.clone(),
            command: unit.command.clone(),
            diagnostics: output.diagnostics,
        })
    }
}

/// `ProgressBar::println` is a no-op on a hidden bar (stdout not a terminal).
fn emit(pb: &ProgressBar, message: String) {
    if pb.is_hidden() {
        println!("{}", message);
    } else {
        pb.println(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOutput;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    /// Writes the object file; fails for sources whose name contains "bad".
    #[derive(Default)]
    struct CountingCompiler {
        active: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl Compiler for CountingCompiler {
        fn name(&self) -> &str {
            "counting"
        }

        fn compile_command(&self, req: &CompileRequest<'_>) -> Vec<String> {
            vec!["counting".into(), req.source.to_string_lossy().to_string()]
        }

        fn compile(
            &self,
            req: &CompileRequest<'_>,
            _timeout: Option<Duration>,
        ) -> Result<CompileOutput, CompileError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            self.seen.lock().unwrap().push(req.source.to_path_buf());
            self.active.fetch_sub(1, Ordering::SeqCst);

            if req.source.to_string_lossy().contains("bad") {
                return Err(CompileError::new(
                    req.source,
                    CompileFailure::Exit(Some(1)),
                    "error: bad",
                ));
            }
            fs::write(req.object, b"obj").unwrap();
            Ok(CompileOutput::default())
        }
    }

    fn units(dir: &Path, names: &[&str], compiler: Arc<CountingCompiler>) -> Vec<CompileUnit> {
        names
            .iter()
            .map(|name| CompileUnit {
                source: dir.join(name),
                object: dir.join("obj").join(format!("{}.o", name)),
                flags: Vec::new(),
                fingerprint: Fingerprint::of_bytes(name.as_bytes()),
                command: Fingerprint::of_args(&[name]),
                compiler: compiler.clone(),
                reason: RecompileReason::NoArtifact,
            })
            .collect()
    }

    #[test]
    fn test_worker_bound_respected() {
        let dir = TempDir::new().unwrap();
        let compiler = Arc::new(CountingCompiler::default());
        let units = units(
            dir.path(),
            &["a.c", "b.c", "c.c", "d.c", "e.c", "f.c"],
            compiler.clone(),
        );

        let engine = ExecutionEngine::new(2, None).unwrap();
        let outcome = engine.execute(&units, dir.path());

        assert_eq!(outcome.artifacts.len(), 6);
        assert!(!outcome.failed());
        assert!(compiler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(compiler.seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn test_failure_does_not_cancel_siblings() {
        let dir = TempDir::new().unwrap();
        let compiler = Arc::new(CountingCompiler::default());
        let units = units(dir.path(), &["a.c", "bad.c", "c.c", "d.c"], compiler.clone());

        let engine = ExecutionEngine::new(4, None).unwrap();
        let outcome = engine.execute(&units, dir.path());

        assert!(outcome.failed());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].file.ends_with("bad.c"));
        assert_eq!(outcome.artifacts.len(), 3);
        assert!(outcome.artifacts.iter().all(|a| a.object.exists()));
    }

    #[test]
    fn test_no_units_is_noop() {
        let dir = TempDir::new().unwrap();
        let engine = ExecutionEngine::new(1, None).unwrap();
        let outcome = engine.execute(&[], dir.path());
        assert!(outcome.artifacts.is_empty());
        assert!(!outcome.failed());
    }
}
