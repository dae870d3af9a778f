use super::compile_db::{self, CompileDbEntry};
use super::engine::{CompileUnit, ExecutionEngine};
use super::link::{self, Binary, SourceState};
use crate::cache::{ArtifactIndex, ArtifactRecord};
use crate::compiler::{CompileRequest, Linker};
use crate::config::BuildConfig;
use crate::error::{BuildError, CompileError, ConfigError, ScanWarning};
use crate::graph::{BuildGraph, Fingerprint, NodeId, RecompileReason};
use crate::language::{BindingId, LanguageBinding, LanguageTable};
use crate::registry::{PathId, SourceFile, SourcePath, SourceRegistry};
use crate::scanner::{ScanContext, ScanOutcome};
use colored::*;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Everything a build invocation reports, fatal or not.
#[derive(Debug)]
pub struct BuildResult {
    pub warnings: Vec<ScanWarning>,
    pub compile_errors: Vec<CompileError>,
    /// Sources compiled by this invocation
    pub compiled: Vec<PathBuf>,
    /// Sources whose artifacts were reused
    pub up_to_date: usize,
    /// Whether the linker ran
    pub linked: bool,
    pub outcome: Result<Binary, BuildError>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn binary(&self) -> Option<&Binary> {
        self.outcome.as_ref().ok()
    }
}

#[derive(Default)]
struct Report {
    warnings: Vec<ScanWarning>,
    compile_errors: Vec<CompileError>,
    compiled: Vec<PathBuf>,
    up_to_date: usize,
    linked: bool,
}

impl Report {
    fn finish(self, outcome: Result<Binary, BuildError>) -> BuildResult {
        BuildResult {
            warnings: self.warnings,
            compile_errors: self.compile_errors,
            compiled: self.compiled,
            up_to_date: self.up_to_date,
            linked: self.linked,
            outcome,
        }
    }
}

struct ScanJob {
    path: PathBuf,
    binding: BindingId,
    ctx: Arc<ScanContext>,
}

/// A registered source with its compile command resolved.
struct PlannedSource {
    file: SourceFile,
    node: NodeId,
    object: PathBuf,
    flags: Vec<String>,
    command: Vec<String>,
    command_fp: Fingerprint,
}

/// Orchestrates one project: languages, source paths, linker and build runs.
pub struct Builder {
    config: BuildConfig,
    root: PathBuf,
    output_root: PathBuf,
    languages: LanguageTable,
    registry: SourceRegistry,
    linker: Option<Arc<dyn Linker>>,
    link_libs: Vec<String>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("output_root", &self.output_root)
            .field("languages", &self.languages)
            .field("registry", &self.registry)
            .field("linker", &self.linker.is_some())
            .field("link_libs", &self.link_libs)
            .finish()
    }
}

impl Builder {
    /// Validate the configuration and create a builder for it.
    pub fn new(config: BuildConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let root = absolute(&config.project_root);
        let output_root = absolute(&config.output_root);
        Ok(Self {
            registry: SourceRegistry::new(&root),
            root,
            output_root,
            config,
            languages: LanguageTable::new(),
            linker: None,
            link_libs: Vec::new(),
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Bind a set of extensions to a scanner and compiler.
    pub fn register_language(&mut self, binding: LanguageBinding) -> Result<BindingId, ConfigError> {
        self.languages.register(binding)
    }

    /// Register a source directory. Returns `false` for a duplicate.
    pub fn register_path(&mut self, path: SourcePath) -> bool {
        self.registry.add_path(path)
    }

    pub fn set_linker(&mut self, linker: Arc<dyn Linker>) {
        self.linker = Some(linker);
    }

    /// Platform libraries passed verbatim to the linker.
    pub fn set_link_libs<I, S>(&mut self, libs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link_libs = libs.into_iter().map(Into::into).collect();
    }

    pub fn build_dir(&self) -> PathBuf {
        self.output_root.join(self.config.build_type.dir_name())
    }

    pub fn binary_path(&self) -> PathBuf {
        match self.config.binary_path().file_name() {
            Some(name) => self.build_dir().join(name),
            None => self.build_dir().join(&self.config.name),
        }
    }

    /// Delete all persisted state for every build type.
    pub fn clean_all(&self) -> Result<bool, BuildError> {
        super::clean::clean_all(&self.output_root)
    }

    pub fn run_build(&self) -> BuildResult {
        let mut report = Report::default();
        let outcome = self.execute(&mut report);
        report.finish(outcome)
    }

    fn execute(&self, report: &mut Report) -> Result<Binary, BuildError> {
        let start_time = Instant::now();
        println!(
            "{} Building {} ({}, {} workers)",
            "🚀".blue(),
            self.config.name.bold(),
            self.config.build_type,
            self.config.workers
        );

        let linker = self.linker.as_deref().ok_or(BuildError::NoLinker)?;

        let build_dir = self.build_dir();
        let obj_dir = build_dir.join("obj");
        fs::create_dir_all(&obj_dir).map_err(|e| BuildError::io(&obj_dir, e))?;

        // 1. Registry
        let sources = self.registry.discover(&self.languages)?;
        if sources.is_empty() {
            return Err(BuildError::NoSources);
        }

        let engine = ExecutionEngine::new(self.config.workers, self.config.timeout)?;

        // 2. Scanner + graph (barrier: full closure before any compilation)
        let graph = self.scan_graph(&engine, &sources, report)?;
        self.print_warnings(&report.warnings);

        let index_path = ArtifactIndex::path_in(&build_dir);
        let mut index = match ArtifactIndex::load(&index_path) {
            Ok(index) => index,
            Err(e) => {
                println!("{} {} - rebuilding everything", "!".yellow(), e);
                ArtifactIndex::default()
            }
        };

        let planned = self.plan(&graph, sources)?;
        let units = self.stale_units(&graph, &planned, &index);
        report.up_to_date = planned.len() - units.len();

        if self.config.verbose {
            for unit in &units {
                println!(
                    "   {} {} ({})",
                    "↻".cyan(),
                    unit.source.display(),
                    unit.reason.to_string().dimmed()
                );
            }
        }

        // 3. Parallel compilation (barrier: all units finish before linking)
        let outcome = engine.execute(&units, &self.root);

        for artifact in &outcome.artifacts {
            index.artifacts.insert(
                artifact.source.clone(),
                ArtifactRecord {
                    object: artifact.object.clone(),
                    source_fingerprint: artifact.fingerprint.clone(),
                    command: artifact.command.clone(),
                    success: true,
                },
            );
            report.compiled.push(artifact.source.clone());
        }
        for unit in units.iter().filter(|u| outcome.errors.iter().any(|e| e.file == u.source)) {
            index.artifacts.insert(
                unit.source.clone(),
                ArtifactRecord {
                    object: unit.object.clone(),
                    source_fingerprint: unit.fingerprint.clone(),
                    command: unit.command.clone(),
                    success: false,
                },
            );
        }
        report.compile_errors = outcome.errors;

        // Failed units re-seed themselves, so every node's current content is recorded
        index.files = graph
            .nodes()
            .map(|(_, node)| (node.path.clone(), node.fingerprint.clone()))
            .collect();
        let registered: HashSet<&Path> = planned.iter().map(|p| p.file.path.as_path()).collect();
        index.retain_sources(|source| registered.contains(source));
        index.save(&index_path)?;

        let db_entries: Vec<CompileDbEntry> = planned
            .iter()
            .map(|p| CompileDbEntry {
                file: p.file.path.clone(),
                output: p.object.clone(),
                arguments: p.command.clone(),
            })
            .collect();
        if let Err(e) = compile_db::write(&build_dir, &self.root, &db_entries) {
            println!("{} Could not write compilation database: {}", "!".yellow(), e);
        }

        // 4. Linker stage
        let objects = link::collect_objects(
            planned.iter().map(|p| SourceState {
                source: &p.file.path,
                fingerprint: &graph.node(p.node).fingerprint,
                command: &p.command_fp,
            }),
            &index,
        )?;

        let output_bin = self.binary_path();
        let link_fp = Fingerprint::of_args(&linker.link_command(&objects, &self.link_libs, &output_bin));

        let needs_link =
            !report.compiled.is_empty() || !output_bin.exists() || index.link.as_ref() != Some(&link_fp);

        if !needs_link {
            println!("{} Up to date", "⚡".green());
            return Ok(Binary { path: output_bin });
        }

        println!("   {} Linking...", "🔗".cyan());
        match link::link(
            linker,
            &objects,
            &self.link_libs,
            &output_bin,
            &self.root,
            self.config.timeout,
        ) {
            Ok((binary, diagnostics)) => {
                if !diagnostics.trim().is_empty() {
                    println!("{} Linker output:\n{}", "!".yellow(), diagnostics.trim_end());
                }
                index.link = Some(link_fp);
                index.save(&index_path)?;
                report.linked = true;
                println!(
                    "{} Build finished in {:.2?} ({} compiled, {} up to date)",
                    "✓".green(),
                    start_time.elapsed(),
                    report.compiled.len(),
                    report.up_to_date
                );
                Ok(binary)
            }
            Err(e) => {
                if let Some(diagnostics) = e.diagnostics() {
                    println!("{} Linker failed:\n{}", "x".red(), diagnostics.trim_end());
                }
                index.link = None;
                index.save(&index_path)?;
                Err(e.into())
            }
        }
    }

    /// Read, fingerprint and scan every source and everything it reaches.
    ///
    /// Headers inherit the binding and search paths of the first file that
    /// reached them. Each frontier layer is scanned in parallel.
    fn scan_graph(
        &self,
        engine: &ExecutionEngine,
        sources: &[SourceFile],
        report: &mut Report,
    ) -> Result<BuildGraph, BuildError> {
        let mut contexts: HashMap<(BindingId, PathId), Arc<ScanContext>> = HashMap::new();
        let mut frontier = Vec::with_capacity(sources.len());
        for source in sources {
            let ctx = contexts
                .entry((source.binding, source.source_path))
                .or_insert_with(|| {
                    let binding = self.languages.get(source.binding);
                    let path = self.registry.path(source.source_path);
                    Arc::new(ScanContext::from_flags(
                        &self.root,
                        binding.flags.iter().chain(path.flags.iter()),
                    ))
                })
                .clone();
            frontier.push(ScanJob {
                path: source.path.clone(),
                binding: source.binding,
                ctx,
            });
        }

        let mut graph = BuildGraph::new();
        let mut visited: HashSet<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
        let mut edges: Vec<(NodeId, PathBuf)> = Vec::new();

        while !frontier.is_empty() {
            let scanned: Vec<(ScanJob, Fingerprint, ScanOutcome)> = engine.install(|| {
                frontier
                    .into_par_iter()
                    .map(|job| {
                        let bytes = fs::read(&job.path).map_err(|e| BuildError::io(&job.path, e))?;
                        let fingerprint = Fingerprint::of_bytes(&bytes);
                        let content = String::from_utf8_lossy(&bytes);
                        let scanner = &self.languages.get(job.binding).scanner;
                        let outcome = scanner.scan(&job.path, &content, &job.ctx);
                        Ok((job, fingerprint, outcome))
                    })
                    .collect::<Result<Vec<_>, BuildError>>()
            })?;

            let mut next = Vec::new();
            for (job, fingerprint, outcome) in scanned {
                let id = graph.add_node(job.path.clone(), fingerprint);
                for dep in outcome.dependencies {
                    if visited.insert(dep.clone()) {
                        next.push(ScanJob {
                            path: dep.clone(),
                            binding: job.binding,
                            ctx: job.ctx.clone(),
                        });
                    }
                    edges.push((id, dep));
                }
                report.warnings.extend(outcome.warnings);
            }
            frontier = next;
        }

        for (from, dep) in edges {
            if let Some(to) = graph.id(&dep) {
                graph.add_edge(from, to);
            }
        }

        Ok(graph)
    }

    fn plan(&self, graph: &BuildGraph, sources: Vec<SourceFile>) -> Result<Vec<PlannedSource>, BuildError> {
        let obj_dir = self.build_dir().join("obj");
        let type_flags = self.config.build_type.flags();

        sources
            .into_iter()
            .map(|file| {
                let node = graph
                    .id(&file.path)
                    .ok_or_else(|| BuildError::cache(&file.path, "source missing from build graph"))?;
                let binding = self.languages.get(file.binding);
                let path = self.registry.path(file.source_path);

                let flags: Vec<String> = binding
                    .flags
                    .iter()
                    .chain(path.flags.iter())
                    .cloned()
                    .chain(type_flags.iter().map(|f| f.to_string()))
                    .collect();
                let object = object_path(&obj_dir, &self.root, &file.path);
                let command = binding.compiler.compile_command(&CompileRequest {
                    source: &file.path,
                    object: &object,
                    working_dir: &self.root,
                    flags: &flags,
                });
                let command_fp = Fingerprint::of_args(&command);

                Ok(PlannedSource {
                    file,
                    node,
                    object,
                    flags,
                    command,
                    command_fp,
                })
            })
            .collect()
    }

    /// Seed staleness from changed files and sources without a usable
    /// artifact, spread it to every dependent, and add sources whose command
    /// changed.
    fn stale_units(&self, graph: &BuildGraph, planned: &[PlannedSource], index: &ArtifactIndex) -> Vec<CompileUnit> {
        let mut own_reason: HashMap<NodeId, RecompileReason> = HashMap::new();
        for p in planned {
            let fingerprint = &graph.node(p.node).fingerprint;
            let reason = match index.record(&p.file.path) {
                None => Some(RecompileReason::NoArtifact),
                Some(r) if !r.success => Some(RecompileReason::PreviousFailure),
                Some(r) if !r.object.is_file() => Some(RecompileReason::NoArtifact),
                Some(r) if &r.source_fingerprint != fingerprint => Some(RecompileReason::SourceChanged),
                _ => None,
            };
            if let Some(reason) = reason {
                own_reason.insert(p.node, reason);
            }
        }

        let mut seeds: Vec<NodeId> = graph
            .nodes()
            .filter(|(_, node)| !index.file_unchanged(&node.path, &node.fingerprint))
            .map(|(id, _)| id)
            .collect();
        seeds.extend(own_reason.keys().copied());
        seeds.sort_unstable();
        seeds.dedup();

        let cause = graph.stale_closure(&seeds);

        planned
            .iter()
            .filter_map(|p| {
                let reason = if let Some(reason) = own_reason.get(&p.node) {
                    reason.clone()
                } else if let Some(origin) = cause[p.node] {
                    if origin == p.node {
                        RecompileReason::SourceChanged
                    } else {
                        RecompileReason::DependencyChanged(graph.node(origin).path.clone())
                    }
                } else if index
                    .record(&p.file.path)
                    .is_some_and(|r| r.command != p.command_fp)
                {
                    RecompileReason::FlagsChanged
                } else {
                    return None;
                };

                Some(CompileUnit {
                    source: p.file.path.clone(),
                    object: p.object.clone(),
                    flags: p.flags.clone(),
                    fingerprint: graph.node(p.node).fingerprint.clone(),
                    command: p.command_fp.clone(),
                    compiler: self.languages.get(p.file.binding).compiler.clone(),
                    reason,
                })
            })
            .collect()
    }

    fn print_warnings(&self, warnings: &[ScanWarning]) {
        for warning in warnings {
            if !warning.system {
                println!("{} {}", "!".yellow(), warning);
            } else if self.config.verbose {
                println!("   {} {}", "·".dimmed(), warning.to_string().dimmed());
            }
        }
    }
}

/// `obj/<path relative to root>.o`, or a hashed bucket for files outside the root.
fn object_path(obj_dir: &Path, root: &Path, source: &Path) -> PathBuf {
    match source.strip_prefix(root) {
        Ok(rel) => {
            let mut name = rel.as_os_str().to_owned();
            name.push(".o");
            obj_dir.join(name)
        }
        Err(_) => {
            let parent = source.parent().unwrap_or(Path::new(""));
            let bucket = Fingerprint::of_bytes(parent.to_string_lossy().as_bytes());
            let mut name = source.file_name().unwrap_or_default().to_owned();
            name.push(".o");
            obj_dir.join("_external").join(bucket.short()).join(name)
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_mirrors_source_tree() {
        let obj = object_path(
            Path::new("/p/build/debug/obj"),
            Path::new("/p"),
            Path::new("/p/src/app/app.c"),
        );
        assert_eq!(obj, PathBuf::from("/p/build/debug/obj/src/app/app.c.o"));
    }

    #[test]
    fn test_same_stem_different_dirs_do_not_collide() {
        let obj_dir = Path::new("/p/build/debug/obj");
        let a = object_path(obj_dir, Path::new("/p"), Path::new("/p/src/gui/window.c"));
        let b = object_path(obj_dir, Path::new("/p"), Path::new("/p/src/core/window.c"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_external_source_is_bucketed() {
        let obj = object_path(
            Path::new("/p/build/debug/obj"),
            Path::new("/p"),
            Path::new("/vendor/lib/x.c"),
        );
        assert!(obj.starts_with("/p/build/debug/obj/_external"));
        assert!(obj.ends_with("x.c.o"));
    }

    #[test]
    fn test_invalid_config_rejected_before_build() {
        let config = BuildConfig::new("app").with_workers(0);
        assert!(matches!(Builder::new(config), Err(ConfigError::ZeroWorkers)));
    }
}
