//! Build command handlers
//!
//! Handles `kiln build`, `kiln run` and `kiln clean`.

use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use crate::build::{self, Builder, FeedbackAnalyzer};
use crate::compiler::ClangCompiler;
use crate::config::{self, BuildConfig, BuildType, KilnConfig};
use crate::error::{BuildError, CompileError, ConfigError};
use crate::language::LanguageBinding;
use crate::registry::SourcePath;
use crate::scanner;
use crate::toolchain;

/// Command-line overrides for `kiln.toml`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub build_type: Option<BuildType>,
    pub jobs: Option<usize>,
    pub verbose: bool,
}

/// Turn a parsed `kiln.toml` into a configured [`Builder`].
pub fn configure_builder(project_dir: &Path, config: &KilnConfig, options: &BuildOptions) -> Result<Builder> {
    let build_type = match options.build_type {
        Some(build_type) => build_type,
        None => config.build_type()?.unwrap_or_default(),
    };

    let mut build_config = BuildConfig::new(&config.project.name)
        .with_project_root(project_dir)
        .with_build_type(build_type)
        .with_timeout(config.project.timeout_secs.map(Duration::from_secs))
        .with_verbose(options.verbose);
    if let Some(jobs) = options.jobs.or(config.project.jobs) {
        build_config = build_config.with_workers(jobs);
    }

    let mut builder = Builder::new(build_config)?;

    let mut detected = None;
    let mut first_program: Option<String> = None;
    for lang in &config.languages {
        let program = resolve_compiler(&lang.compiler, &mut detected)?;
        if first_program.is_none() {
            first_program = Some(program.clone());
        }

        let mut binding = LanguageBinding::new(
            &lang.extensions,
            scanner::scanner_by_name(&lang.scanner)?,
            Arc::new(ClangCompiler::new(program)),
        )
        .with_flags(lang.flags.iter().cloned());
        if let Some(name) = &lang.name {
            binding = binding.with_name(name);
        }
        builder.register_language(binding)?;
    }

    for path in &config.paths {
        let source_path = SourcePath::new(&path.dir)
            .with_flags(path.flags.iter().cloned())
            .recursive(path.recursive);
        if !builder.register_path(source_path) {
            println!(
                "{} Source path '{}' is listed twice, ignoring",
                "!".yellow(),
                path.dir.display()
            );
        }
    }

    let linker = match &config.link.linker {
        Some(linker) => Some(resolve_compiler(linker, &mut detected)?),
        None => first_program,
    };
    if let Some(program) = linker {
        builder.set_linker(Arc::new(ClangCompiler::new(program)));
    }
    builder.set_link_libs(config.link.libs.iter().cloned());

    Ok(builder)
}

/// `"auto"` picks the host compiler once per invocation; anything else is a program name.
fn resolve_compiler(name: &str, detected: &mut Option<String>) -> Result<String, ConfigError> {
    if name != "auto" {
        return Ok(name.to_string());
    }
    if let Some(program) = detected {
        return Ok(program.clone());
    }
    let toolchain = toolchain::detect_toolchain(None).ok_or(ConfigError::NoCompiler)?;
    let program = toolchain.cc_path.to_string_lossy().to_string();
    *detected = Some(program.clone());
    Ok(program)
}

/// Build the project in `project_dir`, returning the linked binary.
pub fn build(project_dir: &Path, options: &BuildOptions) -> Result<PathBuf> {
    let config = config::load_config(project_dir)?;
    let builder = configure_builder(project_dir, &config, options)?;
    let scripts = config.scripts.as_ref();

    if let Some(pre) = scripts.and_then(|s| s.pre_build.as_deref()) {
        build::run_script("pre_build", pre, project_dir).context("Pre-build script failed")?;
    }

    let result = builder.run_build();

    let binary = match result.outcome {
        Ok(binary) => binary,
        Err(e) => {
            print_hints(&e, &result.compile_errors);
            return Err(e.into());
        }
    };

    if let Some(post) = scripts.and_then(|s| s.post_build.as_deref()) {
        build::run_script("post_build", post, project_dir).context("Post-build script failed")?;
    }

    Ok(binary.path)
}

fn print_hints(error: &BuildError, compile_errors: &[CompileError]) {
    let mut hints = BTreeSet::new();
    for e in compile_errors {
        hints.extend(FeedbackAnalyzer::analyze(&e.diagnostics));
    }
    if let BuildError::Link(link_error) = error {
        hints.extend(link_error.diagnostics().and_then(FeedbackAnalyzer::analyze));
    }
    for hint in hints {
        println!("\n{} {}", "💡".yellow(), hint);
    }
}

/// Build, then launch the binary with `args`.
pub fn run(project_dir: &Path, options: &BuildOptions, args: &[String]) -> Result<()> {
    let binary = build(project_dir, options)?;

    println!("{} Running {}...\n", "▶".green(), binary.display());
    let status = Command::new(&binary)
        .args(args)
        .current_dir(project_dir)
        .status()
        .with_context(|| format!("Failed to launch {}", binary.display()))?;

    if !status.success() {
        return Err(anyhow::anyhow!("{} exited with {}", binary.display(), status));
    }
    Ok(())
}

/// Remove build state for every build type.
pub fn clean(project_dir: &Path) -> Result<()> {
    let output_root = project_dir.join("build");
    if build::clean_all(&output_root)? {
        println!("{} Removed {}", "🧹".cyan(), output_root.display());
    } else {
        println!("{} Nothing to clean", "✓".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[project]
name = "app"
build_type = "release"
jobs = 3

[[language]]
name = "c"
extensions = ["c"]
compiler = "cc-test"
flags = ["-Iinclude"]

[[path]]
dir = "src"

[[path]]
dir = "./src"

[link]
libs = ["-lm"]
"#;

    #[test]
    fn test_configure_from_file() {
        let dir = TempDir::new().unwrap();
        let config = config::parse_config(CONFIG).unwrap();
        let builder = configure_builder(dir.path(), &config, &BuildOptions::default()).unwrap();

        assert_eq!(builder.config().name, "app");
        assert_eq!(builder.config().build_type, BuildType::Release);
        assert_eq!(builder.config().workers, 3);
        assert!(builder.binary_path().to_string_lossy().contains("release"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let config = config::parse_config(CONFIG).unwrap();
        let options = BuildOptions {
            build_type: Some(BuildType::Debug),
            jobs: Some(1),
            verbose: true,
        };
        let builder = configure_builder(dir.path(), &config, &options).unwrap();

        assert_eq!(builder.config().build_type, BuildType::Debug);
        assert_eq!(builder.config().workers, 1);
        assert!(builder.config().verbose);
    }

    #[test]
    fn test_overlapping_languages_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config::parse_config(
            r#"
[project]
name = "app"

[[language]]
extensions = ["c"]
compiler = "cc-test"

[[language]]
extensions = ["c", "cc"]
compiler = "cc-test"
"#,
        )
        .unwrap();
        let err = configure_builder(dir.path(), &config, &BuildOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ExtensionTaken { .. })
        ));
    }

    #[test]
    fn test_build_without_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = build(dir.path(), &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("kiln.toml not found"));
    }

    #[test]
    fn test_invalid_config_skips_pre_build() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("kiln.toml"),
            r#"
[project]
name = "app"
jobs = 0

[[language]]
extensions = ["c"]
compiler = "cc-test"

[scripts]
pre_build = "touch pre.stamp"
"#,
        )
        .unwrap();

        let err = build(dir.path(), &BuildOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ZeroWorkers)
        ));
        assert!(!dir.path().join("pre.stamp").exists());
    }

    #[test]
    fn test_clean_twice() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("build/debug/obj")).unwrap();
        clean(dir.path()).unwrap();
        assert!(!dir.path().join("build").exists());
        clean(dir.path()).unwrap();
    }
}
