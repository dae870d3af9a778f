//! Build configuration.
//!
//! [`BuildConfig`] is the validated, immutable configuration of one build
//! invocation. [`KilnConfig`] is the on-disk `kiln.toml` model the CLI turns
//! into a configured [`crate::build::Builder`].

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE: &str = "kiln.toml";

/// Build type, each mapping to a fixed set of compiler flags and its own output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildType {
    #[default]
    Debug,
    Release,
    ReleaseSmall,
}

impl BuildType {
    /// Name of the output subdirectory for this build type.
    pub fn dir_name(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
            BuildType::ReleaseSmall => "release-small",
        }
    }

    pub fn flags(&self) -> &'static [&'static str] {
        match self {
            BuildType::Debug => &["-g", "-O0", "-Wall"],
            BuildType::Release => &["-O2", "-DNDEBUG"],
            BuildType::ReleaseSmall => &["-Os", "-DNDEBUG"],
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for BuildType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            "release-small" | "release_small" | "releasesmall" => Ok(BuildType::ReleaseSmall),
            _ => Err(ConfigError::UnknownBuildType(s.to_string())),
        }
    }
}

/// Configuration for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project name, also the binary's base name
    pub name: String,
    pub build_type: BuildType,
    /// Size of the compilation worker pool
    pub workers: usize,
    /// Directory relative source paths and include flags are resolved against
    pub project_root: PathBuf,
    /// Root of all build-type output trees
    pub output_root: PathBuf,
    /// Guard for each external toolchain invocation
    pub timeout: Option<Duration>,
    /// Show recompile reasons, full commands and system include misses
    pub verbose: bool,
}

impl BuildConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let project_root = PathBuf::from(".");
        Self {
            name: name.into(),
            build_type: BuildType::default(),
            workers: default_workers(),
            output_root: project_root.join("build"),
            project_root,
            timeout: None,
            verbose: false,
        }
    }

    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the project root; the output root follows it to `<root>/build`.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self.output_root = self.project_root.join("build");
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Build-type-scoped output directory.
    pub fn build_dir(&self) -> PathBuf {
        self.output_root.join(self.build_type.dir_name())
    }

    pub fn binary_path(&self) -> PathBuf {
        let bin_name = if cfg!(target_os = "windows") {
            format!("{}.exe", self.name)
        } else {
            self.name.clone()
        };
        self.build_dir().join(bin_name)
    }
}

/// Host logical core count, falling back to a single worker.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// --- kiln.toml ---

#[derive(Deserialize, Debug)]
pub struct KilnConfig {
    pub project: ProjectConfig,
    #[serde(default, rename = "language")]
    pub languages: Vec<LanguageConfig>,
    #[serde(default, rename = "path")]
    pub paths: Vec<PathConfig>,
    #[serde(default)]
    pub link: LinkConfig,
    pub scripts: Option<ScriptsConfig>,
}

#[derive(Deserialize, Debug)]
pub struct ProjectConfig {
    pub name: String,
    pub build_type: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug)]
pub struct LanguageConfig {
    pub name: Option<String>,
    pub extensions: Vec<String>,
    #[serde(default = "default_scanner")]
    pub scanner: String,
    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct PathConfig {
    pub dir: PathBuf,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LinkConfig {
    pub linker: Option<String>,
    #[serde(default)]
    pub libs: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ScriptsConfig {
    pub pre_build: Option<String>,
    pub post_build: Option<String>,
}

fn default_scanner() -> String {
    "c".to_string()
}

fn default_compiler() -> String {
    "auto".to_string()
}

impl KilnConfig {
    /// Build type from the file, if one is set.
    pub fn build_type(&self) -> Result<Option<BuildType>, ConfigError> {
        self.project
            .build_type
            .as_deref()
            .map(BuildType::from_str)
            .transpose()
    }
}

/// Load `kiln.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<KilnConfig> {
    let path = project_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found in {}.\n\n\
            💡 Tip: create one with a [project] table and at least one [[language]] and [[path]] entry.",
            CONFIG_FILE,
            project_dir.display()
        ));
    }
    let config_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    parse_config(&config_str)
}

pub fn parse_config(config_str: &str) -> Result<KilnConfig> {
    toml::from_str(config_str)
        .context("Failed to parse kiln.toml - check for syntax errors (missing quotes, brackets)")
}
