//! Persisted artifact index.
//!
//! One index per build type lives at `build/<type>/kiln-cache.json`. It holds
//! the fingerprints every node had when it was last consumed, a record per
//! compiled source, and the hash of the last successful link command.

use crate::error::BuildError;
use crate::graph::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "kiln-cache.json";
const INDEX_VERSION: u32 = 1;

/// What is known about the last compilation of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub object: PathBuf,
    pub source_fingerprint: Fingerprint,
    pub command: Fingerprint,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    version: u32,
    #[serde(default)]
    pub files: BTreeMap<PathBuf, Fingerprint>,
    #[serde(default)]
    pub artifacts: BTreeMap<PathBuf, ArtifactRecord>,
    #[serde(default)]
    pub link: Option<Fingerprint>,
}

impl Default for ArtifactIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            files: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            link: None,
        }
    }
}

impl ArtifactIndex {
    pub fn path_in(build_dir: &Path) -> PathBuf {
        build_dir.join(INDEX_FILE)
    }

    /// Load the index, or an empty one when it is missing.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let index: Self = serde_json::from_str(&content).map_err(|e| BuildError::cache(path, e))?;
        if index.version != INDEX_VERSION {
            return Err(BuildError::cache(
                path,
                format!("unsupported index version {}", index.version),
            ));
        }
        Ok(index)
    }

    /// Write through a temporary file so an interrupted save never leaves a torn index.
    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| BuildError::cache(path, e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| BuildError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| BuildError::io(path, e))?;
        Ok(())
    }

    /// True when `path` had `fingerprint` the last time it was consumed.
    pub fn file_unchanged(&self, path: &Path, fingerprint: &Fingerprint) -> bool {
        self.files.get(path) == Some(fingerprint)
    }

    pub fn record(&self, source: &Path) -> Option<&ArtifactRecord> {
        self.artifacts.get(source)
    }

    /// Drop records for sources that are no longer part of the build.
    pub fn retain_sources<F: Fn(&Path) -> bool>(&mut self, keep: F) {
        self.artifacts.retain(|source, _| keep(source));
    }
}
