//! Source path registration and source file discovery.

use crate::error::BuildError;
use crate::language::{BindingId, LanguageTable};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A directory added to the build.
#[derive(Debug, Clone)]
pub struct SourcePath {
    pub dir: PathBuf,
    /// Extra flags for files found under this directory
    pub flags: Vec<String>,
    /// Descend into subdirectories (off by default)
    pub recursive: bool,
}

impl SourcePath {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            flags: Vec::new(),
            recursive: false,
        }
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

pub type PathId = usize;

/// A compilable file found under a registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute, canonical path
    pub path: PathBuf,
    pub binding: BindingId,
    /// The registered path this file was found under
    pub source_path: PathId,
}

#[derive(Debug)]
pub struct SourceRegistry {
    root: PathBuf,
    paths: Vec<SourcePath>,
    keys: HashSet<PathBuf>,
}

impl SourceRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Vec::new(),
            keys: HashSet::new(),
        }
    }

    fn key(&self, dir: &Path) -> PathBuf {
        let abs = self.root.join(dir);
        abs.canonicalize().unwrap_or(abs)
    }

    /// Register a directory. Returns `false` if it was already registered.
    pub fn add_path(&mut self, path: SourcePath) -> bool {
        let key = self.key(&path.dir);
        if !self.keys.insert(key) {
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn paths(&self) -> &[SourcePath] {
        &self.paths
    }

    pub fn path(&self, id: PathId) -> &SourcePath {
        &self.paths[id]
    }

    /// Enumerate files whose extension has a binding, sorted by path.
    ///
    /// Files with unbound extensions are skipped. A file reachable from two
    /// registered paths belongs to the first one.
    pub fn discover(&self, languages: &LanguageTable) -> Result<Vec<SourceFile>, BuildError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for (id, source_path) in self.paths.iter().enumerate() {
            let dir = self.key(&source_path.dir);
            if !dir.is_dir() {
                return Err(BuildError::MissingSourcePath(self.root.join(&source_path.dir)));
            }

            let max_depth = if source_path.recursive { usize::MAX } else { 1 };
            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name();

            for entry in walker {
                let entry = entry.map_err(|e| {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                    BuildError::io(path, e.into())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(binding) = languages.lookup(entry.path()) else {
                    continue;
                };
                let path = entry.path().to_path_buf();
                if seen.insert(path.clone()) {
                    files.push(SourceFile {
                        path,
                        binding,
                        source_path: id,
                    });
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ClangCompiler;
    use crate::language::LanguageBinding;
    use crate::scanner::NullScanner;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn languages() -> LanguageTable {
        let mut table = LanguageTable::new();
        table
            .register(LanguageBinding::new(
                ["c"],
                Arc::new(NullScanner),
                Arc::new(ClangCompiler::default()),
            ))
            .unwrap();
        table
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/app")).unwrap();
        fs::write(dir.path().join("src/main.c"), "int main() {}").unwrap();
        fs::write(dir.path().join("src/util.h"), "").unwrap();
        fs::write(dir.path().join("src/README.md"), "").unwrap();
        fs::write(dir.path().join("src/app/app.c"), "").unwrap();
        dir
    }

    #[test]
    fn test_non_recursive_by_default() {
        let dir = project();
        let mut registry = SourceRegistry::new(dir.path());
        registry.add_path(SourcePath::new("src"));

        let files = registry.discover(&languages()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("src/main.c"));
    }

    #[test]
    fn test_recursive_path() {
        let dir = project();
        let mut registry = SourceRegistry::new(dir.path());
        registry.add_path(SourcePath::new("src").recursive(true));

        let files = registry.discover(&languages()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_duplicate_path_is_noop() {
        let dir = project();
        let mut registry = SourceRegistry::new(dir.path());
        assert!(registry.add_path(SourcePath::new("src")));
        assert!(!registry.add_path(SourcePath::new("src")));
        assert!(!registry.add_path(SourcePath::new("src/../src")));
        assert_eq!(registry.paths().len(), 1);
        assert_eq!(registry.discover(&languages()).unwrap().len(), 1);
    }

    #[test]
    fn test_overlapping_paths_do_not_duplicate_files() {
        let dir = project();
        let mut registry = SourceRegistry::new(dir.path());
        registry.add_path(SourcePath::new("src").recursive(true));
        registry.add_path(SourcePath::new("src/app").with_flags(["-DAPP"]));

        let files = registry.discover(&languages()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.source_path == 0));
    }

    #[test]
    fn test_missing_path_is_error() {
        let dir = project();
        let mut registry = SourceRegistry::new(dir.path());
        registry.add_path(SourcePath::new("nope"));
        assert!(matches!(
            registry.discover(&languages()),
            Err(BuildError::MissingSourcePath(_))
        ));
    }
}
