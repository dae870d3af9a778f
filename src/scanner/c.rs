use super::{DependencyScanner, ScanContext, ScanOutcome};
use crate::error::ScanWarning;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\r\n]+)[>"]"#)
        .expect("include pattern is valid")
});

/// C-family scanner following `#include "..."` and `#include <...>` directives.
///
/// Quoted includes are searched relative to the including file first, then on
/// the include path. Angle includes only use the include path, so standard
/// headers usually end up as system warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct CIncludeScanner;

impl CIncludeScanner {
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, file: &Path, include: &str, system: bool, ctx: &ScanContext) -> Option<PathBuf> {
        let local = if system {
            None
        } else {
            file.parent().map(|dir| dir.join(include))
        };

        local
            .into_iter()
            .chain(ctx.include_dirs.iter().map(|dir| dir.join(include)))
            .find(|candidate| candidate.is_file())
            .map(|found| found.canonicalize().unwrap_or(found))
    }
}

impl DependencyScanner for CIncludeScanner {
    fn scan(&self, file: &Path, content: &str, ctx: &ScanContext) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        for caps in INCLUDE_RE.captures_iter(content) {
            let system = &caps[1] == "<";
            let include = caps[2].trim();

            match self.resolve(file, include, system, ctx) {
                Some(path) => {
                    if !outcome.dependencies.contains(&path) {
                        outcome.dependencies.push(path);
                    }
                }
                None => outcome.warnings.push(ScanWarning {
                    file: file.to_path_buf(),
                    include: include.to_string(),
                    system,
                }),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("include")).unwrap();
        fs::write(dir.path().join("src/local.h"), "").unwrap();
        fs::write(dir.path().join("include/api.h"), "").unwrap();
        dir
    }

    #[test]
    fn test_resolves_local_and_include_path() {
        let dir = setup();
        let file = dir.path().join("src/main.c");
        let content = "#include \"local.h\"\n  #  include <api.h>\n#include \"api.h\"\nint main() {}\n";
        let ctx = ScanContext::new(vec![dir.path().join("include")]);

        let outcome = CIncludeScanner::new().scan(&file, content, &ctx);

        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.dependencies.len(), 2);
        assert!(outcome.dependencies[0].ends_with("src/local.h"));
        assert!(outcome.dependencies[1].ends_with("include/api.h"));
    }

    #[test]
    fn test_unresolved_includes_are_warnings() {
        let dir = setup();
        let file = dir.path().join("src/main.c");
        let content = "#include <stdio.h>\n#include \"missing.h\"\n";

        let outcome = CIncludeScanner::new().scan(&file, content, &ScanContext::default());

        assert!(outcome.dependencies.is_empty());
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].system);
        assert_eq!(outcome.warnings[0].include, "stdio.h");
        assert!(!outcome.warnings[1].system);
        assert_eq!(outcome.warnings[1].include, "missing.h");
    }

    #[test]
    fn test_angle_include_skips_local_dir() {
        let dir = setup();
        let file = dir.path().join("src/main.c");
        let outcome = CIncludeScanner::new().scan(&file, "#include <local.h>\n", &ScanContext::default());
        assert!(outcome.dependencies.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_ignores_non_directives() {
        let dir = setup();
        let file = dir.path().join("src/main.c");
        let content = "// see local.h\nconst char *s = \"#include \\\"local.h\\\"\";\n#define X 1\n";
        let outcome = CIncludeScanner::new().scan(&file, content, &ScanContext::default());
        assert!(outcome.dependencies.is_empty());
        assert!(outcome.warnings.is_empty());
    }
}
