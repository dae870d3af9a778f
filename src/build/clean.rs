//! Removal of all persisted build state.

use crate::error::BuildError;
use std::fs;
use std::path::Path;

/// Delete the whole output tree: artifacts, binaries and fingerprint caches
/// of every build type. Returns whether anything was removed.
pub fn clean_all(output_root: &Path) -> Result<bool, BuildError> {
    match fs::remove_dir_all(output_root) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BuildError::io(output_root, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_all_build_types() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("build");
        fs::create_dir_all(out.join("debug/obj")).unwrap();
        fs::create_dir_all(out.join("release/obj")).unwrap();
        fs::write(out.join("debug/kiln-cache.json"), "{}").unwrap();

        assert!(clean_all(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_clean_nothing_succeeds() {
        let dir = TempDir::new().unwrap();
        assert!(!clean_all(&dir.path().join("build")).unwrap());
        assert!(!clean_all(&dir.path().join("build")).unwrap());
    }
}
