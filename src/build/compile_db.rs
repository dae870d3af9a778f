//! `compile_commands.json` for editor tooling.

use crate::error::BuildError;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPILE_DB_FILE: &str = "compile_commands.json";

#[derive(Debug, Clone)]
pub struct CompileDbEntry {
    pub file: PathBuf,
    pub output: PathBuf,
    pub arguments: Vec<String>,
}

/// Write the compilation database for every registered source.
pub fn write(build_dir: &Path, directory: &Path, entries: &[CompileDbEntry]) -> Result<PathBuf, BuildError> {
    let directory = directory.to_string_lossy();
    let json_entries: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "directory": directory,
                "arguments": entry.arguments,
                "file": entry.file.to_string_lossy(),
                "output": entry.output.to_string_lossy(),
            })
        })
        .collect();

    let path = build_dir.join(COMPILE_DB_FILE);
    let json_str = serde_json::to_string_pretty(&json_entries).map_err(|e| BuildError::cache(&path, e))?;
    fs::write(&path, json_str).map_err(|e| BuildError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_entries() {
        let dir = TempDir::new().unwrap();
        let entries = vec![CompileDbEntry {
            file: PathBuf::from("/p/src/main.c"),
            output: PathBuf::from("/p/build/debug/obj/src/main.c.o"),
            arguments: vec!["clang".into(), "-c".into(), "/p/src/main.c".into()],
        }];

        let path = write(dir.path(), Path::new("/p"), &entries).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["directory"], "/p");
        assert_eq!(parsed[0]["arguments"][0], "clang");
        assert_eq!(parsed[0]["file"], "/p/src/main.c");
    }
}
