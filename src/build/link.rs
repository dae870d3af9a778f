//! Linker stage: verify every source has a current artifact, then link once.

use crate::cache::ArtifactIndex;
use crate::compiler::Linker;
use crate::error::{BuildError, LinkError};
use crate::graph::Fingerprint;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The final link output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub path: PathBuf,
}

/// Current state of one registered source, for the completeness check.
#[derive(Debug, Clone, Copy)]
pub struct SourceState<'a> {
    pub source: &'a Path,
    pub fingerprint: &'a Fingerprint,
    pub command: &'a Fingerprint,
}

/// Objects for all sources, in source order, or `BuildError::Incomplete`
/// naming every source without a current, successful artifact.
pub fn collect_objects<'a, I>(states: I, index: &ArtifactIndex) -> Result<Vec<PathBuf>, BuildError>
where
    I: IntoIterator<Item = SourceState<'a>>,
{
    let mut objects = Vec::new();
    let mut missing = Vec::new();

    for state in states {
        match index.record(state.source) {
            Some(record)
                if record.success
                    && &record.source_fingerprint == state.fingerprint
                    && &record.command == state.command
                    && record.object.is_file() =>
            {
                objects.push(record.object.clone())
            }
            _ => missing.push(state.source.to_path_buf()),
        }
    }

    if missing.is_empty() {
        Ok(objects)
    } else {
        Err(BuildError::Incomplete { files: missing })
    }
}

/// Invoke the external linker once over the full artifact set.
pub fn link(
    linker: &dyn Linker,
    objects: &[PathBuf],
    libs: &[String],
    output: &Path,
    working_dir: &Path,
    timeout: Option<Duration>,
) -> Result<(Binary, String), LinkError> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| LinkError::Spawn(e.to_string()))?;
    }
    let diagnostics = linker.link(objects, libs, output, working_dir, timeout)?;
    Ok((
        Binary {
            path: output.to_path_buf(),
        },
        diagnostics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactRecord;
    use tempfile::TempDir;

    fn setup(dir: &Path, name: &str, success: bool) -> (PathBuf, Fingerprint, Fingerprint, ArtifactRecord) {
        let source = dir.join(name);
        let object = dir.join(format!("{}.o", name));
        fs::write(&object, b"obj").unwrap();
        let fp = Fingerprint::of_bytes(name.as_bytes());
        let cmd = Fingerprint::of_args(&["cc", name]);
        let record = ArtifactRecord {
            object,
            source_fingerprint: fp.clone(),
            command: cmd.clone(),
            success,
        };
        (source, fp, cmd, record)
    }

    #[test]
    fn test_complete_set_yields_objects() {
        let dir = TempDir::new().unwrap();
        let mut index = ArtifactIndex::default();
        let (src, fp, cmd, rec) = setup(dir.path(), "a.c", true);
        index.artifacts.insert(src.clone(), rec.clone());

        let objects = collect_objects(
            [SourceState {
                source: &src,
                fingerprint: &fp,
                command: &cmd,
            }],
            &index,
        )
        .unwrap();
        assert_eq!(objects, vec![rec.object]);
    }

    #[test]
    fn test_failed_and_stale_sources_reported() {
        let dir = TempDir::new().unwrap();
        let mut index = ArtifactIndex::default();
        let (ok_src, ok_fp, ok_cmd, ok_rec) = setup(dir.path(), "ok.c", true);
        let (bad_src, bad_fp, bad_cmd, bad_rec) = setup(dir.path(), "bad.c", false);
        let (old_src, _, old_cmd, old_rec) = setup(dir.path(), "old.c", true);
        index.artifacts.insert(ok_src.clone(), ok_rec);
        index.artifacts.insert(bad_src.clone(), bad_rec);
        index.artifacts.insert(old_src.clone(), old_rec);
        let new_fp = Fingerprint::of_bytes(b"edited");

        let err = collect_objects(
            [
                SourceState { source: &ok_src, fingerprint: &ok_fp, command: &ok_cmd },
                SourceState { source: &bad_src, fingerprint: &bad_fp, command: &bad_cmd },
                SourceState { source: &old_src, fingerprint: &new_fp, command: &old_cmd },
            ],
            &index,
        )
        .unwrap_err();

        match err {
            BuildError::Incomplete { files } => assert_eq!(files, vec![bad_src, old_src]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_object_file_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let mut index = ArtifactIndex::default();
        let (src, fp, cmd, rec) = setup(dir.path(), "a.c", true);
        fs::remove_file(&rec.object).unwrap();
        index.artifacts.insert(src.clone(), rec);

        let result = collect_objects(
            [SourceState { source: &src, fingerprint: &fp, command: &cmd }],
            &index,
        );
        assert!(matches!(result, Err(BuildError::Incomplete { .. })));
    }
}
