//! Shared helpers for tests that run the `kiln` binary.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Stand-in for a gcc-compatible driver.
///
/// Writes whatever follows `-o`. When compiling (`-c`) it fails on sources
/// containing `BROKEN`; when linking it emits a script echoing its arguments.
#[cfg(unix)]
const FAKE_CC: &str = r#"#!/bin/sh
out=""
src=""
compile=0
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -c) compile=1 ;;
    *.c) src="$1" ;;
  esac
  shift
done
if [ "$compile" = 1 ]; then
  if grep -q BROKEN "$src"; then
    echo "$src:1:1: error: broken source" >&2
    exit 1
  fi
  echo "object for $src" > "$out"
else
  printf '#!/bin/sh\necho ran "$@"\n' > "$out"
  chmod +x "$out"
fi
"#;

pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    /// A project whose toolchain is the fake driver.
    #[cfg(unix)]
    pub fn with_fake_compiler(name: &str, scripts: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let cc = dir.path().join("fakecc");
        fs::write(&cc, FAKE_CC).unwrap();
        fs::set_permissions(&cc, fs::Permissions::from_mode(0o755)).unwrap();

        let toml = format!(
            r#"[project]
name = "{name}"
jobs = 2

[[language]]
extensions = ["c"]
compiler = "{cc}"
flags = ["-Iinclude"]

[[path]]
dir = "src"

{scripts}
"#,
            cc = cc.display()
        );
        let project = Self { dir };
        project.write("kiln.toml", &toml);
        project.write("src/util.h", "int util(void);\n");
        project.write("src/main.c", "#include \"util.h\"\nint main(void) { return util(); }\n");
        project.write("src/util.c", "#include \"util.h\"\nint util(void) { return 0; }\n");
        project
    }

    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn binary(&self, build_type: &str, name: &str) -> PathBuf {
        self.dir.path().join("build").join(build_type).join(name)
    }

    pub fn kiln(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_kiln"))
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to execute kiln")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
