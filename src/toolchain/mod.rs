//! External toolchain invocation and discovery.
//!
//! Every compiler and linker call goes through [`run_tool`], which owns the
//! child process for its whole lifetime: output is captured verbatim, an
//! optional timeout kills a hung tool, and the child is always reaped.

pub mod types;

pub use types::{CompilerType, ToolError, ToolOutput, Toolchain};

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Kills and reaps the child unless it was waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Run `argv[0]` with the remaining arguments in `cwd` and capture its output.
///
/// A non-zero exit status is not an error here; callers inspect
/// [`ToolOutput::status`]. Errors are reserved for tools that could not be
/// started or did not finish within `timeout`.
pub fn run_tool(
    argv: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<ToolOutput, ToolError> {
    let (program, args) = argv.split_first().ok_or(ToolError::EmptyCommand)?;

    let mut command = Command::new(program);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let child = command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;

    let mut guard = ChildGuard {
        child,
        reaped: false,
    };
    let stdout = drain(guard.child.stdout.take());
    let stderr = drain(guard.child.stderr.take());

    let io_err = |source| ToolError::Io {
        program: program.clone(),
        source,
    };

    let status = match timeout {
        None => guard.child.wait().map_err(io_err)?,
        Some(limit) => {
            let start = Instant::now();
            loop {
                if let Some(status) = guard.child.try_wait().map_err(io_err)? {
                    break status;
                }
                if start.elapsed() >= limit {
                    // Reader threads are left detached: a grandchild may still hold the pipes.
                    return Err(ToolError::TimedOut {
                        program: program.clone(),
                        after: limit,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };
    guard.reaped = true;

    Ok(ToolOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Detect a C compiler on PATH, honouring a preference.
pub fn detect_toolchain(preferred: Option<CompilerType>) -> Option<Toolchain> {
    let candidates = match preferred {
        Some(CompilerType::GCC) => [CompilerType::GCC, CompilerType::Clang],
        _ => [CompilerType::Clang, CompilerType::GCC],
    };

    for compiler_type in candidates {
        let argv = vec![compiler_type.program().to_string(), "--version".to_string()];
        if let Ok(output) = run_tool(&argv, None, Some(Duration::from_secs(10)))
            && output.success()
        {
            let version = output
                .stdout
                .lines()
                .next()
                .unwrap_or("unknown")
                .to_string();
            return Some(Toolchain {
                compiler_type,
                cc_path: PathBuf::from(compiler_type.program()),
                version,
            });
        }
    }
    None
}
