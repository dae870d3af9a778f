use anyhow::{Context, Result, bail};
use colored::*;
use std::path::Path;
use std::process::Command;

/// Run the `[scripts]` entry `hook` from the project root.
///
/// A value ending in `.rhai` is a Rhai file relative to the project root;
/// anything else is handed to the platform shell.
pub fn run_script(hook: &str, script: &str, project_dir: &Path) -> Result<()> {
    if script.ends_with(".rhai") {
        let script_path = project_dir.join(script);
        if !script_path.is_file() {
            bail!("{} script '{}' does not exist", hook, script_path.display());
        }
        println!("   {} {} → {}", "📜".magenta(), hook.bold(), script);
        rhai::Engine::new()
            .run_file(script_path)
            .map_err(|e| anyhow::anyhow!("{} script '{}' failed: {}", hook, script, e))?;
        return Ok(());
    }

    println!("   {} {} → {}", "📜".magenta(), hook.bold(), script.dimmed());
    let mut command = if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", script]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    };
    let status = command
        .current_dir(project_dir)
        .status()
        .with_context(|| format!("Failed to start {} script '{}'", hook, script))?;

    if !status.success() {
        bail!("{} script '{}' exited with {}", hook, script, status);
    }
    Ok(())
}
