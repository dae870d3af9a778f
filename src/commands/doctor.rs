//! Doctor command handler
//!
//! Handles `kiln doctor`: reports the host toolchain and checks `kiln.toml`.

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::config;
use crate::toolchain::{self, CompilerType};

/// Run the `kiln doctor` command to diagnose setup issues
pub fn run_doctor(project_dir: &Path) -> Result<()> {
    println!("{} Running System Doctor...", "🚑".red());
    println!("-------------------------------");

    print!("Checking OS... ");
    println!(
        "{} ({})",
        std::env::consts::OS.green(),
        std::env::consts::ARCH.cyan()
    );

    for compiler_type in [CompilerType::Clang, CompilerType::GCC] {
        print!("Checking {}... ", compiler_type.program());
        match toolchain::detect_toolchain(Some(compiler_type)) {
            Some(tc) if tc.compiler_type == compiler_type => {
                println!("{} ({})", "Found".green(), tc.version.dimmed())
            }
            _ => println!("{}", "Not Found".yellow()),
        }
    }

    print!("Checking {}... ", config::CONFIG_FILE);
    match config::load_config(project_dir) {
        Ok(cfg) => {
            println!(
                "{} ({} languages, {} source paths)",
                "OK".green(),
                cfg.languages.len(),
                cfg.paths.len()
            );
            if let Err(e) = cfg.build_type() {
                println!("  {} {}", "x".red(), e);
            }
            for path in &cfg.paths {
                if !project_dir.join(&path.dir).is_dir() {
                    println!("  {} Source path '{}' does not exist", "x".red(), path.dir.display());
                }
            }
        }
        Err(e) => println!("{}\n  {}", "Invalid".red(), e),
    }

    Ok(())
}
