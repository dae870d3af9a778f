//! # kiln CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the handlers in
//! [`kiln::commands`]. Running `kiln` without a subcommand builds.

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;

use kiln::commands::{self, BuildOptions};
use kiln::config::BuildType;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Incremental parallel builds for C projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Size-optimized release build (same as --profile release-small)
    #[arg(long, conflicts_with = "profile")]
    release: bool,
    /// Build type: debug, release or release-small
    #[arg(long)]
    profile: Option<BuildType>,
    /// Number of parallel compile jobs (default: kiln.toml, then CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Show recompile reasons and unresolved system includes
    #[arg(short, long)]
    verbose: bool,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        let build_type = if self.release {
            Some(BuildType::ReleaseSmall)
        } else {
            self.profile
        };
        BuildOptions {
            build_type,
            jobs: self.jobs,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile changed sources and link the binary
    Build(BuildArgs),
    /// Build, then run the output binary
    Run {
        #[command(flatten)]
        build: BuildArgs,
        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Remove all build output and caches
    Clean,
    /// Check the toolchain and kiln.toml
    Doctor,
    /// Generate shell completion scripts
    Completions { shell: Shell },
}

fn main() {
    enable_windows_utf8_console();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        println!("{} {:#}", "x".red(), e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let project_dir = std::env::current_dir().context("Failed to read current directory")?;

    match cli.command {
        None => commands::build(&project_dir, &BuildOptions::default()).map(|_| ()),
        Some(Commands::Build(args)) => commands::build(&project_dir, &args.options()).map(|_| ()),
        Some(Commands::Run { build, args }) => commands::run(&project_dir, &build.options(), &args),
        Some(Commands::Clean) => commands::clean(&project_dir),
        Some(Commands::Doctor) => commands::run_doctor(&project_dir),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
