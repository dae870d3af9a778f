//! # kiln - Incremental C build orchestrator
//!
//! kiln compiles a C project's sources into objects in parallel, recompiles
//! only what a change actually affects, and links the result into one binary.
//!
//! ## Features
//!
//! - **Content Fingerprints**: SHA-256 of every source and header decides staleness
//! - **Include Tracking**: `#include` directives form a dependency graph, cycles included
//! - **Parallel Builds**: bounded worker pool, failures never cancel siblings
//! - **Build Types**: debug, release and release-small trees side by side
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the project described by ./kiln.toml
//! kiln build
//!
//! # Build and run
//! kiln run -- --some-arg
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Build orchestration: execution engine and linker stage
//! - [`graph`] - Dependency graph, fingerprints and staleness closure
//! - [`scanner`] - Per-language dependency scanners
//! - [`compiler`] - Compiler and linker adapters
//! - [`commands`] - CLI command handlers

/// Build orchestration with parallel compilation.
pub mod build;

/// Persisted artifact index.
pub mod cache;

/// CLI command handlers extracted from main.
pub mod commands;

/// Compiler and linker adapters.
pub mod compiler;

/// Build configuration and `kiln.toml` parsing.
pub mod config;

/// Error types.
pub mod error;

/// Dependency graph and fingerprints.
pub mod graph;

/// Language bindings.
pub mod language;

/// Source path registration and discovery.
pub mod registry;

/// Dependency scanners.
pub mod scanner;

/// Toolchain detection and process invocation.
pub mod toolchain;
