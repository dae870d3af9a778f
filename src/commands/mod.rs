//! CLI Command handlers
//!
//! This module contains the implementation of CLI command handlers
//! extracted from main.rs for better organization.

pub mod build;
pub mod doctor;

pub use build::{BuildOptions, build, clean, configure_builder, run};
pub use doctor::run_doctor;
