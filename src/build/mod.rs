mod clean;
pub mod compile_db;
mod core;
mod engine;
mod feedback;
mod link;
mod utils;

pub use self::core::{BuildResult, Builder};
pub use clean::clean_all;
pub use engine::{Artifact, CompileUnit, EngineOutcome, ExecutionEngine};
pub use feedback::FeedbackAnalyzer;
pub use link::{Binary, SourceState, collect_objects, link};
pub use utils::run_script;
