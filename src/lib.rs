//! relpipe - a release build pipeline driver for tag-pinned upstream builds

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;
pub mod stages;

// Re-export commonly used types
pub use core::{BuildContext, BuildPipeline, BuildPlan, ExecutionStatus, StageState};
pub use execution::{BuildEvent, ExecutionEngine};
pub use runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError, ShellRunner};
pub use stages::{Stage, StageError, StageReport};
