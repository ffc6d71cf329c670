//! Pipeline stage implementations
//!
//! Each stage wraps one phase of the release build: checkout, patching,
//! environment detection, dependency build, main build, packaging.
//! Diagnostics is not a stage; the engine invokes it on the failure path
//! of the two build stages.

pub mod build;
pub mod checkout;
pub mod deps;
pub mod diagnostics;
pub mod environment;
pub mod package;
pub mod patches;

use crate::core::pipeline::{self, stage_ids_for_plan};
use crate::core::{config::BuildPlan, BuildContext};
use crate::runner::{CommandRunner, RunnerError};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use build::MainBuildStage;
pub use checkout::CheckoutStage;
pub use deps::DepsStage;
pub use diagnostics::LogExcerpt;
pub use environment::EnvironmentStage;
pub use package::PackageStage;
pub use patches::PatchStage;

/// What a completed stage reports back
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// One-line summary for state and history
    pub summary: String,

    /// Non-fatal findings (optional patches skipped, fixup sources missing)
    pub warnings: Vec<String>,
}

impl StageReport {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            warnings: Vec::new(),
        }
    }
}

/// Stage failure taxonomy. Everything here is fatal for the run; there
/// are no retries.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Checkout directory {0} exists but is not writable")]
    UnwritableCheckout(PathBuf),

    #[error("Checkout directory {0} exists and is not a git checkout")]
    NotARepository(PathBuf),

    #[error("Failed to clone {url} at tag {tag}: {detail}")]
    CloneFailed {
        url: String,
        tag: String,
        detail: String,
    },

    #[error("Checked-out ref '{actual}' does not match tag '{expected}'")]
    TagMismatch { expected: String, actual: String },

    #[error("Required tool '{0}' not found on PATH")]
    ToolMissing(String),

    #[error("No usable Qt installation found ({checked} candidates checked)")]
    QtNotFound { checked: usize },

    #[error("Required patch context not found in {file}")]
    PatchContextMissing { file: String },

    #[error("{stage} command exited with code {code}")]
    CommandFailed {
        stage: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("Build reported success but expected binary {0} is missing")]
    BinaryMissing(PathBuf),

    #[error("Staged output directory {0} does not exist")]
    StagedDirMissing(PathBuf),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage id (matches the pipeline slot)
    fn id(&self) -> &'static str;

    /// Human-readable stage name
    fn name(&self) -> &'static str;

    /// Run the stage to completion
    async fn run(
        &self,
        ctx: &mut BuildContext,
        runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError>;
}

/// Build the stage sequence for a plan, mirroring
/// [`stage_ids_for_plan`](crate::core::pipeline::stage_ids_for_plan).
pub fn build_stages(plan: &BuildPlan) -> Vec<Box<dyn Stage>> {
    stage_ids_for_plan(plan)
        .into_iter()
        .map(|id| -> Box<dyn Stage> {
            match id {
                pipeline::STAGE_CHECKOUT => Box::new(CheckoutStage),
                pipeline::STAGE_PATCHES => Box::new(PatchStage),
                pipeline::STAGE_ENVIRONMENT => Box::new(EnvironmentStage),
                pipeline::STAGE_DEPS => Box::new(DepsStage),
                pipeline::STAGE_BUILD => Box::new(MainBuildStage),
                pipeline::STAGE_PACKAGE => Box::new(PackageStage),
                other => unreachable!("unknown stage id {other}"),
            }
        })
        .collect()
}
