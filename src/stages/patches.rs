//! Patch stage - apply plan patches to the fresh checkout, in order

use crate::core::patch::{apply_patch, PatchOutcome};
use crate::core::BuildContext;
use crate::runner::CommandRunner;
use crate::stages::{Stage, StageError, StageReport};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct PatchStage;

#[async_trait]
impl Stage for PatchStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_PATCHES
    }

    fn name(&self) -> &'static str {
        "Patch application"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        _runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        let mut applied = 0;
        let mut already = 0;
        let mut report = StageReport::default();

        for patch in &ctx.plan.patches {
            match apply_patch(&ctx.source_dir, patch)? {
                PatchOutcome::Applied => {
                    applied += 1;
                    match &patch.reason {
                        Some(reason) => info!("Patched {} ({})", patch.file, reason),
                        None => info!("Patched {}", patch.file),
                    }
                }
                PatchOutcome::AlreadyApplied => {
                    already += 1;
                    info!("Patch for {} already applied", patch.file);
                }
                PatchOutcome::ContextMissing => {
                    if patch.required {
                        return Err(StageError::PatchContextMissing {
                            file: patch.file.clone(),
                        });
                    }
                    // Upstream drift: this fix is not load-bearing for
                    // every tag, so continue.
                    warn!(
                        "Patch context not found in {}, continuing (optional)",
                        patch.file
                    );
                    report
                        .warnings
                        .push(format!("Optional patch skipped: {}", patch.file));
                }
            }
        }

        report.summary = format!(
            "{} patched, {} already applied, {} skipped",
            applied,
            already,
            report.warnings.len()
        );
        Ok(report)
    }
}
