//! Dependency build stage
//!
//! Invokes the upstream "build all third-party dependencies" target, then
//! applies the plan's post-build fixups. Fixups are idempotent, so they
//! run unconditionally on every build.

use crate::core::fixup::FixupOutcome;
use crate::core::BuildContext;
use crate::runner::{CommandRequest, CommandRunner};
use crate::stages::{Stage, StageError, StageReport};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct DepsStage;

#[async_trait]
impl Stage for DepsStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_DEPS
    }

    fn name(&self) -> &'static str {
        "Dependency build"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        // Scheduled only when the plan configures a dependency build
        let Some(deps) = ctx.plan.deps.clone() else {
            return Ok(StageReport::new("No dependency build configured"));
        };

        let argv = ctx.render_command(&deps.command);
        info!("Building dependencies: {}", argv.join(" "));

        let request = CommandRequest::from_argv(&argv)
            .with_cwd(ctx.source_dir.clone())
            .with_env(ctx.env.clone());
        let output = runner.run(&request).await?;

        if !output.success() {
            return Err(StageError::CommandFailed {
                stage: "deps",
                code: output.code,
                stderr: output.stderr,
            });
        }

        let mut report = StageReport::default();
        let mut applied = 0;

        for fixup in &deps.fixups {
            match fixup.apply(&ctx.source_dir)? {
                FixupOutcome::Applied(n) => {
                    applied += n;
                    info!("Fixup applied ({} files): {}", n, fixup.label());
                }
                FixupOutcome::AlreadyInPlace => {
                    info!("Fixup already in place: {}", fixup.label());
                }
                FixupOutcome::SourceMissing => {
                    // Problem signature absent on this platform/tag.
                    warn!("Fixup source missing: {}", fixup.label());
                    report
                        .warnings
                        .push(format!("Fixup source missing: {}", fixup.label()));
                }
            }
        }

        report.summary = format!(
            "Dependencies built, {} fixup files copied",
            applied
        );
        Ok(report)
    }
}
