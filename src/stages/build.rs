//! Main build stage
//!
//! Invokes the upstream main executable target. Success is judged by the
//! exit code AND by independently verifying the expected binary exists:
//! nested shell/alias invocation has historically produced "exit 0 but no
//! binary" false positives, so that is a failure class of its own.

use crate::core::BuildContext;
use crate::runner::{CommandRequest, CommandRunner};
use crate::stages::{Stage, StageError, StageReport};
use async_trait::async_trait;
use tracing::info;

pub struct MainBuildStage;

#[async_trait]
impl Stage for MainBuildStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_BUILD
    }

    fn name(&self) -> &'static str {
        "Main build"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        let argv = ctx.render_command(&ctx.plan.build.command.clone());
        info!("Building main target: {}", argv.join(" "));

        let request = CommandRequest::from_argv(&argv)
            .with_cwd(ctx.source_dir.clone())
            .with_env(ctx.env.clone());
        let output = runner.run(&request).await?;

        if !output.success() {
            return Err(StageError::CommandFailed {
                stage: "build",
                code: output.code,
                stderr: output.stderr,
            });
        }

        let binary = ctx.binary_path();
        if !binary.is_file() {
            return Err(StageError::BinaryMissing(binary));
        }

        info!("Build produced {}", binary.display());
        Ok(StageReport::new(format!(
            "Built {}",
            ctx.plan.build.binary.display()
        )))
    }
}
