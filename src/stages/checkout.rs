//! Checkout stage - clone the upstream repository at the pinned tag
//!
//! A pre-existing checkout directory can come from a mounted cache volume
//! with mismatched ownership; that case is detected with a write probe
//! before any git invocation, so a corrupted partial checkout is never
//! built from silently.

use crate::core::BuildContext;
use crate::runner::{CommandRequest, CommandRunner};
use crate::stages::{Stage, StageError, StageReport};
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub struct CheckoutStage;

const WRITE_PROBE: &str = ".relpipe-write-probe";

#[async_trait]
impl Stage for CheckoutStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_CHECKOUT
    }

    fn name(&self) -> &'static str {
        "Checkout"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        let source_dir = ctx.source_dir.clone();
        let tag = ctx.plan.tag.clone();
        let url = ctx.plan.source.repo_url.clone();

        if source_dir.exists() {
            probe_writable(&source_dir)?;

            if source_dir.join(".git").exists() {
                info!("Reusing cached checkout at {}", source_dir.display());
                fetch_and_checkout(ctx, runner, &tag).await?;
            } else if dir_is_empty(&source_dir)? {
                clone(ctx, runner, &url, &tag).await?;
            } else {
                return Err(StageError::NotARepository(source_dir));
            }
        } else {
            clone(ctx, runner, &url, &tag).await?;
        }

        if ctx.plan.source.submodules {
            let output = runner
                .run(&git(ctx, &["submodule", "update", "--init", "--recursive"]))
                .await?;
            if !output.success() {
                return Err(StageError::CommandFailed {
                    stage: "checkout",
                    code: output.code,
                    stderr: output.stderr,
                });
            }
        }

        let actual = verify_tag(ctx, runner, &tag).await?;
        info!("Checked out {} at {}", ctx.plan.project, actual);

        Ok(StageReport::new(format!(
            "Checked out {} at tag {}",
            url, actual
        )))
    }
}

/// Fail fast on an unwritable pre-existing checkout, creating no state.
fn probe_writable(dir: &Path) -> Result<(), StageError> {
    let probe = dir.join(WRITE_PROBE);
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            fs::remove_file(&probe).ok();
            Ok(())
        }
        Err(_) => Err(StageError::UnwritableCheckout(dir.to_path_buf())),
    }
}

fn dir_is_empty(dir: &Path) -> Result<bool, StageError> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

fn git(ctx: &BuildContext, args: &[&str]) -> CommandRequest {
    CommandRequest {
        program: "git".to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        cwd: Some(ctx.source_dir.clone()),
        env: ctx.env.clone(),
    }
}

async fn clone(
    ctx: &BuildContext,
    runner: &dyn CommandRunner,
    url: &str,
    tag: &str,
) -> Result<(), StageError> {
    debug!("Cloning {} at tag {}", url, tag);

    let mut args = vec!["clone".to_string(), "--branch".to_string(), tag.to_string()];
    if ctx.plan.source.submodules {
        args.push("--recurse-submodules".to_string());
    }
    args.push(url.to_string());
    args.push(ctx.source_dir.display().to_string());

    let request = CommandRequest {
        program: "git".to_string(),
        args,
        cwd: Some(ctx.workdir.clone()),
        env: ctx.env.clone(),
    };

    let output = runner.run(&request).await?;
    if !output.success() {
        return Err(StageError::CloneFailed {
            url: url.to_string(),
            tag: tag.to_string(),
            detail: output.stderr.trim().to_string(),
        });
    }
    Ok(())
}

async fn fetch_and_checkout(
    ctx: &BuildContext,
    runner: &dyn CommandRunner,
    tag: &str,
) -> Result<(), StageError> {
    let fetch = runner
        .run(&git(ctx, &["fetch", "--tags", "origin"]))
        .await?;
    if !fetch.success() {
        return Err(StageError::CommandFailed {
            stage: "checkout",
            code: fetch.code,
            stderr: fetch.stderr,
        });
    }

    let checkout = runner.run(&git(ctx, &["checkout", tag])).await?;
    if !checkout.success() {
        return Err(StageError::CloneFailed {
            url: ctx.plan.source.repo_url.clone(),
            tag: tag.to_string(),
            detail: checkout.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Verify the working tree sits exactly at the pinned tag, independent of
/// what git reported along the way.
async fn verify_tag(
    ctx: &BuildContext,
    runner: &dyn CommandRunner,
    tag: &str,
) -> Result<String, StageError> {
    let output = runner
        .run(&git(ctx, &["describe", "--tags", "--exact-match"]))
        .await?;

    let actual = output.stdout.trim().to_string();
    if !output.success() || actual != tag {
        return Err(StageError::TagMismatch {
            expected: tag.to_string(),
            actual: if actual.is_empty() {
                output.stderr.trim().to_string()
            } else {
                actual
            },
        });
    }

    Ok(actual)
}
