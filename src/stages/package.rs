//! Packaging stage
//!
//! Archives the staged output directory verbatim into a single compressed
//! tarball named `<Project>-<tag>-<platform>-<arch>.<ext>`. Files are
//! collected in sorted order so the archive layout is deterministic.

use crate::core::config::ArchiveFormat;
use crate::core::BuildContext;
use crate::runner::CommandRunner;
use crate::stages::{Stage, StageError, StageReport};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use async_compression::tokio::write::{GzipEncoder, ZstdEncoder};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio_tar::{ArchiveBuilder, Builder};
use tracing::info;
use walkdir::WalkDir;

pub struct PackageStage;

#[async_trait]
impl Stage for PackageStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_PACKAGE
    }

    fn name(&self) -> &'static str {
        "Packaging"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        _runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        let staged = ctx.staged_dir();
        if !staged.is_dir() {
            return Err(StageError::StagedDirMissing(staged));
        }

        let output_dir = ctx.output_dir();
        tokio::fs::create_dir_all(&output_dir).await?;
        let artifact = output_dir.join(ctx.plan.artifact_name());

        let file_count =
            compress_tar(&staged, &artifact, ctx.plan.archive.format).await?;

        info!(
            "Packaged {} entries into {}",
            file_count,
            artifact.display()
        );
        ctx.metadata
            .insert("artifact".to_string(), artifact.display().to_string());

        Ok(StageReport::new(format!(
            "Wrote {}",
            artifact.display()
        )))
    }
}

/// Archive the entire staged tree into `artifact`. Returns the number of
/// entries written.
pub async fn compress_tar(
    staged: &Path,
    artifact: &Path,
    format: ArchiveFormat,
) -> Result<usize, StageError> {
    let mut entries: Vec<PathBuf> = WalkDir::new(staged)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p != staged)
        .collect();
    entries.sort();

    let tar = File::create(artifact).await?;
    let encoder: Box<dyn AsyncWrite + Unpin + Send> = match format {
        ArchiveFormat::TarGz => Box::new(GzipEncoder::new(tar)),
        ArchiveFormat::TarZst => Box::new(ZstdEncoder::new(tar)),
    };
    let mut builder = Builder::new(encoder);

    let mut count = 0;
    for path in &entries {
        let relative = path
            .strip_prefix(staged)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if path.is_dir() {
            builder.append_dir(relative, path).await?;
        } else if path.is_file() {
            builder.append_path_with_name(path, relative).await?;
        }
        count += 1;
    }

    let mut output = builder.into_inner().await?;
    output.shutdown().await?;

    Ok(count)
}

/// Unpack an archive produced by [`compress_tar`] into `target_dir`.
pub async fn unpack_tar(
    artifact: &Path,
    target_dir: &Path,
    format: ArchiveFormat,
) -> Result<(), StageError> {
    let file = File::open(artifact).await?;
    let reader = BufReader::new(file);

    let mut archive = match format {
        ArchiveFormat::TarGz => {
            ArchiveBuilder::new(Box::new(GzipDecoder::new(reader))
                as Box<dyn tokio::io::AsyncRead + Unpin + Send>)
            .set_preserve_permissions(true)
            .set_ignore_zeros(true)
            .build()
        }
        ArchiveFormat::TarZst => {
            ArchiveBuilder::new(Box::new(ZstdDecoder::new(reader))
                as Box<dyn tokio::io::AsyncRead + Unpin + Send>)
            .set_preserve_permissions(true)
            .set_ignore_zeros(true)
            .build()
        }
    };

    archive.unpack(target_dir).await?;
    Ok(())
}
