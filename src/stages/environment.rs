//! Environment detection stage
//!
//! Locates required command-line tools on PATH and a compatible Qt
//! installation through a deterministic precedence chain: a pre-set
//! variable first, then configured candidate locations, then the Qt
//! online installer's default user location. A candidate is valid only
//! when both the directory and its marker library exist.

use crate::core::BuildContext;
use crate::runner::CommandRunner;
use crate::stages::{Stage, StageError, StageReport};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct EnvironmentStage;

#[async_trait]
impl Stage for EnvironmentStage {
    fn id(&self) -> &'static str {
        crate::core::pipeline::STAGE_ENVIRONMENT
    }

    fn name(&self) -> &'static str {
        "Environment detection"
    }

    async fn run(
        &self,
        ctx: &mut BuildContext,
        _runner: &dyn CommandRunner,
    ) -> Result<StageReport, StageError> {
        let mut findings = Vec::new();

        let path = ctx
            .env
            .get("PATH")
            .map(|p| std::ffi::OsString::from(p.clone()))
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();

        for tool in &ctx.plan.tools.clone() {
            match find_tool(tool, &path) {
                Some(location) => {
                    debug!("Found {} at {}", tool, location.display());
                    findings.push(format!("{} at {}", tool, location.display()));
                }
                None => return Err(StageError::ToolMissing(tool.clone())),
            }
        }

        if let Some(qt) = ctx.plan.qt.clone() {
            let user_root = dirs::home_dir().map(|home| home.join("Qt"));
            let qt_dir = locate_qt(
                ctx,
                &qt.var,
                &qt.candidates,
                &qt.marker,
                user_root.as_deref(),
            )?;
            info!("Using Qt at {}", qt_dir.display());

            ctx.env
                .insert(qt.var.clone(), qt_dir.display().to_string());
            ctx.metadata
                .insert("qt_dir".to_string(), qt_dir.display().to_string());
            findings.push(format!("Qt at {}", qt_dir.display()));
        }

        Ok(StageReport::new(findings.join(", ")))
    }
}

/// Look a tool up on PATH. Only plain existence is required; version
/// compatibility is the upstream build's problem.
pub fn find_tool(name: &str, path: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn qt_candidate_valid(dir: &Path, marker: &str) -> bool {
    dir.is_dir() && dir.join(marker).is_file()
}

fn locate_qt(
    ctx: &BuildContext,
    var: &str,
    candidates: &[PathBuf],
    marker: &str,
    user_root: Option<&Path>,
) -> Result<PathBuf, StageError> {
    let mut checked = 0;

    // Precedence 1: a pre-set variable wins when it points somewhere valid
    if let Some(preset) = ctx.env.get(var) {
        checked += 1;
        let dir = PathBuf::from(preset);
        if qt_candidate_valid(&dir, marker) {
            return Ok(dir);
        }
        debug!("Preset {}={} is not a valid Qt installation", var, preset);
    }

    // Precedence 2: configured candidates, in order
    for candidate in candidates {
        checked += 1;
        if qt_candidate_valid(candidate, marker) {
            return Ok(candidate.clone());
        }
        debug!("Qt candidate {} rejected", candidate.display());
    }

    // Precedence 3: the online installer's default user location
    if let Some(root) = user_root {
        for candidate in default_install_candidates(root) {
            checked += 1;
            if qt_candidate_valid(&candidate, marker) {
                return Ok(candidate);
            }
            debug!("Qt candidate {} rejected", candidate.display());
        }
    }

    Err(StageError::QtNotFound { checked })
}

/// `<root>/<version>/<toolchain>` directories, newest version first
fn default_install_candidates(root: &Path) -> Vec<PathBuf> {
    let mut versions: Vec<PathBuf> = match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect(),
        Err(_) => return Vec::new(),
    };
    versions.sort();
    versions.reverse();

    let mut candidates = Vec::new();
    for version in versions {
        let mut toolchains: Vec<PathBuf> = match std::fs::read_dir(&version) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect(),
            Err(_) => continue,
        };
        toolchains.sort();
        candidates.extend(toolchains);
    }
    candidates
}
