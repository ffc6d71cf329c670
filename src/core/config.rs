//! Build plan configuration from YAML
//!
//! The plan is the single configuration surface: everything the shell
//! variants of this pipeline passed between stages through environment
//! variables lives here explicitly. A small set of `RELPIPE_*` variables
//! is layered on top as overrides, then CLI flags on top of that.

use crate::core::fixup::FixupConfig;
use crate::core::patch::PatchConfig;
use crate::core::pipeline::BuildPipeline;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level build plan loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Upstream project name (used in the artifact name)
    pub project: String,

    /// Tag to pin the upstream checkout to
    pub tag: String,

    /// Platform suffix for the artifact name (e.g. "linux-rocky9")
    pub platform: String,

    /// Architecture suffix; defaults to the host architecture
    #[serde(default = "default_arch")]
    pub arch: String,

    /// Working directory for checkout and build; defaults to the
    /// current directory
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Free-form variables for `{{ name }}` substitution in command argv
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Where the upstream source comes from
    pub source: SourceConfig,

    /// Command-line tools that must be on PATH before building
    #[serde(default)]
    pub tools: Vec<String>,

    /// Qt discovery configuration
    #[serde(default)]
    pub qt: Option<QtConfig>,

    /// Ordered source patches applied after checkout
    #[serde(default)]
    pub patches: Vec<PatchConfig>,

    /// Third-party dependency build target and post-build fixups
    #[serde(default)]
    pub deps: Option<DepsConfig>,

    /// Main build target
    pub build: BuildConfig,

    /// Failure diagnostics configuration
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Packaging configuration
    pub archive: ArchiveConfig,
}

/// Upstream source location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Repository URL to clone
    pub repo_url: String,

    /// Initialize submodules recursively after checkout
    #[serde(default = "default_true")]
    pub submodules: bool,

    /// Checkout directory name under the workdir; defaults to
    /// `<project>-<tag>`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Qt discovery chain: a pre-set variable, then configured candidate
/// locations, each validated by directory plus marker-library presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QtConfig {
    /// Environment variable exported to the build (and honored if
    /// already set in the plan env)
    #[serde(default = "default_qt_var")]
    pub var: String,

    /// Candidate installation roots, checked in order
    #[serde(default)]
    pub candidates: Vec<PathBuf>,

    /// Relative path that must exist under a valid installation,
    /// e.g. `lib/libQt6Core.so`
    pub marker: String,
}

/// Third-party dependency build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepsConfig {
    /// Command invoking the upstream "build all dependencies" target
    pub command: Vec<String>,

    /// Idempotent post-build repairs
    #[serde(default)]
    pub fixups: Vec<FixupConfig>,
}

/// Main executable build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Command invoking the upstream main build target
    pub command: Vec<String>,

    /// Job count passed through to the build tool via `{{ jobs }}`;
    /// defaults to host parallelism
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Expected output binary, relative to the source tree. Verified
    /// independently of the build exit code.
    pub binary: PathBuf,
}

/// Failure diagnostics: which logs to scan and what counts as an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Regex matching error lines in build logs
    #[serde(default = "default_error_pattern")]
    pub error_pattern: String,

    /// Candidate log locations, scanned in order
    #[serde(default)]
    pub logs: Vec<LogLocation>,

    /// Head/tail bound on excerpt lines per log
    #[serde(default = "default_excerpt_lines")]
    pub excerpt_lines: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            error_pattern: default_error_pattern(),
            logs: Vec::new(),
            excerpt_lines: default_excerpt_lines(),
        }
    }
}

/// A log location: either a single file or a directory scanned for
/// filenames matching a pattern (per-dependency ExternalProject logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogLocation {
    File { path: PathBuf },
    Matching { dir: PathBuf, name_pattern: String },
}

/// Packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Staged install/package root, relative to the source tree;
    /// archived verbatim
    pub staged_dir: PathBuf,

    /// Where to write the artifact; defaults to the workdir
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Compression format
    #[serde(default)]
    pub format: ArchiveFormat,
}

/// Supported archive formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    #[default]
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    /// File extension (without leading dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarZst => "tar.zst",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tar-gz" | "tar.gz" => Ok(ArchiveFormat::TarGz),
            "tar-zst" | "tar.zst" => Ok(ArchiveFormat::TarZst),
            other => anyhow::bail!("Unknown archive format: {}", other),
        }
    }
}

fn default_arch() -> String {
    std::env::consts::ARCH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_qt_var() -> String {
    "QTDIR".to_string()
}

fn default_error_pattern() -> String {
    r"(?i)\b(error|fatal|failed)\b".to_string()
}

fn default_excerpt_lines() -> usize {
    20
}

impl BuildPlan {
    /// Load a build plan from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a build plan from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let plan: BuildPlan = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Validate the plan
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            anyhow::bail!("Plan has an empty project name");
        }
        if self.tag.trim().is_empty() {
            anyhow::bail!("Plan has an empty tag");
        }
        if self.platform.trim().is_empty() {
            anyhow::bail!("Plan has an empty platform");
        }
        if self.source.repo_url.trim().is_empty() {
            anyhow::bail!("Plan has an empty repository URL");
        }

        if self.build.command.is_empty() {
            anyhow::bail!("Build command must not be empty");
        }
        if self.build.binary.is_absolute() {
            anyhow::bail!(
                "Expected binary path must be relative to the source tree: {}",
                self.build.binary.display()
            );
        }
        if self.archive.staged_dir.is_absolute() {
            anyhow::bail!(
                "Staged directory must be relative to the source tree: {}",
                self.archive.staged_dir.display()
            );
        }

        if let Some(deps) = &self.deps {
            if deps.command.is_empty() {
                anyhow::bail!("Dependency build command must not be empty");
            }
        }

        for patch in &self.patches {
            if patch.file.trim().is_empty() {
                anyhow::bail!("Patch has an empty file path");
            }
            if Path::new(&patch.file).is_absolute() {
                anyhow::bail!(
                    "Patch file path must be relative to the source tree: {}",
                    patch.file
                );
            }
            if patch.find.is_empty() {
                anyhow::bail!("Patch for '{}' has empty find text", patch.file);
            }
            if patch.find == patch.replace {
                anyhow::bail!(
                    "Patch for '{}' replaces text with itself",
                    patch.file
                );
            }
        }

        if let Some(qt) = &self.qt {
            if qt.marker.trim().is_empty() {
                anyhow::bail!("Qt config has an empty marker path");
            }
        }

        regex::Regex::new(&self.diagnostics.error_pattern).map_err(|e| {
            anyhow::anyhow!("Invalid diagnostics error pattern: {}", e)
        })?;
        for log in &self.diagnostics.logs {
            if let LogLocation::Matching { name_pattern, .. } = log {
                regex::Regex::new(name_pattern).map_err(|e| {
                    anyhow::anyhow!("Invalid log name pattern '{}': {}", name_pattern, e)
                })?;
            }
        }

        Ok(())
    }

    /// Apply `RELPIPE_*` environment overrides from the given variable map.
    ///
    /// Callers pass `std::env::vars().collect()`; tests pass a plain map.
    pub fn apply_overrides(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        if let Some(url) = vars.get("RELPIPE_REPO_URL") {
            self.source.repo_url = url.clone();
        }
        if let Some(platform) = vars.get("RELPIPE_PLATFORM") {
            self.platform = platform.clone();
        }
        if let Some(workdir) = vars.get("RELPIPE_WORKDIR") {
            self.workdir = Some(PathBuf::from(workdir));
        }
        if let Some(format) = vars.get("RELPIPE_ARCHIVE_FORMAT") {
            self.archive.format = format.parse()?;
        }
        if let Some(jobs) = vars.get("RELPIPE_JOBS") {
            let jobs: usize = jobs
                .parse()
                .map_err(|_| anyhow::anyhow!("RELPIPE_JOBS is not a number: {}", jobs))?;
            self.build.jobs = Some(jobs);
        }
        Ok(())
    }

    /// Checkout directory name under the workdir
    pub fn source_dir_name(&self) -> PathBuf {
        self.source
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}-{}", self.project, self.tag)))
    }

    /// Deterministic artifact filename:
    /// `<Project>-<tag>-<platform>-<arch>.<ext>`
    pub fn artifact_name(&self) -> String {
        format!(
            "{}-{}-{}-{}.{}",
            self.project,
            self.tag,
            self.platform,
            self.arch,
            self.archive.format.extension()
        )
    }

    /// Convert the plan to a pipeline
    pub fn to_pipeline(&self) -> BuildPipeline {
        BuildPipeline::from_plan(self)
    }
}

/// Substitute `{{ name }}` placeholders from a variable map
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{ {} }}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}
