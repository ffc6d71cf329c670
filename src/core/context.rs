//! Build context - explicit configuration threaded through stages
//!
//! What the shell variants of this pipeline passed between stages as
//! exported environment variables becomes one struct handed to every
//! stage call.

use crate::core::config::{render_template, BuildPlan};
use std::collections::HashMap;
use std::path::PathBuf;

/// Execution context for a pipeline run
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The build plan driving this run
    pub plan: BuildPlan,

    /// Resolved working directory
    pub workdir: PathBuf,

    /// Resolved upstream checkout directory
    pub source_dir: PathBuf,

    /// Environment exported to every subprocess (stages may add to it,
    /// e.g. the detected Qt installation)
    pub env: HashMap<String, String>,

    /// Summaries from completed stages (stage_id -> summary)
    pub stage_outputs: HashMap<String, String>,

    /// Metadata about the execution (qt_dir, artifact path, ...)
    pub metadata: HashMap<String, String>,
}

impl BuildContext {
    /// Create a context from a plan, resolving directories
    pub fn new(plan: BuildPlan) -> Self {
        let workdir = plan
            .workdir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let source_dir = workdir.join(plan.source_dir_name());

        Self {
            plan,
            workdir,
            source_dir,
            env: HashMap::new(),
            stage_outputs: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Staged output directory (the install root that gets archived)
    pub fn staged_dir(&self) -> PathBuf {
        self.source_dir.join(&self.plan.archive.staged_dir)
    }

    /// Expected output binary of the main build
    pub fn binary_path(&self) -> PathBuf {
        self.source_dir.join(&self.plan.build.binary)
    }

    /// Where the artifact gets written
    pub fn output_dir(&self) -> PathBuf {
        self.plan
            .archive
            .output_dir
            .clone()
            .unwrap_or_else(|| self.workdir.clone())
    }

    /// Record the summary of a completed stage
    pub fn set_stage_output(&mut self, stage_id: &str, summary: String) {
        self.stage_outputs.insert(stage_id.to_string(), summary);
    }

    /// Job count passed through to the build tool
    pub fn jobs(&self) -> usize {
        self.plan.build.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Variables available for `{{ name }}` substitution in command argv
    pub fn rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.plan.variables.clone();

        vars.insert("project".to_string(), self.plan.project.clone());
        vars.insert("tag".to_string(), self.plan.tag.clone());
        vars.insert("platform".to_string(), self.plan.platform.clone());
        vars.insert("arch".to_string(), self.plan.arch.clone());
        vars.insert("jobs".to_string(), self.jobs().to_string());
        vars.insert(
            "workdir".to_string(),
            self.workdir.display().to_string(),
        );
        vars.insert(
            "source_dir".to_string(),
            self.source_dir.display().to_string(),
        );

        for (key, value) in &self.metadata {
            vars.insert(key.clone(), value.clone());
        }

        vars
    }

    /// Render a command argv with the current variables
    pub fn render_command(&self, command: &[String]) -> Vec<String> {
        let vars = self.rendering_variables();
        command
            .iter()
            .map(|arg| render_template(arg, &vars))
            .collect()
    }
}
