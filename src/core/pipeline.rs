//! Pipeline domain model
//!
//! A build pipeline is a fixed, strictly linear stage sequence. Optional
//! stages (patches, environment, deps) are present only when the plan
//! configures them; control always flows forward and stops at the first
//! failure.

use crate::core::{
    config::BuildPlan,
    state::{ExecutionStatus, PipelineState, StageState},
};

pub const STAGE_CHECKOUT: &str = "checkout";
pub const STAGE_PATCHES: &str = "patches";
pub const STAGE_ENVIRONMENT: &str = "environment";
pub const STAGE_DEPS: &str = "deps";
pub const STAGE_BUILD: &str = "build";
pub const STAGE_PACKAGE: &str = "package";

/// Stage ids for a plan, in execution order
pub fn stage_ids_for_plan(plan: &BuildPlan) -> Vec<&'static str> {
    let mut ids = vec![STAGE_CHECKOUT];
    if !plan.patches.is_empty() {
        ids.push(STAGE_PATCHES);
    }
    if plan.qt.is_some() || !plan.tools.is_empty() {
        ids.push(STAGE_ENVIRONMENT);
    }
    if plan.deps.is_some() {
        ids.push(STAGE_DEPS);
    }
    ids.push(STAGE_BUILD);
    ids.push(STAGE_PACKAGE);
    ids
}

/// A stage slot: id plus runtime state, in pipeline order
#[derive(Debug, Clone)]
pub struct StageSlot {
    pub id: String,
    pub state: StageState,
}

/// A build pipeline run
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    /// The plan driving this run
    pub plan: BuildPlan,

    /// Execution state
    pub state: PipelineState,

    /// Path of the produced artifact, once packaging completes
    pub artifact: Option<String>,

    slots: Vec<StageSlot>,
}

impl BuildPipeline {
    /// Create a pipeline from a plan
    pub fn from_plan(plan: &BuildPlan) -> Self {
        let slots = stage_ids_for_plan(plan)
            .into_iter()
            .map(|id| StageSlot {
                id: id.to_string(),
                state: StageState::Pending,
            })
            .collect();

        BuildPipeline {
            plan: plan.clone(),
            state: PipelineState::new(),
            artifact: None,
            slots,
        }
    }

    /// Stage ids in execution order
    pub fn stage_ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }

    /// Stage slots in execution order
    pub fn slots(&self) -> &[StageSlot] {
        &self.slots
    }

    /// Get the state of a stage by id
    pub fn stage_state(&self, id: &str) -> Option<&StageState> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.state)
    }

    /// Set the state of a stage and refresh the counters
    pub fn set_stage_state(&mut self, id: &str, state: StageState) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.id == id) {
            slot.state = state;
        }
        self.update_counts();
    }

    /// Check if every stage reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.state.is_terminal())
    }

    /// Check if the pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
            || self
                .slots
                .iter()
                .any(|s| matches!(s.state, StageState::Failed { .. }))
    }

    fn update_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;

        for slot in &self.slots {
            match &slot.state {
                StageState::Completed { .. } | StageState::Skipped { .. } => completed += 1,
                StageState::Failed { .. } => failed += 1,
                _ => {}
            }
        }

        self.state.total_stages = self.slots.len();
        self.state.completed_stages = completed;
        self.state.failed_stages = failed;
    }
}
