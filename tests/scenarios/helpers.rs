//! Test utility functions for relpipe scenario tests

use async_trait::async_trait;
use relpipe::core::config::BuildPlan;
use relpipe::core::{BuildContext, BuildPipeline, ExecutionStatus, StageState};
use relpipe::execution::{BuildEvent, ExecutionEngine};
use relpipe::runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Mock runner that returns scripted outputs in order and records every
/// request it receives
pub struct MockRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    requests: Arc<Mutex<Vec<CommandRequest>>>,
}

impl MockRunner {
    pub fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded requests, valid after the runner
    /// has been moved into an engine
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<CommandRequest>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RunnerError::Spawn {
                program: request.program.clone(),
                detail: "MockRunner: no scripted output left".to_string(),
            })
    }
}

/// A successful command output
pub fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// A failed command output
pub fn failure(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Result of running a plan against a mock runner
pub struct BuildTestResult {
    pub pipeline: BuildPipeline,
    pub ctx: BuildContext,
    pub events: Vec<BuildEvent>,
    pub requests: Vec<CommandRequest>,
}

impl BuildTestResult {
    pub fn is_success(&self) -> bool {
        matches!(self.pipeline.state.status, ExecutionStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.pipeline.state.status, ExecutionStatus::Failed)
    }

    /// Summary of a completed stage
    pub fn stage_summary(&self, stage_id: &str) -> Option<String> {
        match self.pipeline.stage_state(stage_id) {
            Some(StageState::Completed { summary, .. }) => Some(summary.clone()),
            _ => None,
        }
    }

    /// Error of a failed stage
    pub fn stage_error(&self, stage_id: &str) -> Option<String> {
        match self.pipeline.stage_state(stage_id) {
            Some(StageState::Failed { error, .. }) => Some(error.clone()),
            _ => None,
        }
    }
}

/// Run a plan with scripted command outputs
pub async fn run_plan_with_mock(
    plan: BuildPlan,
    outputs: Vec<CommandOutput>,
) -> BuildTestResult {
    let runner = MockRunner::new(outputs);
    let requests = runner.requests_handle();

    let mut pipeline = plan.to_pipeline();
    let engine = ExecutionEngine::new(runner);

    let events: Arc<Mutex<Vec<BuildEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let ctx = engine.execute(&mut pipeline).await;

    let events = events.lock().unwrap().clone();
    let requests = requests.lock().unwrap().clone();

    BuildTestResult {
        pipeline,
        ctx,
        events,
        requests,
    }
}

/// A fresh workdir under the system temp directory
pub fn temp_workdir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("relpipe-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Parse a plan and point its workdir at `workdir`
pub fn plan_in_workdir(yaml: &str, workdir: &PathBuf) -> BuildPlan {
    let mut plan = BuildPlan::from_yaml(yaml).unwrap();
    plan.workdir = Some(workdir.clone());
    plan
}

/// Lay down a fake cached checkout so the checkout stage takes the
/// fetch-and-checkout path instead of cloning
pub fn seed_cached_checkout(workdir: &PathBuf, plan: &BuildPlan) -> PathBuf {
    let source_dir = workdir.join(plan.source_dir_name());
    std::fs::create_dir_all(source_dir.join(".git")).unwrap();
    source_dir
}

/// Assert the pipeline completed successfully
pub fn assert_pipeline_completed(result: &BuildTestResult) {
    assert!(
        result.is_success(),
        "Pipeline should have completed, status: {:?}",
        result.pipeline.state.status
    );
    assert!(result.pipeline.is_complete());
}

/// Assert the pipeline failed at the given stage
pub fn assert_pipeline_failed_at(result: &BuildTestResult, stage_id: &str) {
    assert!(
        result.is_failed(),
        "Pipeline should have failed, status: {:?}",
        result.pipeline.state.status
    );
    assert!(
        matches!(
            result.pipeline.stage_state(stage_id),
            Some(StageState::Failed { .. })
        ),
        "Stage {} should be Failed, got {:?}",
        stage_id,
        result.pipeline.stage_state(stage_id)
    );
}

/// Assert the recorded subprocess programs, in order
pub fn assert_programs(result: &BuildTestResult, expected: &[&str]) {
    let programs: Vec<&str> = result
        .requests
        .iter()
        .map(|r| r.program.as_str())
        .collect();
    assert_eq!(programs, expected, "unexpected subprocess sequence");
}
