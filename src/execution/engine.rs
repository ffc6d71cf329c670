//! Main execution engine - drives the pipeline from checkout to artifact
//!
//! Execution is strictly linear: stages run one at a time in plan order
//! and the first failure stops the run. There is no retry and no
//! rescheduling; a failed release build is fixed by changing the plan
//! or the environment and running again.

use crate::{
    core::{pipeline, BuildContext, BuildPipeline, ExecutionStatus, StageState},
    runner::CommandRunner,
    stages::{build_stages, diagnostics, LogExcerpt, StageError},
};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that occur during pipeline execution
#[derive(Debug, Clone)]
pub enum BuildEvent {
    PipelineStarted {
        execution_id: Uuid,
        project: String,
        tag: String,
    },
    StageStarted {
        stage_id: String,
        stage_name: String,
    },
    StageCompleted {
        stage_id: String,
        summary: String,
    },
    StageWarning {
        stage_id: String,
        warning: String,
    },
    StageFailed {
        stage_id: String,
        error: String,
    },
    DiagnosticsCollected {
        stage_id: String,
        excerpts: Vec<LogExcerpt>,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
        artifact: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(BuildEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    runner: R,
    event_handlers: Mutex<Vec<EventHandler>>,
}

impl<R: CommandRunner + Send + Sync + 'static> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(BuildEvent) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.event_handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: BuildEvent) {
        if let Ok(handlers) = self.event_handlers.lock() {
            for handler in handlers.iter() {
                handler(event.clone());
            }
        }
    }

    /// Execute the entire pipeline. The returned context carries the
    /// exported environment and metadata of the run.
    pub async fn execute(&self, pipeline: &mut BuildPipeline) -> BuildContext {
        let execution_id = pipeline.state.execution_id;
        let mut ctx = BuildContext::new(pipeline.plan.clone());

        info!(
            "Starting build pipeline: {} {} ({})",
            ctx.plan.project, ctx.plan.tag, execution_id
        );
        self.emit_event(BuildEvent::PipelineStarted {
            execution_id,
            project: ctx.plan.project.clone(),
            tag: ctx.plan.tag.clone(),
        });

        let stages = build_stages(&ctx.plan);
        pipeline.state.start(stages.len());

        for stage in &stages {
            let stage_id = stage.id();
            let started_at = chrono::Utc::now();

            info!("Stage started: {}", stage.name());
            pipeline.set_stage_state(stage_id, StageState::Running { started_at });
            self.emit_event(BuildEvent::StageStarted {
                stage_id: stage_id.to_string(),
                stage_name: stage.name().to_string(),
            });

            match stage.run(&mut ctx, &self.runner).await {
                Ok(report) => {
                    for warning in &report.warnings {
                        warn!("{}: {}", stage.name(), warning);
                        self.emit_event(BuildEvent::StageWarning {
                            stage_id: stage_id.to_string(),
                            warning: warning.clone(),
                        });
                    }

                    info!("Stage completed: {} - {}", stage.name(), report.summary);
                    ctx.set_stage_output(stage_id, report.summary.clone());
                    pipeline.set_stage_state(
                        stage_id,
                        StageState::Completed {
                            summary: report.summary.clone(),
                            warnings: report.warnings,
                            started_at,
                            completed_at: chrono::Utc::now(),
                        },
                    );
                    self.emit_event(BuildEvent::StageCompleted {
                        stage_id: stage_id.to_string(),
                        summary: report.summary,
                    });
                }
                Err(err) => {
                    error!("Stage failed: {} - {}", stage.name(), err);
                    pipeline.set_stage_state(
                        stage_id,
                        StageState::Failed {
                            error: err.to_string(),
                            started_at,
                            failed_at: chrono::Utc::now(),
                        },
                    );
                    self.emit_event(BuildEvent::StageFailed {
                        stage_id: stage_id.to_string(),
                        error: err.to_string(),
                    });

                    if wants_diagnostics(stage_id, &err) {
                        let excerpts =
                            diagnostics::collect(&ctx.plan.diagnostics, &ctx.source_dir);
                        info!(
                            "Collected diagnostics from {} log file(s)",
                            excerpts.len()
                        );
                        self.emit_event(BuildEvent::DiagnosticsCollected {
                            stage_id: stage_id.to_string(),
                            excerpts,
                        });
                    }

                    pipeline.state.fail();
                    self.emit_event(BuildEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                        artifact: None,
                    });
                    return ctx;
                }
            }
        }

        pipeline.artifact = ctx.metadata.get("artifact").cloned();
        pipeline.state.complete();

        info!(
            "Build pipeline finished: {} {} - {:?}",
            ctx.plan.project, ctx.plan.tag, pipeline.state.status
        );
        self.emit_event(BuildEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
            artifact: pipeline.artifact.clone(),
        });

        ctx
    }
}

/// Diagnostics run only when a build command failed or produced no
/// binary; configuration and checkout errors carry their own context.
fn wants_diagnostics(stage_id: &str, err: &StageError) -> bool {
    let build_stage =
        stage_id == pipeline::STAGE_DEPS || stage_id == pipeline::STAGE_BUILD;
    build_stage
        && matches!(
            err,
            StageError::CommandFailed { .. } | StageError::BinaryMissing(_)
        )
}
