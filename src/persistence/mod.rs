//! Persistence layer for build execution history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::BuildPipeline;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a build execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Upstream project name
    pub project: String,

    /// Pinned tag that was built
    pub tag: String,

    /// Target platform label
    pub platform: String,

    /// Execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Number of completed stages
    pub completed_stages: usize,

    /// Total number of stages
    pub total_stages: usize,

    /// Produced artifact path, if the run reached packaging
    pub artifact: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a build execution
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load an execution by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// List all executions for a project
    async fn list_executions(&self, project: &str) -> Result<Vec<ExecutionSummary>>;

    /// List all project names with recorded executions
    async fn list_projects(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    executions: tokio::sync::RwLock<std::collections::HashMap<Uuid, ExecutionSummary>>,
    by_project: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_project: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.insert(execution.execution_id, execution.clone());

        let mut by_project = self.by_project.write().await;
        by_project
            .entry(execution.project.clone())
            .or_insert_with(Vec::new)
            .push(execution.execution_id);

        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, project: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let by_project = self.by_project.read().await;

        if let Some(ids) = by_project.get(project) {
            let mut result = Vec::new();
            for id in ids {
                if let Some(exec) = execs.get(id) {
                    result.push(exec.clone());
                }
            }
            Ok(result)
        } else {
            Ok(Vec::new())
        }
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let by_project = self.by_project.read().await;
        Ok(by_project.keys().cloned().collect())
    }
}

/// Create a summary from a pipeline run
pub fn create_summary(pipeline: &BuildPipeline) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: pipeline.state.execution_id,
        project: pipeline.plan.project.clone(),
        tag: pipeline.plan.tag.clone(),
        platform: pipeline.plan.platform.clone(),
        status: pipeline.state.status,
        started_at: pipeline.state.started_at.unwrap_or_else(Utc::now),
        completed_at: pipeline.state.completed_at,
        progress: pipeline.state.progress(),
        completed_stages: pipeline.state.completed_stages,
        total_stages: pipeline.state.total_stages,
        artifact: pipeline.artifact.clone(),
    }
}
