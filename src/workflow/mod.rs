//! Workflow Engine (L4).
//!
//! DAG validation, wave scheduling, per-step retry/timeout, and durable
//! checkpointing. Grounded in `axon::orchestration::{workflow, dag, scheduler,
//! executor, mod}` for the data model and error-enum shape, and in
//! `axon::orchestration::parallel_tool_executor` for the wave-based,
//! semaphore-bounded dispatch pattern.

mod checkpoint;
mod dag;
mod engine;
mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointError, StepSnapshot};
pub use dag::DagError;
pub use engine::{WorkflowEngine, WorkflowEngineConfig};
pub use scheduler::StallReport;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::executor::{ExecutionOutcome, ExecutorTask};

/// Workflow engine errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("workflow deadlocked: blocked steps {blocked:?}, cycles {cycles:?}")]
    Deadlock {
        blocked: Vec<Uuid>,
        cycles: Vec<Vec<Uuid>>,
    },
    #[error("step '{0}' not found in workflow")]
    StepNotFound(Uuid),
    #[error("no eligible agent for step '{0}': {1}")]
    NoEligibleAgent(Uuid, String),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("other: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Step lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Workflow aggregate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A unit of work in a DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub name: String,
    pub agent_name: String,
    pub task: ExecutorTask,
    pub depends_on: Vec<Uuid>,
    pub timeout_seconds: u64,
    pub max_retries: u32,

    pub status: StepStatus,
    pub retry_count: u32,
    pub result: Option<ExecutionOutcome>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, agent_name: impl Into<String>, task: ExecutorTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agent_name: agent_name.into(),
            task,
            depends_on: Vec::new(),
            timeout_seconds: 60,
            max_retries: 0,
            status: StepStatus::Pending,
            retry_count: 0,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_dependency(mut self, step_id: Uuid) -> Self {
        self.depends_on.push(step_id);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// A DAG of `WorkflowStep`s and its aggregate run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            steps,
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Convenience builder: one step per task, all independent (no edges).
    pub fn parallel(name: impl Into<String>, tasks: Vec<(String, String, ExecutorTask)>) -> Self {
        let steps = tasks
            .into_iter()
            .map(|(step_name, agent_name, task)| WorkflowStep::new(step_name, agent_name, task))
            .collect();
        Self::new(name, "parallel workflow", steps)
    }

    /// Convenience builder: a linear chain, step `i` depends on step `i-1`.
    pub fn sequential(name: impl Into<String>, tasks: Vec<(String, String, ExecutorTask)>) -> Self {
        let mut steps: Vec<WorkflowStep> = Vec::with_capacity(tasks.len());
        let mut previous: Option<Uuid> = None;
        for (step_name, agent_name, task) in tasks {
            let mut step = WorkflowStep::new(step_name, agent_name, task);
            if let Some(prev_id) = previous {
                step = step.with_dependency(prev_id);
            }
            previous = Some(step.id);
            steps.push(step);
        }
        Self::new(name, "sequential workflow", steps)
    }

    pub fn step(&self, id: Uuid) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: Uuid) -> Option<&mut WorkflowStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn completed_step_ids(&self) -> Vec<Uuid> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.id)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}
