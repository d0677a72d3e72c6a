//! Durable, atomic checkpoint save/load/delete.
//!
//! Grounded in the pack's general atomic-write idiom (scratch file + rename,
//! as used throughout `boternity-infra`'s storage code): marshal to a
//! `.tmp` sibling, then rename over the canonical path so a reader never
//! observes a partial write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{StepStatus, Workflow};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Snapshot of a single step's mutable runtime fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub id: Uuid,
    pub name: String,
    pub status: StepStatus,
    pub retry_count: u32,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A durable snapshot of a workflow's completed-step set and step runtime
/// fields, used to resume execution after a crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub completed_steps: Vec<Uuid>,
    pub steps: Vec<StepSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            completed_steps: workflow.completed_step_ids(),
            steps: workflow
                .steps
                .iter()
                .map(|s| StepSnapshot {
                    id: s.id,
                    name: s.name.clone(),
                    status: s.status,
                    retry_count: s.retry_count,
                    error: s.error.clone(),
                    started_at: s.started_at,
                    completed_at: s.completed_at,
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }

    pub fn path(dir: &Path, workflow_id: Uuid) -> PathBuf {
        dir.join(format!("{workflow_id}.json"))
    }

    /// Marshal to a scratch file in `dir`, then rename over the canonical path.
    pub async fn save(&self, dir: &Path) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(dir).await?;
        let final_path = Self::path(dir, self.workflow_id);
        let tmp_path = dir.join(format!("{}.json.tmp", self.workflow_id));

        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    pub async fn load(dir: &Path, workflow_id: Uuid) -> Result<Option<Self>, CheckpointError> {
        let path = Self::path(dir, workflow_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deleted on terminal workflow status; side-effect-safe to call when no
    /// checkpoint exists.
    pub async fn delete(dir: &Path, workflow_id: Uuid) -> Result<(), CheckpointError> {
        let path = Self::path(dir, workflow_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply this checkpoint's step snapshots back onto `workflow`, restoring
    /// status and reconstructing `completed_steps` without re-executing any
    /// step already `Completed`.
    pub fn apply_to(&self, workflow: &mut Workflow) {
        for snapshot in &self.steps {
            if let Some(step) = workflow.step_mut(snapshot.id) {
                // An in-flight `Running` snapshot is treated as `Pending` and
                // re-run rather than resumed mid-flight.
                step.status = match snapshot.status {
                    StepStatus::Running => StepStatus::Pending,
                    other => other,
                };
                step.retry_count = snapshot.retry_count;
                step.error = snapshot.error.clone();
                step.started_at = snapshot.started_at;
                step.completed_at = snapshot.completed_at;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorTask;
    use crate::workflow::WorkflowStep;
    use std::collections::HashSet;

    fn task() -> ExecutorTask {
        ExecutorTask {
            description: "t".to_string(),
            task_type: "test".to_string(),
            context: serde_json::Value::Null,
            required_capabilities: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let step = WorkflowStep::new("a", "agent", task());
        let workflow = Workflow::new("w", "d", vec![step]);
        let checkpoint = Checkpoint::from_workflow(&workflow);

        checkpoint.save(dir.path()).await.unwrap();
        let loaded = Checkpoint::load(dir.path(), workflow.id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, workflow.id);
        assert_eq!(loaded.steps.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_checkpoint_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Checkpoint::load(dir.path(), Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        Checkpoint::delete(dir.path(), id).await.unwrap();
        Checkpoint::delete(dir.path(), id).await.unwrap();
    }

    #[tokio::test]
    async fn running_step_resumes_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = WorkflowStep::new("a", "agent", task());
        step.status = StepStatus::Running;
        let mut workflow = Workflow::new("w", "d", vec![step]);
        let checkpoint = Checkpoint::from_workflow(&workflow);
        checkpoint.save(dir.path()).await.unwrap();

        let loaded = Checkpoint::load(dir.path(), workflow.id).await.unwrap().unwrap();
        loaded.apply_to(&mut workflow);
        assert_eq!(workflow.steps[0].status, StepStatus::Pending);
    }
}
