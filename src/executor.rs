//! Executor Contract (L6, external collaborator).
//!
//! The engine never introspects executor internals; any LLM, CLI, or remote
//! call is an implementation detail behind this trait. This mirrors how
//! `axon`'s orchestration layer treats agents: it only ever calls through a
//! capability surface, never reaching into an agent's process or runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Opaque task payload handed to an executor. The engine does not interpret
/// its contents beyond what the router needs (`required_capabilities`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorTask {
    pub description: String,
    pub task_type: String,
    pub context: serde_json::Value,
    pub required_capabilities: HashSet<String>,
}

/// Outcome of a single `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub output: serde_json::Value,
    pub artifacts: Vec<String>,
    pub error: Option<String>,
    pub duration: Duration,
    /// When set, the engine bypasses retries regardless of remaining budget.
    pub permanent_failure: bool,
}

impl ExecutionOutcome {
    pub fn success(output: serde_json::Value, duration: Duration) -> Self {
        Self {
            success: true,
            output,
            artifacts: Vec::new(),
            error: None,
            duration,
            permanent_failure: false,
        }
    }

    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            artifacts: Vec::new(),
            error: Some(error.into()),
            duration,
            permanent_failure: false,
        }
    }

    pub fn permanent_failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            artifacts: Vec::new(),
            error: Some(error.into()),
            duration,
            permanent_failure: true,
        }
    }
}

/// Static metadata describing an executor, as seen by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorMetadata {
    pub name: String,
    pub capabilities: HashSet<String>,
    pub max_concurrent: usize,
}

/// The capability set any task-handling unit must implement to participate
/// in workflow execution.
///
/// Calls may suspend indefinitely; callers wrap `execute` with both a
/// cooperative cancellation signal and a hard per-attempt deadline (see
/// `workflow::engine`). Implementations should honor cancellation promptly
/// but are not required to guarantee it — the engine's timeout is the
/// backstop.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Execute a task to completion or failure.
    async fn execute(&self, task: &ExecutorTask) -> ExecutionOutcome;

    /// Best-effort, non-essential reasoning trace used for observability.
    /// Implementations that have nothing to report return an empty vector.
    async fn think(&self, _task: &ExecutorTask) -> Vec<String> {
        Vec::new()
    }

    /// Static metadata used by the router for capability matching.
    fn metadata(&self) -> ExecutorMetadata;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct EchoExecutor;

    #[async_trait]
    impl AgentExecutor for EchoExecutor {
        async fn execute(&self, task: &ExecutorTask) -> ExecutionOutcome {
            let start = Instant::now();
            ExecutionOutcome::success(serde_json::json!({"echo": task.description}), start.elapsed())
        }

        fn metadata(&self) -> ExecutorMetadata {
            ExecutorMetadata {
                name: "echo".to_string(),
                capabilities: HashSet::from(["echo".to_string()]),
                max_concurrent: 1,
            }
        }
    }

    #[tokio::test]
    async fn default_think_is_empty() {
        let executor = EchoExecutor;
        let task = ExecutorTask {
            description: "hi".to_string(),
            task_type: "test".to_string(),
            context: serde_json::Value::Null,
            required_capabilities: HashSet::new(),
        };
        assert!(executor.think(&task).await.is_empty());
    }

    #[tokio::test]
    async fn execute_reports_success() {
        let executor = EchoExecutor;
        let task = ExecutorTask {
            description: "hi".to_string(),
            task_type: "test".to_string(),
            context: serde_json::Value::Null,
            required_capabilities: HashSet::new(),
        };
        let outcome = executor.execute(&task).await;
        assert!(outcome.success);
        assert!(!outcome.permanent_failure);
    }
}
