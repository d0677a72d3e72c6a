//! Crash-and-resume integration test (spec scenario S5): a workflow engine
//! that "crashes" after completing step A must, on re-invocation against the
//! same checkpoint directory, resume by re-dispatching only the steps that
//! never completed, without re-invoking the executor for `A`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use conductor::executor::{ExecutionOutcome, ExecutorMetadata, ExecutorTask};
use conductor::router::{AgentCapabilities, AgentType};
use conductor::workflow::{
    Checkpoint, StepStatus, Workflow, WorkflowEngine, WorkflowEngineConfig, WorkflowStatus, WorkflowStep,
};
use conductor::AgentExecutor;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

struct CountingAgent {
    name: String,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl AgentExecutor for CountingAgent {
    async fn execute(&self, _task: &ExecutorTask) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExecutionOutcome::success(serde_json::json!({}), std::time::Duration::from_millis(1))
    }
    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            name: self.name.clone(),
            capabilities: HashSet::from(["dev".to_string()]),
            max_concurrent: 4,
        }
    }
}

fn task() -> ExecutorTask {
    ExecutorTask {
        description: "do it".to_string(),
        task_type: "development".to_string(),
        context: serde_json::Value::Null,
        required_capabilities: HashSet::from(["dev".to_string()]),
    }
}

fn engine(checkpoint_dir: std::path::PathBuf) -> WorkflowEngine {
    WorkflowEngine::new(WorkflowEngineConfig {
        max_concurrent_agents: 2,
        checkpoint_dir,
        checkpoints_enabled: true,
        ..WorkflowEngineConfig::default()
    })
}

fn register(engine: &WorkflowEngine, name: &str, calls: &Arc<AtomicU32>) {
    engine
        .register_agent(
            Arc::new(CountingAgent { name: name.to_string(), calls: calls.clone() }),
            AgentCapabilities::new(name, AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
        )
        .unwrap();
}

#[tokio::test]
async fn resuming_from_a_crash_checkpoint_skips_completed_steps() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let a = WorkflowStep::new("a", "a", task());
    let b = WorkflowStep::new("b", "b", task()).with_dependency(a.id);
    let c = WorkflowStep::new("c", "c", task()).with_dependency(b.id);
    let a_id = a.id;
    // The reloaded workflow: as if deserialized fresh from durable storage
    // after the restart, all steps still `Pending`.
    let reloaded = Workflow::new("chain", "a -> b -> c", vec![a, b, c]);

    // Simulate a crash: a checkpoint exists on disk recording `a` as
    // completed, but the process never got to dispatch `b` or `c`, and never
    // reached the terminal-status checkpoint cleanup.
    let mut crashed = reloaded.clone();
    crashed.step_mut(a_id).unwrap().status = StepStatus::Completed;
    Checkpoint::from_workflow(&crashed).save(dir.path()).await.unwrap();

    let calls_a = Arc::new(AtomicU32::new(0));
    let calls_b = Arc::new(AtomicU32::new(0));
    let calls_c = Arc::new(AtomicU32::new(0));

    let resumed_engine = engine(dir.path().to_path_buf());
    register(&resumed_engine, "a", &calls_a);
    register(&resumed_engine, "b", &calls_b);
    register(&resumed_engine, "c", &calls_c);

    let result = resumed_engine.execute_workflow(reloaded).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(calls_a.load(Ordering::SeqCst), 0, "completed step `a` must not be re-executed");
    assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    assert_eq!(calls_c.load(Ordering::SeqCst), 1);
}
