//! The wave-scheduling workflow runner.
//!
//! Grounded in `axon::orchestration::parallel_tool_executor::ParallelToolExecutor`'s
//! stage-by-stage dispatch (topological staging, `Arc<Semaphore>` for bounded
//! concurrency, `tokio::spawn` + `tokio::time::timeout` per unit of work),
//! adapted from a one-shot static DAG to a live wave loop that recomputes the
//! runnable frontier after each round and checkpoints after every step
//! completion.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{Event, EventBus, EventType};
use crate::executor::{AgentExecutor, ExecutionOutcome};
use crate::router::{AgentCapabilities, RouterError, Task as RouterTask, TaskRouter};

use super::checkpoint::Checkpoint;
use super::{dag, scheduler, StepStatus, Workflow, WorkflowError, WorkflowStatus, WorkflowStep};

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct WorkflowEngineConfig {
    pub max_concurrent_agents: usize,
    pub checkpoint_dir: PathBuf,
    pub checkpoints_enabled: bool,
    /// Grace period after cancellation before an in-flight step's result is
    /// discarded and the step is marked `Cancelled`.
    pub cancellation_grace_period: Duration,
    /// Backoff applied before a wave that contains a retried step.
    pub retry_backoff: RetryBackoffConfig,
}

impl Default for WorkflowEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 4,
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoints_enabled: true,
            cancellation_grace_period: Duration::from_secs(5),
            retry_backoff: RetryBackoffConfig::default(),
        }
    }
}

/// Exponential backoff with jitter applied between a step's retry attempts.
/// Grounded in `claude-sdk-rs::runtime::error_handling::RetryConfig`'s
/// `delay_for_attempt` (base * multiplier^attempt, capped, ±25% jitter).
#[derive(Debug, Clone)]
pub struct RetryBackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub add_jitter: bool,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryBackoffConfig {
    /// Delay before the wave containing `attempt`'s retry dispatches again.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.backoff_multiplier.powi(attempt as i32)).min(self.max_delay.as_millis() as f64);

        let final_ms = if self.add_jitter {
            let jitter = (rand::random::<f64>() - 0.5) * 0.5 * delay_ms;
            (delay_ms + jitter).max(0.0)
        } else {
            delay_ms
        };
        Duration::from_millis(final_ms as u64)
    }
}

struct RegisteredAgent {
    executor: Arc<dyn AgentExecutor>,
}

/// Runs workflows to a terminal state: validates the DAG, dispatches
/// runnable steps wave by wave bounded by a semaphore, retries or fails
/// steps per their policy, and checkpoints after every completion.
pub struct WorkflowEngine {
    config: WorkflowEngineConfig,
    router: Arc<TaskRouter>,
    agents: DashMap<String, RegisteredAgent>,
    events: Arc<EventBus>,
    cancellations: DashMap<Uuid, CancellationToken>,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowEngineConfig) -> Self {
        Self {
            config,
            router: Arc::new(TaskRouter::new()),
            agents: DashMap::new(),
            events: Arc::new(EventBus::default()),
            cancellations: DashMap::new(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Register an executor and its router-visible capability profile.
    pub fn register_agent(&self, executor: Arc<dyn AgentExecutor>, capabilities: AgentCapabilities) -> super::Result<()> {
        let name = capabilities.name.clone();
        self.router.register_agent(capabilities)?;
        self.agents.insert(name.clone(), RegisteredAgent { executor });
        self.events.publish(Event::new(
            EventType::AgentRegistered,
            "engine",
            serde_json::json!({"agent_name": name}),
        ));
        Ok(())
    }

    pub fn unregister_agent(&self, name: &str) -> super::Result<()> {
        self.router.unregister_agent(name)?;
        self.agents.remove(name);
        self.events.publish(Event::new(
            EventType::AgentUnregistered,
            "engine",
            serde_json::json!({"agent_name": name}),
        ));
        Ok(())
    }

    /// Request cancellation of an in-flight workflow. Propagates to every
    /// in-flight step; after the configured grace period results are
    /// discarded and affected steps are marked `Cancelled`.
    pub fn cancel_workflow(&self, workflow_id: Uuid) {
        if let Some(token) = self.cancellations.get(&workflow_id) {
            token.cancel();
        }
    }

    /// Run `workflow` to a terminal state, resuming from any existing
    /// checkpoint first.
    pub async fn execute_workflow(&self, mut workflow: Workflow) -> super::Result<Workflow> {
        if self.config.checkpoints_enabled {
            if let Some(checkpoint) = Checkpoint::load(&self.config.checkpoint_dir, workflow.id).await? {
                checkpoint.apply_to(&mut workflow);
                info!(workflow_id = %workflow.id, "resumed from checkpoint");
            }
        }

        if let Err(e) = dag::check_dependencies_exist(&workflow) {
            return Ok(self.fail_validation(workflow, e.to_string()));
        }
        if let Err(e) = dag::check_cycles(&workflow.steps) {
            return Ok(self.fail_validation(workflow, e.to_string()));
        }

        workflow.status = WorkflowStatus::Running;
        workflow.started_at = Some(chrono::Utc::now());
        self.events.publish(Event::new(
            EventType::WorkflowStarted,
            "engine",
            serde_json::json!({"workflow_id": workflow.id.to_string()}),
        ));

        let token = CancellationToken::new();
        self.cancellations.insert(workflow.id, token.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_agents.max(1)));

        let outcome = self.run_waves(&mut workflow, &semaphore, &token).await;
        self.cancellations.remove(&workflow.id);

        workflow.completed_at = Some(chrono::Utc::now());
        match outcome {
            WaveOutcome::Completed => {
                workflow.status = WorkflowStatus::Completed;
                self.events.publish(Event::new(
                    EventType::WorkflowCompleted,
                    "engine",
                    serde_json::json!({"workflow_id": workflow.id.to_string()}),
                ));
            }
            WaveOutcome::Failed => {
                workflow.status = WorkflowStatus::Failed;
                self.events.publish(Event::new(
                    EventType::WorkflowFailed,
                    "engine",
                    serde_json::json!({"workflow_id": workflow.id.to_string()}),
                ));
            }
            WaveOutcome::Deadlock { blocked, cycles } => {
                workflow.status = WorkflowStatus::Failed;
                workflow.metadata.insert(
                    "deadlock".to_string(),
                    serde_json::json!({
                        "blocked": blocked.iter().map(Uuid::to_string).collect::<Vec<_>>(),
                        "cycles": cycles
                            .iter()
                            .map(|c| c.iter().map(Uuid::to_string).collect::<Vec<_>>())
                            .collect::<Vec<_>>(),
                    }),
                );
                self.events.publish(Event::new(
                    EventType::WorkflowFailed,
                    "engine",
                    serde_json::json!({"workflow_id": workflow.id.to_string(), "reason": "deadlock"}),
                ));
            }
            WaveOutcome::Cancelled => {
                workflow.status = WorkflowStatus::Cancelled;
            }
        }

        if self.config.checkpoints_enabled {
            Checkpoint::delete(&self.config.checkpoint_dir, workflow.id).await?;
        }

        Ok(workflow)
    }

    fn fail_validation(&self, mut workflow: Workflow, reason: String) -> Workflow {
        warn!(workflow_id = %workflow.id, reason = %reason, "workflow failed validation");
        workflow.status = WorkflowStatus::Failed;
        workflow
            .metadata
            .insert("validation_error".to_string(), serde_json::json!(reason));
        self.events.publish(Event::new(
            EventType::WorkflowFailed,
            "engine",
            serde_json::json!({"workflow_id": workflow.id.to_string(), "reason": "validation"}),
        ));
        workflow
    }

    async fn run_waves(
        &self,
        workflow: &mut Workflow,
        semaphore: &Arc<Semaphore>,
        token: &CancellationToken,
    ) -> WaveOutcome {
        loop {
            if token.is_cancelled() {
                for step in workflow.steps.iter_mut() {
                    if step.status == StepStatus::Running || step.status == StepStatus::Pending {
                        step.status = StepStatus::Cancelled;
                    }
                }
                return WaveOutcome::Cancelled;
            }

            if scheduler::all_completed(&workflow.steps) {
                return WaveOutcome::Completed;
            }
            if scheduler::any_failed(&workflow.steps) {
                return WaveOutcome::Failed;
            }

            let frontier = scheduler::runnable_frontier(&workflow.steps);
            if frontier.is_empty() {
                let blocked = scheduler::blocked_steps(&workflow.steps);
                let blocked_set = blocked.iter().copied().collect();
                let cycles = dag::check_cycles_in_subset(&workflow.steps, &blocked_set);
                return WaveOutcome::Deadlock { blocked, cycles };
            }

            let retried_attempts = self.dispatch_wave(workflow, &frontier, semaphore, token).await;

            if self.config.checkpoints_enabled {
                let checkpoint = Checkpoint::from_workflow(workflow);
                if let Err(e) = checkpoint.save(&self.config.checkpoint_dir).await {
                    // CheckpointIOError is logged but does not fail the step;
                    // the step already succeeded.
                    warn!(workflow_id = %workflow.id, error = %e, "checkpoint save failed");
                }
            }

            if let Some(max_attempt) = retried_attempts.into_iter().max() {
                tokio::time::sleep(self.config.retry_backoff.delay_for_attempt(max_attempt)).await;
            }
        }
    }

    async fn dispatch_wave(
        &self,
        workflow: &mut Workflow,
        frontier: &[Uuid],
        semaphore: &Arc<Semaphore>,
        token: &CancellationToken,
    ) -> Vec<u32> {
        let mut handles = Vec::with_capacity(frontier.len());

        for &step_id in frontier {
            let Some(step) = workflow.step_mut(step_id) else { continue };
            step.status = StepStatus::Running;
            step.started_at = Some(chrono::Utc::now());
            self.events.publish(Event::new(
                EventType::StepStarted,
                "engine",
                serde_json::json!({"step_id": step_id.to_string(), "name": step.name}),
            ));

            let router = Arc::clone(&self.router);
            let semaphore = Arc::clone(semaphore);
            let token = token.clone();
            let timeout = Duration::from_secs(step.timeout_seconds);
            let grace_period = self.config.cancellation_grace_period;
            let task = step.task.clone();

            let agents = &self.agents;
            let router_task = RouterTask {
                id: step_id.to_string(),
                description: task.description.clone(),
                task_type: task.task_type.clone(),
                priority: 5,
                required_capabilities: task.required_capabilities.clone(),
                complexity: None,
                estimated_duration: None,
                metadata: HashMap::new(),
            };

            let routing = router.route(&router_task);
            let executor = match &routing {
                Ok(decision) => agents.get(&decision.agent_name).map(|a| Arc::clone(&a.executor)),
                Err(_) => None,
            };

            let handle: DispatchHandle = match (routing, executor) {
                (Ok(decision), Some(executor)) => {
                    let _ = router.mark_dispatched(&decision.agent_name);
                    let agent_name = decision.agent_name.clone();
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await;
                        let exec_fut = executor.execute(&task);
                        tokio::pin!(exec_fut);

                        let outcome = tokio::select! {
                            _ = token.cancelled() => {
                                // Give the in-flight attempt a grace period to
                                // finish before discarding its result.
                                match tokio::time::timeout(grace_period, &mut exec_fut).await {
                                    Ok(outcome) => DispatchOutcome::Finished(outcome),
                                    Err(_) => DispatchOutcome::Cancelled,
                                }
                            }
                            result = tokio::time::timeout(timeout, &mut exec_fut) => {
                                match result {
                                    Ok(outcome) => DispatchOutcome::Finished(outcome),
                                    Err(_) => DispatchOutcome::TimedOut,
                                }
                            }
                        };
                        DispatchResult { step_id, agent_name: Some(agent_name), outcome }
                    })
                }
                (Err(RouterError::NoEligibleAgent(_)), _) | (_, None) => tokio::spawn(async move {
                    DispatchResult {
                        step_id,
                        agent_name: None,
                        outcome: DispatchOutcome::NoEligibleAgent,
                    }
                }),
                (Err(e), _) => tokio::spawn(async move {
                    DispatchResult {
                        step_id,
                        agent_name: None,
                        outcome: DispatchOutcome::Finished(ExecutionOutcome::failure(
                            e.to_string(),
                            Duration::ZERO,
                        )),
                    }
                }),
            };

            handles.push(handle);
        }

        let results = futures::future::join_all(handles).await;

        let mut retried_attempts = Vec::new();
        for joined in results {
            let Ok(result) = joined else { continue };
            if let Some(attempt) = self.apply_result(workflow, result) {
                retried_attempts.push(attempt);
            }
        }
        retried_attempts
    }

    /// Applies a dispatch result to its step. Returns `Some(retry_count)`
    /// when the step was sent back to `Pending` for another attempt.
    fn apply_result(&self, workflow: &mut Workflow, result: DispatchResult) -> Option<u32> {
        let DispatchResult {
            step_id,
            agent_name,
            outcome,
        } = result;
        let Some(step) = workflow.step_mut(step_id) else { return None };

        match outcome {
            DispatchOutcome::Cancelled => {
                step.status = StepStatus::Cancelled;
                None
            }
            DispatchOutcome::NoEligibleAgent => self.fail_or_retry(step, "no eligible agent".to_string(), false),
            DispatchOutcome::TimedOut => {
                if let Some(agent_name) = &agent_name {
                    let _ = self.router.record_task_completion(agent_name, &step_id.to_string(), false);
                }
                self.events.publish(Event::new(
                    EventType::StepTimeout,
                    "engine",
                    serde_json::json!({"step_id": step_id.to_string()}),
                ));
                // ExecutorTimeout counts as ExecutorFailure for retry accounting.
                self.fail_or_retry(step, "timeout".to_string(), false)
            }
            DispatchOutcome::Finished(outcome) => {
                if let Some(agent_name) = &agent_name {
                    let _ = self.router.record_task_completion(agent_name, &step_id.to_string(), outcome.success);
                }
                if outcome.success {
                    step.status = StepStatus::Completed;
                    step.completed_at = Some(chrono::Utc::now());
                    step.error = None;
                    step.result = Some(outcome);
                    self.events.publish(Event::new(
                        EventType::StepCompleted,
                        "engine",
                        serde_json::json!({"step_id": step_id.to_string(), "success": true}),
                    ));
                    None
                } else {
                    let permanent = outcome.permanent_failure;
                    let error = outcome.error.clone().unwrap_or_else(|| "unknown error".to_string());
                    step.result = Some(outcome);
                    self.fail_or_retry(step, error, permanent)
                }
            }
        }
    }

    /// Decides retry vs. terminal failure. Returns `Some(retry_count)` when
    /// the step was sent back to `Pending`.
    fn fail_or_retry(&self, step: &mut WorkflowStep, error: String, permanent: bool) -> Option<u32> {
        step.error = Some(error.clone());
        if !permanent && step.retry_count < step.max_retries {
            step.retry_count += 1;
            step.status = StepStatus::Pending;
            step.started_at = None;
            self.events.publish(Event::new(
                EventType::StepRetrying,
                "engine",
                serde_json::json!({"step_id": step.id.to_string(), "retry_count": step.retry_count, "error": error}),
            ));
            Some(step.retry_count)
        } else {
            step.status = StepStatus::Failed;
            step.completed_at = Some(chrono::Utc::now());
            self.events.publish(Event::new(
                EventType::StepCompleted,
                "engine",
                serde_json::json!({"step_id": step.id.to_string(), "success": false, "error": error}),
            ));
            None
        }
    }
}

enum WaveOutcome {
    Completed,
    Failed,
    Deadlock { blocked: Vec<Uuid>, cycles: Vec<Vec<Uuid>> },
    Cancelled,
}

enum DispatchOutcome {
    Finished(ExecutionOutcome),
    Cancelled,
    NoEligibleAgent,
    TimedOut,
}

struct DispatchResult {
    step_id: Uuid,
    agent_name: Option<String>,
    outcome: DispatchOutcome,
}

type DispatchHandle = tokio::task::JoinHandle<DispatchResult>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionOutcome as Outcome, ExecutorMetadata, ExecutorTask};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysSucceeds {
        name: String,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl AgentExecutor for AlwaysSucceeds {
        async fn execute(&self, _task: &ExecutorTask) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Outcome::success(serde_json::json!({}), Duration::from_millis(1))
        }
        fn metadata(&self) -> ExecutorMetadata {
            ExecutorMetadata {
                name: self.name.clone(),
                capabilities: HashSet::from(["dev".to_string()]),
                max_concurrent: 4,
            }
        }
    }

    struct FailsNTimes {
        remaining_failures: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl AgentExecutor for FailsNTimes {
        async fn execute(&self, _task: &ExecutorTask) -> Outcome {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                Outcome::failure("transient", Duration::from_millis(1))
            } else {
                Outcome::success(serde_json::json!({}), Duration::from_millis(1))
            }
        }
        fn metadata(&self) -> ExecutorMetadata {
            ExecutorMetadata {
                name: "flaky".to_string(),
                capabilities: HashSet::from(["dev".to_string()]),
                max_concurrent: 4,
            }
        }
    }

    fn task(caps: &[&str]) -> ExecutorTask {
        ExecutorTask {
            description: "do it".to_string(),
            task_type: "development".to_string(),
            context: serde_json::Value::Null,
            required_capabilities: caps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn engine_with_tempdir() -> (WorkflowEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkflowEngineConfig {
            max_concurrent_agents: 2,
            checkpoint_dir: dir.path().to_path_buf(),
            checkpoints_enabled: true,
            cancellation_grace_period: Duration::from_secs(5),
            retry_backoff: RetryBackoffConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
                add_jitter: false,
            },
        };
        (WorkflowEngine::new(config), dir)
    }

    #[tokio::test]
    async fn linear_dag_happy_path_completes() {
        let (engine, _dir) = engine_with_tempdir();
        let calls = Arc::new(AtomicU32::new(0));
        engine
            .register_agent(
                Arc::new(AlwaysSucceeds { name: "dev".to_string(), calls: calls.clone() }),
                AgentCapabilities::new("dev", crate::router::AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
            )
            .unwrap();

        let steps = vec![
            ("a".to_string(), "dev".to_string(), task(&["dev"])),
            ("b".to_string(), "dev".to_string(), task(&["dev"])),
            ("c".to_string(), "dev".to_string(), task(&["dev"])),
        ];
        let workflow = Workflow::sequential("seq", steps);
        let result = engine.execute_workflow(workflow).await.unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(Checkpoint::load(&engine.config.checkpoint_dir, result.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cycle_fails_validation_without_running_steps() {
        let (engine, _dir) = engine_with_tempdir();
        let mut a = WorkflowStep::new("a", "dev", task(&["dev"]));
        let mut b = WorkflowStep::new("b", "dev", task(&["dev"]));
        a.depends_on.push(b.id);
        b.depends_on.push(a.id);
        let workflow = Workflow::new("cyclic", "d", vec![a, b]);

        let result = engine.execute_workflow(workflow).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[tokio::test]
    async fn retry_then_succeed_reaches_completed() {
        let (engine, _dir) = engine_with_tempdir();
        engine
            .register_agent(
                Arc::new(FailsNTimes { remaining_failures: std::sync::atomic::AtomicU32::new(2) }),
                AgentCapabilities::new("flaky", crate::router::AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
            )
            .unwrap();

        let mut step = WorkflowStep::new("a", "flaky", task(&["dev"])).with_max_retries(3);
        step.max_retries = 3;
        let workflow = Workflow::new("retry", "d", vec![step]);
        let result = engine.execute_workflow(workflow).await.unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.steps[0].retry_count, 2);
    }

    #[tokio::test]
    async fn no_eligible_agent_fails_step_without_retry_budget() {
        let (engine, _dir) = engine_with_tempdir();
        let step = WorkflowStep::new("a", "ghost", task(&["nonexistent"]));
        let workflow = Workflow::new("w", "d", vec![step]);
        let result = engine.execute_workflow(workflow).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Failed);
    }

    struct NeverFinishes;

    #[async_trait]
    impl AgentExecutor for NeverFinishes {
        async fn execute(&self, _task: &ExecutorTask) -> Outcome {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("timeout should have fired first")
        }
        fn metadata(&self) -> ExecutorMetadata {
            ExecutorMetadata {
                name: "slow".to_string(),
                capabilities: HashSet::from(["dev".to_string()]),
                max_concurrent: 4,
            }
        }
    }

    #[tokio::test]
    async fn timeout_publishes_step_timeout_event_and_retries() {
        let (engine, _dir) = engine_with_tempdir();
        engine
            .register_agent(
                Arc::new(NeverFinishes),
                AgentCapabilities::new("slow", crate::router::AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
            )
            .unwrap();

        let mut subscriber = engine.event_bus().subscribe();
        let mut step = WorkflowStep::new("a", "slow", task(&["dev"])).with_max_retries(0);
        step.timeout_seconds = 0;
        let workflow = Workflow::new("w", "d", vec![step]);

        let result = engine.execute_workflow(workflow).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.steps[0].error.as_deref(), Some("timeout"));

        let mut saw_timeout_event = false;
        while let Ok(event) = subscriber.try_recv() {
            if event.event_type == crate::events::EventType::StepTimeout {
                saw_timeout_event = true;
            }
        }
        assert!(saw_timeout_event);
    }

    struct FinishesAfter {
        delay: Duration,
    }

    #[async_trait]
    impl AgentExecutor for FinishesAfter {
        async fn execute(&self, _task: &ExecutorTask) -> Outcome {
            tokio::time::sleep(self.delay).await;
            Outcome::success(serde_json::json!({}), self.delay)
        }
        fn metadata(&self) -> ExecutorMetadata {
            ExecutorMetadata {
                name: "tortoise".to_string(),
                capabilities: HashSet::from(["dev".to_string()]),
                max_concurrent: 4,
            }
        }
    }

    fn engine_with_grace_period(grace_period: Duration) -> (Arc<WorkflowEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkflowEngineConfig {
            max_concurrent_agents: 2,
            checkpoint_dir: dir.path().to_path_buf(),
            checkpoints_enabled: true,
            cancellation_grace_period: grace_period,
            retry_backoff: RetryBackoffConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
                add_jitter: false,
            },
        };
        (Arc::new(WorkflowEngine::new(config)), dir)
    }

    #[tokio::test]
    async fn cancellation_within_grace_period_keeps_the_result() {
        let (engine, _dir) = engine_with_grace_period(Duration::from_millis(200));
        engine
            .register_agent(
                Arc::new(FinishesAfter { delay: Duration::from_millis(20) }),
                AgentCapabilities::new("tortoise", crate::router::AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
            )
            .unwrap();

        let step = WorkflowStep::new("a", "tortoise", task(&["dev"]));
        let workflow = Workflow::new("w", "d", vec![step]);
        let workflow_id = workflow.id;

        let engine_for_run = Arc::clone(&engine);
        let handle = tokio::spawn(async move { engine_for_run.execute_workflow(workflow).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        engine.cancel_workflow(workflow_id);

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.status, WorkflowStatus::Cancelled);
        assert_eq!(result.steps[0].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_past_grace_period_discards_the_result() {
        let (engine, _dir) = engine_with_grace_period(Duration::from_millis(5));
        engine
            .register_agent(
                Arc::new(FinishesAfter { delay: Duration::from_secs(3600) }),
                AgentCapabilities::new("tortoise", crate::router::AgentType::Specialist, HashSet::from(["dev".to_string()]), 5),
            )
            .unwrap();

        let step = WorkflowStep::new("a", "tortoise", task(&["dev"]));
        let workflow = Workflow::new("w", "d", vec![step]);
        let workflow_id = workflow.id;

        let engine_for_run = Arc::clone(&engine);
        let handle = tokio::spawn(async move { engine_for_run.execute_workflow(workflow).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        engine.cancel_workflow(workflow_id);

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.status, WorkflowStatus::Cancelled);
        assert_eq!(result.steps[0].status, StepStatus::Cancelled);
    }

    #[test]
    fn retry_backoff_grows_with_attempt_and_respects_cap() {
        let config = RetryBackoffConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            add_jitter: false,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(1));
    }
}
