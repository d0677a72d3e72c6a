//! Wave-based scheduling: runnable-frontier computation and stall detection.
//!
//! Grounded in `axon::orchestration::scheduler::TaskScheduler`'s topological
//! staging (in-degree map + queue) generalized from a single upfront sort
//! into an incremental frontier recomputed each wave, matching
//! `parallel_tool_executor::DependencyGraph::topological_sort`'s per-stage
//! shape but driven by live step status rather than a static graph.

use std::collections::HashSet;

use uuid::Uuid;

use super::{StepStatus, WorkflowStep};

/// Steps blocked by unmet dependencies plus any cycles found in the
/// residual subgraph, reported when the progress detector fires.
#[derive(Debug, Clone)]
pub struct StallReport {
    pub blocked: Vec<Uuid>,
    pub cycles: Vec<Vec<Uuid>>,
}

/// Steps whose status is `Pending` and whose every dependency is `Completed`.
pub fn runnable_frontier(steps: &[WorkflowStep]) -> Vec<Uuid> {
    let completed: HashSet<Uuid> = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .map(|s| s.id)
        .collect();

    steps
        .iter()
        .filter(|s| s.status == StepStatus::Pending)
        .filter(|s| s.depends_on.iter().all(|d| completed.contains(d)))
        .map(|s| s.id)
        .collect()
}

/// True once every step has reached a terminal state (`Completed` or `Failed`).
pub fn all_terminal(steps: &[WorkflowStep]) -> bool {
    steps
        .iter()
        .all(|s| matches!(s.status, StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled))
}

pub fn all_completed(steps: &[WorkflowStep]) -> bool {
    steps.iter().all(|s| s.status == StepStatus::Completed)
}

pub fn any_failed(steps: &[WorkflowStep]) -> bool {
    steps.iter().any(|s| s.status == StepStatus::Failed)
}

pub fn any_running(steps: &[WorkflowStep]) -> bool {
    steps.iter().any(|s| s.status == StepStatus::Running)
}

/// Steps with at least one unmet dependency, for the stall report.
pub fn blocked_steps(steps: &[WorkflowStep]) -> Vec<Uuid> {
    let completed: HashSet<Uuid> = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .map(|s| s.id)
        .collect();

    steps
        .iter()
        .filter(|s| s.status == StepStatus::Pending)
        .filter(|s| !s.depends_on.iter().all(|d| completed.contains(d)))
        .map(|s| s.id)
        .collect()
}
