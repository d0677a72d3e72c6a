//! Dependency-graph validation: dangling references and cycle detection.
//!
//! Grounded in `axon::orchestration::dag::DagValidator`'s DFS-with-color-sets
//! approach (`visited` + `rec_stack`), generalized to also report the full
//! cycle path (needed for `WorkflowDeadlock`'s residual-subgraph report).

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use super::{Workflow, WorkflowStep};

#[derive(Debug, Error)]
pub enum DagError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    DanglingDependency { step: Uuid, dependency: Uuid },
    #[error("cycle detected: {0:?}")]
    Cycle(Vec<Uuid>),
}

/// Validate that every dependency resolves within the same workflow.
pub fn check_dependencies_exist(workflow: &Workflow) -> Result<(), DagError> {
    let ids: HashSet<Uuid> = workflow.steps.iter().map(|s| s.id).collect();
    for step in &workflow.steps {
        for dep in &step.depends_on {
            if !ids.contains(dep) {
                return Err(DagError::DanglingDependency {
                    step: step.id,
                    dependency: *dep,
                });
            }
        }
    }
    Ok(())
}

/// DFS three-color cycle detection over the full step set.
pub fn check_cycles(steps: &[WorkflowStep]) -> Result<(), DagError> {
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut rec_stack: HashSet<Uuid> = HashSet::new();
    let by_id: HashMap<Uuid, &WorkflowStep> = steps.iter().map(|s| (s.id, s)).collect();

    for step in steps {
        if !visited.contains(&step.id) {
            let mut path = Vec::new();
            if let Some(cycle) = visit(step.id, &by_id, &mut visited, &mut rec_stack, &mut path) {
                return Err(DagError::Cycle(cycle));
            }
        }
    }
    Ok(())
}

fn visit(
    id: Uuid,
    by_id: &HashMap<Uuid, &WorkflowStep>,
    visited: &mut HashSet<Uuid>,
    rec_stack: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> Option<Vec<Uuid>> {
    visited.insert(id);
    rec_stack.insert(id);
    path.push(id);

    if let Some(step) = by_id.get(&id) {
        for &dep in &step.depends_on {
            if rec_stack.contains(&dep) {
                let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            if !visited.contains(&dep) {
                if let Some(cycle) = visit(dep, by_id, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    rec_stack.remove(&id);
    None
}

/// Re-run cycle detection restricted to the still-blocked subgraph, used by
/// the progress detector's stall report.
pub fn check_cycles_in_subset(steps: &[WorkflowStep], subset: &HashSet<Uuid>) -> Vec<Vec<Uuid>> {
    let filtered: Vec<WorkflowStep> = steps.iter().filter(|s| subset.contains(&s.id)).cloned().collect();
    match check_cycles(&filtered) {
        Ok(()) => Vec::new(),
        Err(DagError::Cycle(cycle)) => vec![cycle],
        Err(_) => Vec::new(),
    }
}
