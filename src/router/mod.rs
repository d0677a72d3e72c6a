//! Task Router (L3).
//!
//! Capability-aware, load-aware dispatch of tasks to registered executors,
//! with an exponentially smoothed success-rate per agent. Generalized from
//! `axon::orchestration::worker_registry`'s capability index and
//! lowest-load selection, replacing its closed capability enum with the
//! spec's case-insensitive string sets and its binary-acceptable filter
//! with a weighted score.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("agent '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),
    #[error("no eligible agent for task '{0}'")]
    NoEligibleAgent(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;

/// Closed agent roles, mirroring `axon::agents::types::AgentType`'s shape
/// but reduced to the four kinds the router scoring actually discriminates
/// on as equals (the scorer never treats role as a signal; it is carried
/// for callers and future extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentType {
    Specialist,
    Generalist,
    Orchestrator,
    Any,
}

/// The router's view of a registered executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub name: String,
    pub agent_type: AgentType,
    /// Case-insensitive; normalized to lowercase at registration.
    pub capabilities: HashSet<String>,
    pub current_tasks: u32,
    pub max_tasks: u32,
    pub avg_task_time: f64,
    pub success_rate: f64,
}

impl AgentCapabilities {
    pub fn new(name: impl Into<String>, agent_type: AgentType, capabilities: HashSet<String>, max_tasks: u32) -> Self {
        Self {
            name: name.into(),
            agent_type,
            capabilities: capabilities.into_iter().map(|c| c.to_lowercase()).collect(),
            current_tasks: 0,
            max_tasks,
            avg_task_time: 0.0,
            success_rate: 1.0,
        }
    }

    pub fn available(&self) -> bool {
        self.current_tasks < self.max_tasks
    }

    pub fn utilization(&self) -> f64 {
        if self.max_tasks == 0 {
            1.0
        } else {
            self.current_tasks as f64 / self.max_tasks as f64
        }
    }
}

/// The router's view of a task to be routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub task_type: String,
    pub priority: u8,
    pub required_capabilities: HashSet<String>,
    pub complexity: Option<String>,
    pub estimated_duration: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Outcome of `route`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub agent_name: String,
    pub confidence: f64,
    pub reasoning: String,
    pub alternative_agents: Vec<String>,
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    name: String,
    score: f64,
    full_match: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RouterStatistics {
    pub total_agents: usize,
    pub available_agents: usize,
    pub average_success_rate: f64,
}

/// Smoothing factor for the success-rate EWMA.
const SUCCESS_RATE_ALPHA: f64 = 0.2;

/// Capability-aware, load-aware dispatcher.
///
/// A single lock guards the agent table, held only for the duration of a
/// candidate lookup or capability update, matching the teacher's
/// `worker_registry` concurrency policy.
pub struct TaskRouter {
    agents: RwLock<HashMap<String, AgentCapabilities>>,
}

impl TaskRouter {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_agent(&self, agent: AgentCapabilities) -> Result<()> {
        let mut agents = self.agents.write();
        if agents.contains_key(&agent.name) {
            return Err(RouterError::AlreadyRegistered(agent.name));
        }
        debug!(agent = %agent.name, "registering agent");
        agents.insert(agent.name.clone(), agent);
        Ok(())
    }

    pub fn unregister_agent(&self, name: &str) -> Result<()> {
        let mut agents = self.agents.write();
        agents
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RouterError::UnknownAgent(name.to_string()))
    }

    /// Select the best-matching agent for `task`.
    pub fn route(&self, task: &Task) -> Result<RoutingDecision> {
        let agents = self.agents.read();
        let mut candidates = self.score_candidates(&agents, task);
        candidates.sort_by(|a, b| {
            // Full-subset matches always outrank partial matches, regardless
            // of score; score (then name) only breaks ties within a tier.
            b.full_match
                .cmp(&a.full_match)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.name.cmp(&b.name))
        });

        let Some(best) = candidates.first().cloned() else {
            warn!(task_id = %task.id, "no eligible agent found");
            return Err(RouterError::NoEligibleAgent(task.id.clone()));
        };

        let alternative_agents = candidates
            .iter()
            .skip(1)
            .take(3)
            .map(|c| c.name.clone())
            .collect();

        let confidence = (best.score / 100.0).min(1.0);
        let reasoning = if best.full_match {
            format!("{} satisfies all required capabilities with score {:.1}", best.name, best.score)
        } else {
            format!("{} is the best partial match with score {:.1}", best.name, best.score)
        };

        Ok(RoutingDecision {
            agent_name: best.name,
            confidence,
            reasoning,
            alternative_agents,
        })
    }

    fn score_candidates(&self, agents: &HashMap<String, AgentCapabilities>, task: &Task) -> Vec<ScoredCandidate> {
        let required: HashSet<String> = task.required_capabilities.iter().map(|c| c.to_lowercase()).collect();

        agents
            .values()
            .filter(|a| a.available())
            .filter_map(|agent| {
                if required.is_empty() {
                    return Some((agent, 0usize, true, true));
                }
                let matched = required.intersection(&agent.capabilities).count();
                let full_match = required.is_subset(&agent.capabilities);
                if matched == 0 {
                    None
                } else {
                    Some((agent, matched, full_match, false))
                }
            })
            .map(|(agent, matched, full_match, no_caps_required)| {
                let utilization = agent.utilization();
                let capability_score = if no_caps_required {
                    20.0
                } else {
                    40.0 * matched as f64 / required.len() as f64
                };
                let availability_score = 30.0 * (1.0 - utilization);
                let success_score = 20.0 * agent.success_rate;
                let load_slack_score = 10.0 * (1.0 - utilization);
                let score = capability_score + availability_score + success_score + load_slack_score;
                ScoredCandidate {
                    name: agent.name.clone(),
                    score,
                    full_match,
                }
            })
            .collect()
    }

    /// Update an agent's EWMA success rate and release its task slot.
    pub fn record_task_completion(&self, agent_name: &str, _task_id: &str, success: bool) -> Result<()> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(agent_name)
            .ok_or_else(|| RouterError::UnknownAgent(agent_name.to_string()))?;

        let outcome = if success { 1.0 } else { 0.0 };
        agent.success_rate = SUCCESS_RATE_ALPHA * outcome + (1.0 - SUCCESS_RATE_ALPHA) * agent.success_rate;
        agent.current_tasks = agent.current_tasks.saturating_sub(1);
        Ok(())
    }

    /// Mark an agent as having picked up a task (increments `current_tasks`).
    pub fn mark_dispatched(&self, agent_name: &str) -> Result<()> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(agent_name)
            .ok_or_else(|| RouterError::UnknownAgent(agent_name.to_string()))?;
        agent.current_tasks += 1;
        Ok(())
    }

    pub fn get_statistics(&self) -> RouterStatistics {
        let agents = self.agents.read();
        let total_agents = agents.len();
        let available_agents = agents.values().filter(|a| a.available()).count();
        let average_success_rate = if total_agents == 0 {
            0.0
        } else {
            agents.values().map(|a| a.success_rate).sum::<f64>() / total_agents as f64
        };
        RouterStatistics {
            total_agents,
            available_agents,
            average_success_rate,
        }
    }
}

impl Default for TaskRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn task(required: &[&str]) -> Task {
        Task {
            id: "t1".to_string(),
            description: "do thing".to_string(),
            task_type: "development".to_string(),
            priority: 5,
            required_capabilities: caps(required),
            complexity: None,
            estimated_duration: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn routes_to_full_capability_match_over_partial() {
        let router = TaskRouter::new();
        router
            .register_agent(AgentCapabilities::new("partial", AgentType::Specialist, caps(&["rust"]), 5))
            .unwrap();
        router
            .register_agent(AgentCapabilities::new(
                "full",
                AgentType::Specialist,
                caps(&["rust", "testing"]),
                5,
            ))
            .unwrap();

        let decision = router.route(&task(&["rust", "testing"])).unwrap();
        assert_eq!(decision.agent_name, "full");
    }

    #[test]
    fn unavailable_agents_are_excluded() {
        let router = TaskRouter::new();
        let mut agent = AgentCapabilities::new("busy", AgentType::Specialist, caps(&["rust"]), 1);
        agent.current_tasks = 1;
        router.register_agent(agent).unwrap();

        let err = router.route(&task(&["rust"])).unwrap_err();
        assert!(matches!(err, RouterError::NoEligibleAgent(_)));
    }

    #[test]
    fn no_capabilities_required_matches_any_available_agent() {
        let router = TaskRouter::new();
        router
            .register_agent(AgentCapabilities::new("generalist", AgentType::Generalist, caps(&[]), 3))
            .unwrap();

        let decision = router.route(&task(&[])).unwrap();
        assert_eq!(decision.agent_name, "generalist");
    }

    #[test]
    fn success_rate_updates_with_ewma() {
        let router = TaskRouter::new();
        router
            .register_agent(AgentCapabilities::new("a", AgentType::Specialist, caps(&["rust"]), 5))
            .unwrap();

        router.record_task_completion("a", "t1", true).unwrap();
        let stats = router.get_statistics();
        assert!((stats.average_success_rate - 1.0).abs() < 1e-9);

        router.record_task_completion("a", "t2", false).unwrap();
        let stats = router.get_statistics();
        // 0.2*0 + 0.8*1.0 = 0.8
        assert!((stats.average_success_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn tie_break_is_lexicographic_on_agent_name() {
        let router = TaskRouter::new();
        router
            .register_agent(AgentCapabilities::new("zeta", AgentType::Specialist, caps(&["rust"]), 5))
            .unwrap();
        router
            .register_agent(AgentCapabilities::new("alpha", AgentType::Specialist, caps(&["rust"]), 5))
            .unwrap();

        let decision = router.route(&task(&["rust"])).unwrap();
        assert_eq!(decision.agent_name, "alpha");
    }

    #[test]
    fn full_match_outranks_higher_scoring_partial_match() {
        let router = TaskRouter::new();
        // Partial match, idle: high availability/load-slack score.
        let mut partial = AgentCapabilities::new("partial", AgentType::Specialist, caps(&["rust"]), 10);
        partial.current_tasks = 0;
        router.register_agent(partial).unwrap();

        // Full match, heavily loaded: low availability/load-slack score.
        let mut full = AgentCapabilities::new("full", AgentType::Specialist, caps(&["rust", "testing"]), 10);
        full.current_tasks = 9;
        router.register_agent(full).unwrap();

        let decision = router.route(&task(&["rust", "testing"])).unwrap();
        assert_eq!(decision.agent_name, "full");
    }

    #[test]
    fn unregister_unknown_agent_errors() {
        let router = TaskRouter::new();
        assert!(matches!(router.unregister_agent("ghost"), Err(RouterError::UnknownAgent(_))));
    }
}
