//! Three-Tier Memory (L1).
//!
//! A bounded working buffer (Tier 1), a bounded summary tier (Tier 2), and
//! an unbounded append-only persistent log (Tier 3), plus automatic
//! consolidation and hybrid retrieval. Grounded across
//! `cortex-memory::working`, `boternity-infra::sqlite::{message, pool}`, and
//! the Python `original_source/` memory modules (see module-level docs on
//! each submodule for specifics).

mod consolidation;
mod importance;
mod message;
mod persistent;
mod retrieval;
mod summary;
mod working;

pub use consolidation::{ConsolidationConfig, ConsolidationReport, ConsolidationStatus, HeuristicSummarizer, Summarizer};
pub use importance::{HeuristicImportanceScorer, ImportanceScorer};
pub use message::{Message, Role};
pub use persistent::{PersistentMemory, PersistentMemoryError};
pub use retrieval::RetrievalStrategy;
pub use summary::{ConsolidatedSummary, SummaryTier};
pub use working::WorkingMemory;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("persistent memory error: {0}")]
    Persistent(#[from] PersistentMemoryError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub max_working_messages: usize,
    pub max_summaries: usize,
    pub min_importance: f64,
    pub recent_keep: usize,
    pub max_messages_before_consolidation: usize,
    pub auto_consolidate: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_working_messages: 100,
            max_summaries: 10,
            min_importance: 0.7,
            recent_keep: 10,
            max_messages_before_consolidation: 100,
            auto_consolidate: true,
        }
    }
}

/// Facade over the three tiers, matching
/// `original_source`'s `ProductionMemorySystem` entrypoint surface:
/// `add`, `get_context`, `get_messages`, `search`, `clear_working`, `get_stats`.
pub struct MemoryStore {
    working: WorkingMemory,
    summaries: SummaryTier,
    persistent: Option<PersistentMemory>,
    consolidator: consolidation::Consolidator,
    summarizer: Arc<dyn Summarizer>,
    scorer: Arc<dyn ImportanceScorer>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig, persistent: Option<PersistentMemory>) -> Self {
        let consolidation_config = ConsolidationConfig {
            max_messages: config.max_messages_before_consolidation,
            recent_keep: config.recent_keep,
            min_importance: config.min_importance,
            auto_consolidate: config.auto_consolidate,
            ..ConsolidationConfig::default()
        };

        Self {
            working: WorkingMemory::new(config.max_working_messages),
            summaries: SummaryTier::new(config.max_summaries),
            persistent,
            consolidator: consolidation::Consolidator::new(consolidation_config),
            summarizer: Arc::new(HeuristicSummarizer),
            scorer: Arc::new(HeuristicImportanceScorer),
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ImportanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Append to working memory and, if configured, the persistent log.
    /// Linearizable: a concurrent reader either observes the full message or
    /// none of it.
    pub async fn add(&self, message: Message) -> Result<()> {
        self.working.add(message.clone());
        if let Some(persistent) = &self.persistent {
            persistent.store(&message).await?;
        }

        if self.consolidator.should_consolidate(self.working.len()) {
            self.consolidate().await;
        }
        Ok(())
    }

    /// Run consolidation now regardless of trigger state. Idempotent over
    /// an unchanged working memory.
    pub async fn consolidate(&self) -> ConsolidationReport {
        let snapshot = self.working.get_messages();
        let (report, rebuilt, summary) = self
            .consolidator
            .consolidate(snapshot, self.summarizer.as_ref(), self.scorer.as_ref())
            .await;

        if report.status == ConsolidationStatus::Success {
            self.working.replace_all(rebuilt);
            if let Some(summary) = summary {
                self.summaries.add_summary(summary);
            }
            debug!(consolidated = report.consolidated_count, preserved = report.preserved_count, "consolidated working memory");
        }
        report
    }

    /// Ranked retrieval over working memory (Tier 1 by default). Consults
    /// the persistent log only when `include_persistent` is set, deduplicated
    /// against working memory by message hash.
    pub async fn get_context(
        &self,
        query: Option<&str>,
        strategy: RetrievalStrategy,
        limit: usize,
        min_importance: f64,
        include_persistent: bool,
    ) -> Result<Vec<Message>> {
        let mut pool = self.working.get_messages();

        if include_persistent {
            if let Some(persistent) = &self.persistent {
                let seen: std::collections::HashSet<String> = pool.iter().map(Message::hash).collect();
                let recent = persistent.get_recent(500).await?;
                for message in recent {
                    if !seen.contains(&message.hash()) {
                        pool.push(message);
                    }
                }
            }
        }

        Ok(retrieval::retrieve(&pool, query, strategy, limit, min_importance, self.scorer.as_ref()))
    }

    pub fn get_messages(&self) -> Vec<Message> {
        self.working.get_messages()
    }

    pub async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<Message>> {
        match &self.persistent {
            Some(persistent) => Ok(persistent.search(keyword, limit).await?),
            None => {
                let keyword_lower = keyword.to_lowercase();
                Ok(self
                    .working
                    .get_messages()
                    .into_iter()
                    .filter(|m| m.content.to_lowercase().contains(&keyword_lower))
                    .take(limit.max(0) as usize)
                    .collect())
            }
        }
    }

    pub fn clear_working(&self) {
        self.working.clear();
    }

    /// `=== IMMEDIATE CONTEXT ===` (working memory) followed by
    /// `=== MID-TERM CONTEXT ===` (Tier 2 summaries, most recent first).
    pub fn get_three_tier_context(&self, summary_limit: usize) -> String {
        let immediate = self
            .working
            .get_messages()
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let mid_term = self.summaries.get_context_string(summary_limit);

        format!("=== IMMEDIATE CONTEXT ===\n{immediate}\n\n=== MID-TERM CONTEXT ===\n{mid_term}")
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working
    }

    pub fn summary_tier(&self) -> &SummaryTier {
        &self.summaries
    }

    pub fn persistent_memory(&self) -> Option<&PersistentMemory> {
        self.persistent.as_ref()
    }
}
