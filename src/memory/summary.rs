//! Tier 2 — Summary Tier: a fixed-capacity ring of `ConsolidatedSummary`.
//!
//! Grounded in `original_source/runtime/memory/systems/SummaryTier.py`'s
//! `ConsolidatedSummary` dataclass and its `find_relevant_summaries` scoring
//! (+1.0 per query hit in the summary body, +0.5 per hit in flattened
//! metadata), combined with `cortex-memory::working::WorkingMemorySystem`'s
//! ring-buffer/lock idiom for the Rust shape.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A compressed stand-in for a range of consolidated messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedSummary {
    pub summary: String,
    pub consolidated_count: usize,
    pub oldest_timestamp: DateTime<Utc>,
    pub newest_timestamp: DateTime<Utc>,
    pub consolidated_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Bounded ring of `ConsolidatedSummary`, default capacity 10.
pub struct SummaryTier {
    capacity: usize,
    summaries: RwLock<VecDeque<ConsolidatedSummary>>,
}

impl SummaryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            summaries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn add_summary(&self, summary: ConsolidatedSummary) {
        let mut summaries = self.summaries.write();
        if summaries.len() >= self.capacity {
            summaries.pop_front();
        }
        summaries.push_back(summary);
    }

    /// Most recent `limit` summaries, newest first, optionally restricted to
    /// those consolidated after `after_timestamp`.
    pub fn get_summaries(&self, limit: usize, after_timestamp: Option<DateTime<Utc>>) -> Vec<ConsolidatedSummary> {
        let summaries = self.summaries.read();
        summaries
            .iter()
            .rev()
            .filter(|s| match after_timestamp {
                Some(after) => s.consolidated_at > after,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_latest_summary(&self) -> Option<ConsolidatedSummary> {
        self.summaries.read().back().cloned()
    }

    /// Formats as `=== MID-TERM CONTEXT ===`-ready text, most recent first.
    pub fn get_context_string(&self, limit: usize) -> String {
        self.get_summaries(limit, None)
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "[CONSOLIDATED SUMMARY {}] ({} messages from {} to {})\n{}",
                    i + 1,
                    s.consolidated_count,
                    s.oldest_timestamp.to_rfc3339(),
                    s.newest_timestamp.to_rfc3339(),
                    s.summary
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Keyword relevance: +1.0 per hit in the summary body, +0.5 per hit in
    /// flattened metadata, ranked descending, top `limit` returned.
    pub fn find_relevant_summaries(&self, query: &str, limit: usize) -> Vec<ConsolidatedSummary> {
        let query_lower = query.to_lowercase();
        let summaries = self.summaries.read();

        let mut scored: Vec<(f64, ConsolidatedSummary)> = summaries
            .iter()
            .filter_map(|s| {
                let mut score = 0.0;
                if s.summary.to_lowercase().contains(&query_lower) {
                    score += 1.0;
                }
                let metadata_text = format!("{:?}", s.metadata).to_lowercase();
                if metadata_text.contains(&query_lower) {
                    score += 0.5;
                }
                if score > 0.0 {
                    Some((score, s.clone()))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(limit).map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.summaries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SummaryStats {
        let summaries = self.summaries.read();
        SummaryStats {
            size: summaries.len(),
            capacity: self.capacity,
            utilization: summaries.len() as f64 / self.capacity as f64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SummaryStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization: f64,
}
