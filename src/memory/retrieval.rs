//! Hybrid retrieval: recency + semantic + importance scoring.
//!
//! Grounded in `original_source/runtime/memory/systems/EnhancedProductionMemorySystem.py`'s
//! documented weighting ("recent 50% + semantic 30% + importance 20%") and
//! `cortex::context::attention_retriever`'s score-and-rank shape.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::importance::ImportanceScorer;
use super::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalStrategy {
    Recent,
    Semantic,
    Hybrid,
    Importance,
}

const SEMANTIC_DROP_THRESHOLD: f64 = 0.1;
const RECENCY_WEIGHT: f64 = 0.5;
const SEMANTIC_WEIGHT: f64 = 0.3;
const IMPORTANCE_WEIGHT: f64 = 0.2;

fn recency_score(message: &Message) -> f64 {
    let hours_ago = message.hours_ago(Utc::now()).max(0.0);
    1.0 / (1.0 + hours_ago)
}

/// Fallback semantic score: fraction of query words present in the message
/// content, case-insensitive.
fn keyword_ratio_score(message: &Message, query: &str) -> f64 {
    let query_words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let content_lower = message.content.to_lowercase();
    let matches = query_words.iter().filter(|w| content_lower.contains(w.as_str())).count();
    matches as f64 / query_words.len() as f64
}

/// Score and rank `messages` according to `strategy`, returning at most
/// `limit` results. `min_importance` is applied as a pre-filter before any
/// scoring.
pub fn retrieve(
    messages: &[Message],
    query: Option<&str>,
    strategy: RetrievalStrategy,
    limit: usize,
    min_importance: f64,
    scorer: &dyn ImportanceScorer,
) -> Vec<Message> {
    let eligible: Vec<&Message> = messages
        .iter()
        .filter(|m| scorer.score(m) >= min_importance)
        .collect();

    match strategy {
        RetrievalStrategy::Recent => {
            let start = eligible.len().saturating_sub(limit);
            eligible[start..].iter().map(|m| (*m).clone()).collect()
        }
        RetrievalStrategy::Semantic => {
            let query = query.unwrap_or("");
            let mut scored: Vec<(f64, &Message)> = eligible
                .into_iter()
                .map(|m| (keyword_ratio_score(m, query), m))
                .filter(|(score, _)| *score >= SEMANTIC_DROP_THRESHOLD)
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.into_iter().take(limit).map(|(_, m)| m.clone()).collect()
        }
        RetrievalStrategy::Importance => {
            let mut scored: Vec<(f64, &Message)> = eligible.into_iter().map(|m| (scorer.score(m), m)).collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.into_iter().take(limit).map(|(_, m)| m.clone()).collect()
        }
        RetrievalStrategy::Hybrid => {
            let query = query.unwrap_or("");
            let mut scored: Vec<(f64, &Message)> = eligible
                .into_iter()
                .map(|m| {
                    let score = RECENCY_WEIGHT * recency_score(m)
                        + SEMANTIC_WEIGHT * keyword_ratio_score(m, query)
                        + IMPORTANCE_WEIGHT * scorer.score(m);
                    (score, m)
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.into_iter().take(limit).map(|(_, m)| m.clone()).collect()
        }
    }
}
