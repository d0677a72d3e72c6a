//! Multi-strategy context compression to fit a token budget.
//!
//! Grounded in `cortex::context::compressor::ContextCompressor`'s
//! per-strategy dispatch (`remove_comments`, `extract_signatures`,
//! `count_tokens` = `len/4` baseline, quality formula
//! `0.3 * ratio + 0.7 * preservation`), generalized to spec.md's ordered
//! pipeline over a set of retrieved items (relevance filter, extractive
//! summarization, code-to-signature reduction, deduplication) rather than a
//! single compressed string.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::tokens::{estimate_tokens, ContentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionStrategy {
    Relevance,
    Extractive,
    CodeSummary,
    Deduplicate,
    Hybrid,
}

/// A single context item (file, doc section, or conversation snippet)
/// subject to compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressibleItem {
    pub id: String,
    pub content: String,
    pub is_code: bool,
    pub keyword_score: f64,
    pub recency: f64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionMetrics {
    pub ratio: f64,
    pub items_removed: usize,
    pub items_kept: usize,
    pub elapsed_ms: u64,
    pub quality_score: f64,
    pub overflow_warning: Option<String>,
}

const DEFAULT_TARGET_RATIO: f64 = 0.8;
const SIGNATURE_LINE_CAP: usize = 20;

fn total_tokens(items: &[CompressibleItem]) -> usize {
    items
        .iter()
        .map(|item| estimate_tokens(&item.content, if item.is_code { ContentKind::Code } else { ContentKind::Prose }))
        .sum()
}

fn mean_relevance(items: &[CompressibleItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().map(|i| i.keyword_score).sum::<f64>() / items.len() as f64
}

/// Drop lowest-scoring items (score = `keyword_score * recency / (1 + size)`)
/// until under budget or nothing more can be dropped without emptying the set.
fn apply_relevance(items: Vec<CompressibleItem>, target_tokens: usize) -> Vec<CompressibleItem> {
    let mut scored: Vec<(f64, CompressibleItem)> = items
        .into_iter()
        .map(|item| {
            let score = item.keyword_score * item.recency / (1.0 + item.size_bytes as f64 / 1024.0);
            (score, item)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept = Vec::new();
    let mut running_tokens = 0usize;
    for (_, item) in scored {
        let item_tokens = estimate_tokens(&item.content, if item.is_code { ContentKind::Code } else { ContentKind::Prose });
        if running_tokens + item_tokens > target_tokens && !kept.is_empty() {
            continue;
        }
        running_tokens += item_tokens;
        kept.push(item);
    }
    kept
}

const IMPORTANCE_WORDS: &[&str] = &["error", "bug", "fix", "critical", "important", "security", "fail"];

/// Score sentences by keyword count, length (10-30 words preferred), and
/// importance keywords; keep the top N in original order.
fn apply_extractive(items: Vec<CompressibleItem>, keywords: &[String]) -> Vec<CompressibleItem> {
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    items
        .into_iter()
        .map(|mut item| {
            if item.is_code {
                return item;
            }
            let sentences: Vec<&str> = item.content.split(['.', '\n']).map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
            if sentences.len() <= 10 {
                return item;
            }

            let mut scored: Vec<(f64, &str)> = sentences
                .iter()
                .map(|sentence| {
                    let lower = sentence.to_lowercase();
                    let word_count = sentence.split_whitespace().count();
                    let keyword_hits = keywords_lower.iter().filter(|k| lower.contains(k.as_str())).count() as f64;
                    let length_bonus = if (10..=30).contains(&word_count) { 1.0 } else { 0.0 };
                    let importance_hits = IMPORTANCE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
                    (keyword_hits * 2.0 + length_bonus + importance_hits, *sentence)
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            let keep_count = (sentences.len() / 2).max(5);
            let kept_set: HashSet<&str> = scored.into_iter().take(keep_count).map(|(_, s)| s).collect();
            item.content = sentences.into_iter().filter(|s| kept_set.contains(s)).collect::<Vec<_>>().join(". ");
            item
        })
        .collect()
}

/// Replace code bodies with signature lines, language-aware, capped at 20.
fn apply_code_summary(items: Vec<CompressibleItem>) -> Vec<CompressibleItem> {
    items
        .into_iter()
        .map(|mut item| {
            if !item.is_code {
                return item;
            }
            let signatures: Vec<&str> = item
                .content
                .lines()
                .map(|l| l.trim())
                .filter(|l| is_signature_line(l))
                .take(SIGNATURE_LINE_CAP)
                .collect();
            if !signatures.is_empty() {
                item.content = signatures.join("\n");
            }
            item
        })
        .collect()
}

fn is_signature_line(line: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "def ", "class ", "function ", "const ", "let ", "var ", "@", "import ", "from ", "fn ", "pub fn ",
        "struct ", "pub struct ", "trait ", "pub trait ", "=>",
    ];
    PREFIXES.iter().any(|p| line.starts_with(p)) || line.contains("=>")
}

fn content_signature(content: &str) -> String {
    content.lines().take(3).collect::<Vec<_>>().join("\n")
}

/// Merge items with identical file paths (by `id`), then items with
/// identical 3-line content signatures.
fn apply_deduplicate(items: Vec<CompressibleItem>) -> Vec<CompressibleItem> {
    let mut seen_ids = HashSet::new();
    let mut seen_signatures = HashSet::new();
    let mut kept = Vec::new();

    for item in items {
        if !seen_ids.insert(item.id.clone()) {
            continue;
        }
        let signature = content_signature(&item.content);
        if !seen_signatures.insert(signature) {
            continue;
        }
        kept.push(item);
    }
    kept
}

/// Apply `strategies` in order against `items` until the estimated token
/// count is within `target_ratio * max_tokens` or strategies are exhausted.
/// `Hybrid` expands to the full relevance -> extractive -> code_summary ->
/// deduplicate sequence.
pub fn compress(
    items: Vec<CompressibleItem>,
    keywords: &[String],
    max_tokens: usize,
    target_ratio: f64,
    strategies: &[CompressionStrategy],
) -> (Vec<CompressibleItem>, CompressionMetrics) {
    let started = Instant::now();
    let items_before = items.len();
    let tokens_before = total_tokens(&items);
    let target_ratio = if target_ratio > 0.0 { target_ratio } else { DEFAULT_TARGET_RATIO };
    let target_tokens = (target_ratio * max_tokens as f64) as usize;

    let expanded: Vec<CompressionStrategy> = if strategies.contains(&CompressionStrategy::Hybrid) {
        vec![
            CompressionStrategy::Relevance,
            CompressionStrategy::Extractive,
            CompressionStrategy::CodeSummary,
            CompressionStrategy::Deduplicate,
        ]
    } else {
        strategies.to_vec()
    };

    let mut current = items;
    for strategy in expanded {
        if total_tokens(&current) <= target_tokens {
            break;
        }
        current = match strategy {
            CompressionStrategy::Relevance => apply_relevance(current, target_tokens),
            CompressionStrategy::Extractive => apply_extractive(current, keywords),
            CompressionStrategy::CodeSummary => apply_code_summary(current),
            CompressionStrategy::Deduplicate => apply_deduplicate(current),
            CompressionStrategy::Hybrid => current,
        };
    }

    let tokens_after = total_tokens(&current);
    let ratio = if tokens_before > 0 { tokens_after as f64 / tokens_before as f64 } else { 1.0 };

    let overflow_warning = if tokens_after > max_tokens {
        Some(format!("compressed context still exceeds max_tokens ({tokens_after} > {max_tokens})"))
    } else {
        None
    };
    if let Some(warning) = &overflow_warning {
        warn!(warning);
    }

    let metrics = CompressionMetrics {
        ratio,
        items_removed: items_before.saturating_sub(current.len()),
        items_kept: current.len(),
        elapsed_ms: elapsed_ms(started.elapsed()),
        quality_score: mean_relevance(&current),
        overflow_warning,
    };

    (current, metrics)
}

fn elapsed_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
