//! Context extraction and token-budget compression (L2).
//!
//! `ContextBuilder` is the facade: given a task description and an
//! optional slice of recent conversation messages, it extracts keywords,
//! scans the codebase and docs roots, folds in matching conversation
//! turns, and compresses the result under a token budget. Grounded in
//! `cortex::context::attention_retriever` and
//! `cortex::context::compressor::ContextCompressor`'s overall
//! build-then-compress shape.

mod codebase;
mod compression;
mod docs;
mod keywords;
mod tokens;

pub use codebase::{scan_codebase, FileContext};
pub use compression::{compress, CompressibleItem, CompressionMetrics, CompressionStrategy};
pub use docs::{scan_docs, DocSection};
pub use keywords::extract_keywords;
pub use tokens::{estimate_tokens, kind_for_extension, ContentKind};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::Message;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("codebase root does not exist: {0}")]
    MissingRoot(String),
}

pub type Result<T> = std::result::Result<T, ContextError>;

const CONVERSATION_WINDOW: usize = 20;
const MAX_CONVERSATION_MATCHES: usize = 10;
const MAX_SUMMARY_LINES: usize = 5;
const SUMMARY_SNIPPET_CHARS: usize = 200;
const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["rs", "py", "js", "ts", "tsx", "jsx", "go", "java"];

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub codebase_roots: Vec<PathBuf>,
    pub docs_roots: Vec<PathBuf>,
    pub source_extensions: Vec<String>,
    pub max_files: usize,
    pub max_docs: usize,
    pub max_context_tokens: usize,
    pub target_ratio: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            codebase_roots: Vec::new(),
            docs_roots: Vec::new(),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_files: 10,
            max_docs: 5,
            max_context_tokens: 8_000,
            target_ratio: 0.8,
        }
    }
}

/// Output of a context build: everything an executor needs to act on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub task_description: String,
    pub relevant_files: Vec<FileContext>,
    pub relevant_docs: Vec<DocSection>,
    pub conversation_context: Option<String>,
    pub total_tokens: usize,
    pub keywords: Vec<String>,
    pub compression: Option<CompressionMetrics>,
}

pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build a `TaskContext` for `task_id`/`task_description`, optionally
    /// folding in the most recent conversation messages.
    pub fn build(&self, task_id: &str, task_description: &str, recent_messages: &[Message]) -> TaskContext {
        let keywords = extract_keywords(task_description);

        let extensions: Vec<&str> = self.config.source_extensions.iter().map(|s| s.as_str()).collect();
        let files = scan_codebase(&self.config.codebase_roots, &extensions, &keywords, self.config.max_files);
        let docs = scan_docs(&self.config.docs_roots, &keywords, self.config.max_docs);
        let conversation_context = conversation_summary(recent_messages, &keywords);

        let total_tokens = files
            .iter()
            .map(|f| estimate_tokens(&f.summary, kind_for_extension(&f.language)))
            .sum::<usize>()
            + docs.iter().map(|d| estimate_tokens(&d.content, ContentKind::Prose)).sum::<usize>()
            + conversation_context.as_deref().map(|c| estimate_tokens(c, ContentKind::Prose)).unwrap_or(0);

        let (files, docs, compression) = self.compress_if_needed(files, docs, &keywords, total_tokens);

        let total_tokens = files
            .iter()
            .map(|f| estimate_tokens(&f.summary, kind_for_extension(&f.language)))
            .sum::<usize>()
            + docs.iter().map(|d| estimate_tokens(&d.content, ContentKind::Prose)).sum::<usize>()
            + conversation_context.as_deref().map(|c| estimate_tokens(c, ContentKind::Prose)).unwrap_or(0);

        TaskContext {
            task_id: task_id.to_string(),
            task_description: task_description.to_string(),
            relevant_files: files,
            relevant_docs: docs,
            conversation_context,
            total_tokens,
            keywords,
            compression,
        }
    }

    fn compress_if_needed(
        &self,
        files: Vec<FileContext>,
        docs: Vec<DocSection>,
        keywords: &[String],
        total_tokens: usize,
    ) -> (Vec<FileContext>, Vec<DocSection>, Option<CompressionMetrics>) {
        if total_tokens <= (self.config.target_ratio * self.config.max_context_tokens as f64) as usize {
            return (files, docs, None);
        }

        let mut items: Vec<CompressibleItem> = Vec::new();
        for file in &files {
            items.push(CompressibleItem {
                id: file.file_path.clone(),
                content: file.summary.clone(),
                is_code: true,
                keyword_score: file.relevant_lines.len() as f64,
                recency: 1.0,
                size_bytes: file.size_bytes,
            });
        }
        for doc in &docs {
            items.push(CompressibleItem {
                id: doc.section_path.clone(),
                content: doc.content.clone(),
                is_code: false,
                keyword_score: doc.relevance_score,
                recency: 1.0,
                size_bytes: doc.content.len() as u64,
            });
        }

        let (compressed, metrics) = compress(
            items,
            keywords,
            self.config.max_context_tokens,
            self.config.target_ratio,
            &[CompressionStrategy::Hybrid],
        );

        let kept_ids: std::collections::HashSet<&str> = compressed.iter().map(|i| i.id.as_str()).collect();
        let files = files.into_iter().filter(|f| kept_ids.contains(f.file_path.as_str())).collect();
        let docs = docs.into_iter().filter(|d| kept_ids.contains(d.section_path.as_str())).collect();

        (files, docs, Some(metrics))
    }
}

fn conversation_summary(recent_messages: &[Message], keywords: &[String]) -> Option<String> {
    if keywords.is_empty() || recent_messages.is_empty() {
        return None;
    }
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let window_start = recent_messages.len().saturating_sub(CONVERSATION_WINDOW);
    let matches: Vec<&Message> = recent_messages[window_start..]
        .iter()
        .filter(|m| {
            let lower = m.content.to_lowercase();
            keywords_lower.iter().any(|k| lower.contains(k.as_str()))
        })
        .take(MAX_CONVERSATION_MATCHES)
        .collect();

    if matches.is_empty() {
        return None;
    }

    let summary = matches
        .iter()
        .take(MAX_SUMMARY_LINES)
        .map(|m| {
            let snippet: String = m.content.chars().take(SUMMARY_SNIPPET_CHARS).collect();
            format!("{}: {}", m.role.as_str(), snippet)
        })
        .collect::<Vec<_>>()
        .join("\n");

    Some(summary)
}
