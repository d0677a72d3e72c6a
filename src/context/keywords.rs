//! Keyword extraction from a task description.
//!
//! Identifier-shape regexes are new relative to the teacher (which drives
//! retrieval off embeddings rather than lexical keyword sets), grounded
//! instead in `cortex::context::attention_retriever`'s frequency-weighted
//! scoring shape, generalized here to spec.md's exact extraction rules.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "will", "not", "are", "was",
    "can", "has", "its", "but", "all", "any", "how", "out", "use", "should", "would", "could",
];

static FILE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_\-./]+\.(rs|py|js|ts|tsx|jsx|go|java|rb|c|cpp|h|hpp|md|toml|yaml|yml|json)\b").unwrap());
static PASCAL_OR_CAMEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9]*[a-z][a-zA-Z0-9]*\b|\b[a-z]+[A-Z][a-zA-Z0-9]*\b").unwrap());
static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9_]{2,}_[a-z0-9_]+\b").unwrap());
static HYPHENATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9-]*-[a-z0-9-]+\b").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']{3,})["']"#).unwrap());
static SMALL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,4}\b").unwrap());

/// Extract up to 20 keyword-weighted tokens from `description`, longest
/// (most specific) first. Drops stop-words and tokens shorter than 3 chars.
pub fn extract_keywords(description: &str) -> Vec<String> {
    let mut found: HashSet<String> = HashSet::new();

    for pattern in [&*FILE_PATH, &*PASCAL_OR_CAMEL, &*SNAKE_CASE, &*HYPHENATED, &*SMALL_NUMBER] {
        for m in pattern.find_iter(description) {
            found.insert(m.as_str().to_string());
        }
    }
    for capture in QUOTED.captures_iter(description) {
        if let Some(inner) = capture.get(1) {
            found.insert(inner.as_str().to_string());
        }
    }

    let mut keywords: Vec<String> = found
        .into_iter()
        .filter(|token| token.len() >= 3)
        .filter(|token| !STOP_WORDS.contains(&token.to_lowercase().as_str()))
        .collect();

    keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    keywords.truncate(20);
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_file_paths() {
        let keywords = extract_keywords("please update src/main.rs to fix the bug");
        assert!(keywords.contains(&"src/main.rs".to_string()));
    }

    #[test]
    fn extracts_camel_and_pascal_case_identifiers() {
        let keywords = extract_keywords("refactor the WorkflowEngine and taskRouter modules");
        assert!(keywords.contains(&"WorkflowEngine".to_string()));
        assert!(keywords.contains(&"taskRouter".to_string()));
    }

    #[test]
    fn extracts_quoted_substrings() {
        let keywords = extract_keywords(r#"search for "authentication flow" in the docs"#);
        assert!(keywords.contains(&"authentication flow".to_string()));
    }

    #[test]
    fn drops_stop_words_and_short_tokens() {
        let keywords = extract_keywords("the and for with");
        assert!(keywords.is_empty());
    }

    #[test]
    fn caps_output_at_twenty() {
        let description: String = (0..40).map(|i| format!("identifier_number_{i} ")).collect();
        let keywords = extract_keywords(&description);
        assert!(keywords.len() <= 20);
    }
}
