//! Codebase scanning: keyword-weighted file selection.
//!
//! Uses the `ignore` crate (already a dependency of the teacher's
//! workspace) for gitignore-aware, vendor-directory-skipping directory
//! walks, replacing ad hoc glob code. Per-file heuristic summary and
//! keyword-hit-line collection are grounded in
//! `cortex::context::attention_retriever`'s per-file scoring shape.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

const SKIP_DIRS: &[&str] = &["node_modules", ".git", "__pycache__", "venv", ".venv", "dist", "build", "target"];
const MAX_LINES_PER_FILE: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    pub file_path: String,
    pub language: String,
    pub relevant_lines: Vec<String>,
    pub summary: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

fn language_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") | Some("tsx") => "typescript",
        Some("go") => "go",
        Some("java") => "java",
        Some(other) => other,
        None => "unknown",
    }
    .to_string()
}

fn is_skipped(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c.as_os_str().to_str(), Some(name) if SKIP_DIRS.contains(&name)))
}

/// Heuristic summary: first up to 5 of docstring-like lines, top-level
/// definitions, import lines, and keyword-hit lines.
fn summarize_file(content: &str, keyword_hit_lines: &[String]) -> String {
    let mut picked = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        let is_doc = trimmed.starts_with("///") || trimmed.starts_with("//!") || trimmed.starts_with("\"\"\"");
        let is_definition = trimmed.starts_with("pub fn ")
            || trimmed.starts_with("fn ")
            || trimmed.starts_with("pub struct ")
            || trimmed.starts_with("struct ")
            || trimmed.starts_with("class ")
            || trimmed.starts_with("def ");
        let is_import = trimmed.starts_with("use ") || trimmed.starts_with("import ") || trimmed.starts_with("from ");

        if is_doc || is_definition || is_import {
            picked.push(trimmed.to_string());
            if picked.len() >= 5 {
                break;
            }
        }
    }

    if picked.len() < 5 {
        for line in keyword_hit_lines {
            picked.push(line.clone());
            if picked.len() >= 5 {
                break;
            }
        }
    }

    picked.join(" / ")
}

/// Glob `roots` for files matching `extensions`, skipping vendor/build
/// directories, collect up to 20 keyword-hit lines per file, and keep the
/// top `max_files` ranked by keyword-matching line count.
pub fn scan_codebase(roots: &[PathBuf], extensions: &[&str], keywords: &[String], max_files: usize) -> Vec<FileContext> {
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut candidates: Vec<(usize, FileContext)> = Vec::new();

    for root in roots {
        let walker = WalkBuilder::new(root).hidden(false).build();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || is_skipped(path) {
                continue;
            }
            let has_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.contains(&ext))
                .unwrap_or(false);
            if !has_ext {
                continue;
            }

            let Ok(content) = std::fs::read_to_string(path) else { continue };
            let mut hit_lines = Vec::new();
            for line in content.lines() {
                let line_lower = line.to_lowercase();
                if keywords_lower.iter().any(|k| line_lower.contains(k.as_str())) {
                    hit_lines.push(line.trim().to_string());
                    if hit_lines.len() >= MAX_LINES_PER_FILE {
                        break;
                    }
                }
            }
            if hit_lines.is_empty() {
                continue;
            }

            let metadata = entry.metadata().ok();
            let size_bytes = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let last_modified = metadata
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|| DateTime::<Utc>::from(SystemTime::now()));

            let summary = summarize_file(&content, &hit_lines);
            let score = hit_lines.len();

            candidates.push((
                score,
                FileContext {
                    file_path: path.display().to_string(),
                    language: language_for(path),
                    relevant_lines: hit_lines,
                    summary,
                    size_bytes,
                    last_modified,
                },
            ));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().take(max_files).map(|(_, f)| f).collect()
}
