//! Documentation scanning: heading-tracked keyword windows.
//!
//! Same keyword-hit-line shape as `codebase::scan_codebase`, applied to
//! `.md`/`.txt` files and windowed around each hit with the nearest
//! preceding Markdown heading as the section title.

use std::path::PathBuf;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

const WINDOW_LINES: usize = 3;
const MAX_SECTIONS_PER_FILE: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSection {
    pub section_path: String,
    pub title: String,
    pub content: String,
    pub relevance_score: f64,
    pub heading_level: u8,
}

fn heading_at_or_before(lines: &[&str], index: usize) -> (String, u8) {
    for i in (0..=index).rev() {
        let trimmed = lines[i].trim_start();
        if let Some(stripped) = trimmed.strip_prefix('#') {
            let level = trimmed.chars().take_while(|c| *c == '#').count().min(6) as u8;
            let title = stripped.trim_start_matches('#').trim().to_string();
            return (title, level);
        }
    }
    ("".to_string(), 0)
}

/// Scan `.md`/`.txt` files under `roots`, ranking by
/// `keyword_matches / |keywords|`, keeping the top `max_docs`.
pub fn scan_docs(roots: &[PathBuf], keywords: &[String], max_docs: usize) -> Vec<DocSection> {
    if keywords.is_empty() {
        return Vec::new();
    }
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut candidates: Vec<(f64, DocSection)> = Vec::new();

    for root in roots {
        let walker = WalkBuilder::new(root).hidden(false).build();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_doc = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| ext == "md" || ext == "txt")
                .unwrap_or(false);
            if !is_doc {
                continue;
            }

            let Ok(content) = std::fs::read_to_string(path) else { continue };
            let lines: Vec<&str> = content.lines().collect();

            let mut matches = 0usize;
            let mut sections_found = 0usize;

            for (i, line) in lines.iter().enumerate() {
                let line_lower = line.to_lowercase();
                let hit = keywords_lower.iter().any(|k| line_lower.contains(k.as_str()));
                if !hit {
                    continue;
                }
                matches += 1;
                if sections_found >= MAX_SECTIONS_PER_FILE {
                    continue;
                }

                let start = i.saturating_sub(WINDOW_LINES);
                let end = (i + WINDOW_LINES + 1).min(lines.len());
                let window = lines[start..end].join("\n");
                let (title, level) = heading_at_or_before(&lines, i);

                sections_found += 1;
                candidates.push((
                    0.0, // filled in after total match count for this file is known
                    DocSection {
                        section_path: format!("{}#{}", path.display(), sections_found),
                        title,
                        content: window,
                        relevance_score: 0.0,
                        heading_level: level,
                    },
                ));
            }

            let file_score = matches as f64 / keywords.len() as f64;
            let start_idx = candidates.len().saturating_sub(sections_found);
            for candidate in candidates[start_idx..].iter_mut() {
                candidate.0 = file_score;
                candidate.1.relevance_score = file_score;
            }
        }
    }

    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    candidates.into_iter().take(max_docs).map(|(_, d)| d).collect()
}
