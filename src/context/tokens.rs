//! Token estimation.
//!
//! Grounded in `cortex::context::compressor::ContextCompressor::count_tokens`'s
//! `content.len() / 4` baseline, generalized to spec.md's per-language
//! character-to-token ratios.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Code,
    Prose,
    Json,
}

impl ContentKind {
    fn chars_per_token(self) -> f64 {
        match self {
            ContentKind::Code => 1.0 / 0.3,
            ContentKind::Prose => 1.0 / 0.5,
            ContentKind::Json => 1.0 / 0.35,
        }
    }
}

/// Estimate token count for `content` under the given content kind.
pub fn estimate_tokens(content: &str, kind: ContentKind) -> usize {
    let chars = content.chars().count() as f64;
    (chars / kind.chars_per_token()).ceil() as usize
}

/// Best-effort kind inference from a file extension, used when the caller
/// doesn't already know the content's shape.
pub fn kind_for_extension(extension: &str) -> ContentKind {
    match extension.to_lowercase().as_str() {
        "json" => ContentKind::Json,
        "md" | "txt" | "rst" => ContentKind::Prose,
        _ => ContentKind::Code,
    }
}
