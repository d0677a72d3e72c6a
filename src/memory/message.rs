//! The message type shared by all three memory tiers.
//!
//! Grounded in `original_source/runtime/memory/systems/ProductionMemorySystem.py`'s
//! `Message` dataclass, including its exact identity rule:
//! `sha256(f"{role}:{content}:{timestamp}")[:16]`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The role a message was authored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A role-tagged unit of conversation. Immutable after creation; its
/// identity is derived from its content, not assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            agent_id: None,
            task_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The dedup key across tiers: `sha256("role:content:timestamp")[:16]`.
    pub fn hash(&self) -> String {
        hash_parts(self.role.as_str(), &self.content, &self.timestamp)
    }

    pub fn hours_ago(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 3_600_000.0
    }
}

pub(crate) fn hash_parts(role: &str, content: &str, timestamp: &DateTime<Utc>) -> String {
    let raw = format!("{role}:{content}:{}", timestamp.to_rfc3339());
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_identical_fields() {
        let ts = Utc::now();
        let a = Message {
            role: Role::User,
            content: "hello".to_string(),
            timestamp: ts,
            agent_id: None,
            task_id: None,
            metadata: HashMap::new(),
        };
        let b = Message {
            role: Role::User,
            content: "hello".to_string(),
            timestamp: ts,
            agent_id: Some("other-agent".to_string()),
            task_id: None,
            metadata: HashMap::new(),
        };
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_differs_on_content_change() {
        let ts = Utc::now();
        let a = Message::new(Role::User, "hello");
        let mut b = a.clone();
        b.timestamp = ts;
        let mut a2 = a.clone();
        a2.timestamp = ts;
        b.content = "goodbye".to_string();
        assert_ne!(a2.hash(), b.hash());
    }

    #[test]
    fn hash_is_16_hex_chars() {
        let m = Message::new(Role::Assistant, "response");
        assert_eq!(m.hash().len(), 16);
        assert!(m.hash().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
