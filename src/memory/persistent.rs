//! Tier 3 — Persistent Memory: an append-only, durable message log.
//!
//! Grounded in `boternity-infra::sqlite::{pool, message}`'s split
//! reader/writer `SqlitePool` (WAL mode, migrations run on the writer before
//! the reader pool opens) and row/`try_get` pattern, and in
//! `original_source/runtime/memory/systems/ProductionMemorySystem.py`'s
//! `PersistentMemory` for the exact schema and `INSERT OR IGNORE`
//! idempotency rule.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

use super::message::{Message, Role};

#[derive(Debug, Error)]
pub enum PersistentMemoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("invalid stored role: {0}")]
    InvalidRole(String),
    #[error("invalid stored metadata: {0}")]
    InvalidMetadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistentMemoryError>;

/// Split read/write pool for the message log, WAL mode, one writer.
#[derive(Clone)]
pub struct PersistentMemory {
    reader: SqlitePool,
    writer: SqlitePool,
}

impl PersistentMemory {
    /// Open (creating if missing) the database at `database_url` and run
    /// embedded migrations on the writer pool before opening the reader pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;

        sqlx::migrate!("./migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(base_opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }

    /// Idempotent insert: a duplicate hash is a no-op.
    pub async fn store(&self, message: &Message) -> Result<()> {
        let metadata = serde_json::to_string(&message.metadata)?;
        sqlx::query(
            "INSERT OR IGNORE INTO messages (hash, role, content, timestamp, agent_id, task_id, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.hash())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp.to_rfc3339())
        .bind(&message.agent_id)
        .bind(&message.task_id)
        .bind(metadata)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    pub async fn get_by_task_id(&self, task_id: &str, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT hash, role, content, timestamp, agent_id, task_id, metadata FROM messages \
             WHERE task_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(task_id)
        .bind(limit)
        .fetch_all(&self.reader)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    pub async fn get_by_agent_id(&self, agent_id: &str, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT hash, role, content, timestamp, agent_id, task_id, metadata FROM messages \
             WHERE agent_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.reader)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    pub async fn get_recent(&self, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT hash, role, content, timestamp, agent_id, task_id, metadata FROM messages \
             ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.reader)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    /// Keyword substring match over `content`, case-insensitive.
    pub async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<Message>> {
        let pattern = format!("%{}%", keyword.to_lowercase());
        let rows = sqlx::query(
            "SELECT hash, role, content, timestamp, agent_id, task_id, metadata FROM messages \
             WHERE LOWER(content) LIKE ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.reader)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    pub async fn contains_hash(&self, hash: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM messages WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.reader)
            .await?;
        Ok(row.is_some())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM messages").fetch_one(&self.reader).await?;
        Ok(row.try_get("c")?)
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message> {
    let role_str: String = row.try_get("role")?;
    let role = match role_str.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "tool" => Role::Tool,
        other => return Err(PersistentMemoryError::InvalidRole(other.to_string())),
    };
    let timestamp_str: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let metadata_str: Option<String> = row.try_get("metadata")?;
    let metadata: HashMap<String, serde_json::Value> = match metadata_str {
        Some(s) if !s.is_empty() => serde_json::from_str(&s)?,
        _ => HashMap::new(),
    };

    Ok(Message {
        role,
        content: row.try_get("content")?,
        timestamp,
        agent_id: row.try_get("agent_id")?,
        task_id: row.try_get("task_id")?,
        metadata,
    })
}
