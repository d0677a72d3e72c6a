//! Conductor - Multi-Agent Task Orchestration Core
//!
//! Conductor decomposes high-level goals into a DAG of typed tasks, routes
//! each task to a capability-matched executor, runs the DAG with bounded
//! concurrency, checkpoints partial progress so interrupted runs resume
//! exactly where they stopped, and maintains a layered conversational memory
//! that feeds context into each task.
//!
//! # Architecture
//!
//! - `memory` - Three-tier message storage (working, summary, persistent) with consolidation
//! - `context` - Keyword extraction, codebase/doc scanning, and token-budget compression
//! - `router` - Capability-aware, load-aware task-to-executor dispatch
//! - `workflow` - DAG validation, wave scheduling, retry/timeout, checkpointing
//! - `events` - Thin lifecycle event bus consumed by external observers
//! - `executor` - The abstract contract any task-handling unit must honor
//!
//! The CLI front-end, configuration file loading, knowledge-graph ingestion,
//! and any concrete LLM/Git provider clients are external collaborators and
//! are intentionally absent from this crate.

pub mod context;
pub mod events;
pub mod executor;
pub mod memory;
pub mod router;
pub mod workflow;

pub use events::{Event, EventBus, EventType};
pub use executor::{AgentExecutor, ExecutionOutcome, ExecutorMetadata};
pub use memory::MemoryStore;
pub use router::TaskRouter;
pub use workflow::WorkflowEngine;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
