//! Research pipeline orchestration.
//!
//! Turns a question into a markdown report in four sequential stages:
//! clarify (on request), plan, search (concurrent fan-out), write.
//!
//! # Main types
//!
//! - [`ResearchManager`]: Runs the pipeline as a lazy stream of [`ResearchEvent`]s.
//! - [`SearchExecutor`]: Concurrent fan-out that keeps only successful searches.
//! - [`SearchMonitor`]: Completed/total counter for one fan-out.
//! - [`ConversationDriver`]: Turn-by-turn chat state machine over the manager.

/// Question list, answer parsing, and clarification block formats.
pub mod clarification;
/// Turn-based conversation driver.
pub mod conversation;
/// The pipeline orchestrator.
pub mod engine;
/// Search fan-out executor.
pub mod fanout;
/// Fan-out progress counter.
pub mod monitor;
/// Stage agents and single-call stage functions.
pub mod stages;
/// Research data model.
pub mod types;

pub use conversation::{ConversationDriver, TurnStream, TurnUpdate, BUSY_NOTICE};
pub use engine::{ResearchEvent, ResearchManager, ResearchStream};
pub use fanout::SearchExecutor;
pub use monitor::{SearchMonitor, SearchProgress};
pub use types::{
    Absent, Clarification, ClarifyingQuestionSet, Evidence, EvidenceSet, ReportData,
    ResearchQuery, SearchItem, SearchPlan, SearchResult, MAX_QUESTIONS, MAX_SEARCHES,
};
