use chrono::{DateTime, Utc};
use delver_core::{DelverError, DelverResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a conversation is in its query → answers → run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    /// The next message is a new research query.
    #[default]
    AwaitingQuery,
    /// The next message answers the pending clarifying questions.
    AwaitingAnswers,
    /// A pipeline run is in flight; new messages are turned away.
    Running,
}

impl std::fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStage::AwaitingQuery => write!(f, "awaiting_query"),
            ConversationStage::AwaitingAnswers => write!(f, "awaiting_answers"),
            ConversationStage::Running => write!(f, "running"),
        }
    }
}

/// Caller-owned state of one research conversation.
///
/// Passed into every turn and returned updated. Transitions go through the
/// methods below, which reject moves the stage does not allow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Session id, stable across resets.
    pub id: Uuid,
    /// Where the conversation is.
    pub stage: ConversationStage,
    /// The query of the current cycle, empty while awaiting one.
    pub query: String,
    /// Pending clarifying questions, in presentation order.
    pub questions: Vec<String>,
    /// Output of the in-progress run. Append-only until the run ends.
    pub buffer: Vec<String>,
    /// When the session started.
    pub created_at: DateTime<Utc>,
    /// Last transition.
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// A fresh session awaiting its first query.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stage: ConversationStage::AwaitingQuery,
            query: String::new(),
            questions: Vec::new(),
            buffer: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True while a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.stage == ConversationStage::Running
    }

    /// Return to `AwaitingQuery`, dropping the query, questions and buffer.
    /// The session id is kept.
    pub fn reset(&mut self) {
        self.stage = ConversationStage::AwaitingQuery;
        self.query.clear();
        self.questions.clear();
        self.buffer.clear();
        self.touch();
    }

    /// `AwaitingQuery` → `AwaitingAnswers`.
    pub fn await_answers(
        &mut self,
        query: impl Into<String>,
        questions: Vec<String>,
    ) -> DelverResult<()> {
        self.expect_stage(ConversationStage::AwaitingQuery)?;
        if questions.is_empty() {
            return Err(DelverError::Session(
                "cannot await answers without questions".to_string(),
            ));
        }
        self.stage = ConversationStage::AwaitingAnswers;
        self.query = query.into();
        self.questions = questions;
        self.touch();
        Ok(())
    }

    /// `AwaitingQuery` or `AwaitingAnswers` → `Running`.
    pub fn begin_run(&mut self, query: impl Into<String>) -> DelverResult<()> {
        if self.is_busy() {
            return Err(DelverError::Session(
                "a research run is already in progress".to_string(),
            ));
        }
        self.stage = ConversationStage::Running;
        self.query = query.into();
        self.buffer.clear();
        self.touch();
        Ok(())
    }

    /// Append one chunk of run output.
    pub fn push_output(&mut self, chunk: impl Into<String>) {
        self.buffer.push(chunk.into());
        self.touch();
    }

    /// The buffer as one displayable string.
    pub fn rendered_output(&self) -> String {
        self.buffer.join("\n\n")
    }

    /// `Running` → `AwaitingQuery`.
    pub fn finish_run(&mut self) -> DelverResult<()> {
        self.expect_stage(ConversationStage::Running)?;
        self.reset();
        Ok(())
    }

    fn expect_stage(&self, expected: ConversationStage) -> DelverResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(DelverError::Session(format!(
                "expected stage {expected}, session is {}",
                self.stage
            )))
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
