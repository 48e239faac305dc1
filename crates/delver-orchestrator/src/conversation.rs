use crate::clarification::format_question_list;
use crate::engine::ResearchManager;
use crate::types::{ClarifyingQuestionSet, ResearchQuery};
use delver_core::{DelverError, DelverResult, Message};
use delver_session::{ConversationStage, ConversationState};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// Reply to any message that arrives while a run is in flight.
pub const BUSY_NOTICE: &str = "Please wait for the current task to finish.";

/// Snapshot delivered to the caller each time a turn makes progress.
#[derive(Debug, Clone)]
pub struct TurnUpdate {
    /// The full transcript including this turn's messages.
    pub transcript: Vec<Message>,
    /// Session state to pass into the next turn.
    pub state: ConversationState,
}

/// Incremental updates for one turn. The last `Ok` item carries the state
/// to pass into the next turn.
pub type TurnStream = ReceiverStream<DelverResult<TurnUpdate>>;

/// Drives the research pipeline one chat message at a time.
///
/// State is never stored here: each turn takes the caller's transcript and
/// [`ConversationState`] by value and streams back updated copies.
#[derive(Clone)]
pub struct ConversationDriver {
    manager: Arc<ResearchManager>,
}

impl ConversationDriver {
    /// A driver over `manager`.
    pub fn new(manager: Arc<ResearchManager>) -> Self {
        Self { manager }
    }

    /// A fresh session, awaiting its first query.
    pub fn start_session(&self) -> ConversationState {
        ConversationState::new()
    }

    /// Handle one incoming message.
    ///
    /// The turn runs on its own task and finishes even if the stream is
    /// dropped. A failed stage first delivers a notice with the state reset
    /// to `AwaitingQuery`, then the error.
    pub fn turn(
        &self,
        message: impl Into<String>,
        transcript: Vec<Message>,
        state: ConversationState,
    ) -> TurnStream {
        let (tx, rx) = mpsc::channel(16);
        let manager = self.manager.clone();
        let message = message.into();

        tokio::spawn(async move {
            let mut turn = Turn {
                transcript,
                state,
                tx,
            };
            if let Err(e) = turn.drive(&manager, message).await {
                let _ = turn.tx.send(Err(e)).await;
            }
        });

        ReceiverStream::new(rx)
    }

    /// Run a turn to completion and return its final update.
    pub async fn respond(
        &self,
        message: impl Into<String>,
        transcript: Vec<Message>,
        state: ConversationState,
    ) -> DelverResult<TurnUpdate> {
        let mut updates = self.turn(message, transcript, state);
        let mut last = None;
        while let Some(update) = updates.next().await {
            last = Some(update?);
        }
        last.ok_or_else(|| DelverError::Session("turn ended without an update".to_string()))
    }
}

struct Turn {
    transcript: Vec<Message>,
    state: ConversationState,
    tx: mpsc::Sender<DelverResult<TurnUpdate>>,
}

impl Turn {
    async fn drive(&mut self, manager: &ResearchManager, message: String) -> DelverResult<()> {
        self.transcript.push(Message::user(message.clone()));

        match self.state.stage {
            ConversationStage::Running => {
                info!(session_id = %self.state.id, "Research in progress, rejecting message");
                self.transcript.push(Message::assistant(BUSY_NOTICE));
                self.emit().await;
                Ok(())
            }
            ConversationStage::AwaitingQuery => {
                let questions = match manager.get_clarifying_questions(&message).await {
                    Ok(questions) => questions,
                    Err(e) => return Err(self.fail(e).await),
                };
                if questions.is_empty() {
                    self.run(manager, ResearchQuery::new(message)).await
                } else {
                    let list = format_question_list(questions.as_slice());
                    self.state.await_answers(message, questions.into_vec())?;
                    self.transcript.push(Message::assistant(list));
                    self.emit().await;
                    Ok(())
                }
            }
            ConversationStage::AwaitingAnswers => {
                let questions = ClarifyingQuestionSet::new(self.state.questions.clone());
                let query =
                    ResearchQuery::from_answers(self.state.query.clone(), &questions, &message);
                self.run(manager, query).await
            }
        }
    }

    async fn run(&mut self, manager: &ResearchManager, query: ResearchQuery) -> DelverResult<()> {
        self.state.begin_run(query.text())?;
        self.transcript.push(Message::assistant("Researching..."));
        let reply = self.transcript.len() - 1;
        self.emit().await;

        let mut events = manager.run(query);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    self.state.push_output(event.to_string());
                    if let Some(msg) = self.transcript.get_mut(reply) {
                        msg.content = self.state.rendered_output();
                    }
                    self.emit().await;
                }
                Err(e) => return Err(self.fail(e).await),
            }
        }

        self.state.finish_run()?;
        self.emit().await;
        Ok(())
    }

    /// Reset the session and report the failure before handing it back.
    async fn fail(&mut self, e: DelverError) -> DelverError {
        warn!(session_id = %self.state.id, error = %e, "Research failed");
        self.state.reset();
        self.transcript
            .push(Message::assistant(format!("Research failed: {e}")));
        self.emit().await;
        e
    }

    async fn emit(&self) {
        let update = TurnUpdate {
            transcript: self.transcript.clone(),
            state: self.state.clone(),
        };
        // A dropped receiver does not stop the turn.
        let _ = self.tx.send(Ok(update)).await;
    }
}
