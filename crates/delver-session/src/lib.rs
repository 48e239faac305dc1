//! Conversation state for turn-based research sessions.
//!
//! A [`ConversationState`] is a plain value owned by the caller: it is passed
//! into every turn and handed back updated, so sessions never share state.

/// Conversation stage and state value.
pub mod state;

pub use state::{ConversationStage, ConversationState};
