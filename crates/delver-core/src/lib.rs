//! Core types and error definitions for the Delver research pipeline.
//!
//! This crate provides the foundational types shared across all Delver crates:
//! the unified error type and the role-tagged messages that make up a
//! conversation transcript.
//!
//! # Main types
//!
//! - [`DelverError`]: Unified error enum for all Delver subsystems.
//! - [`DelverResult`]: Convenience alias for `Result<T, DelverError>`.
//! - [`Role`]: Message role (user or assistant).
//! - [`Message`]: A single entry in a conversation transcript.

/// Error types.
pub mod error;
/// Transcript message types.
pub mod message;

pub use error::{DelverError, DelverResult};
pub use message::{Message, Role};
