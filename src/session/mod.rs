//! Conversation state and status machine.

mod thread;

pub use thread::{ChatSession, ChatState, ChatStatus, FinishOutcome, FinishedResponse, SubmitError};
