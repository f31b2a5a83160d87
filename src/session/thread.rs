//! The chat session: one conversation, its timing map, and the status
//! machine that drives the page's submit/stop affordances.
//!
//! Every state mutation re-serializes the persisted record (conversation +
//! timings) to the store under [`CHAT_STATE_KEY`]. Hydration is the inverse:
//! a missing or malformed record silently resets to an empty conversation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::Message;
use crate::store::{CHAT_STATE_KEY, StateStore};

/// Status of the chat session, serialized lowercase for the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    /// Nothing has been submitted yet (or the conversation was cleared).
    Idle,
    /// A message was submitted; no assistant text has arrived.
    Submitted,
    /// Assistant text is arriving.
    Streaming,
    /// The last response completed (or was stopped).
    Ready,
    /// The last response failed.
    Error,
}

/// The persisted record: conversation plus timing map. No version field;
/// anything unparseable resets to `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatState {
    /// Ordered conversation messages.
    pub messages: Vec<Message>,
    /// Message id -> response latency in milliseconds.
    pub timings: HashMap<String, u64>,
}

/// How an in-flight response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The upstream stream ran to completion.
    Completed,
    /// The user stopped the response.
    Stopped,
    /// The upstream stream failed.
    Failed,
}

/// Identifier and latency of a committed assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedResponse {
    pub message_id: String,
    pub duration_ms: u64,
}

/// Error from submitting a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("a response is already in flight")]
    ResponseInFlight,
}

#[derive(Debug)]
struct InFlight {
    token: CancellationToken,
    submitted_at: Instant,
    stream_claimed: bool,
}

/// A single conversation session.
///
/// Holds the message list, the timing map, and the status enumeration, and
/// guards the invariant that at most one response is in flight.
#[derive(Debug)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    store: Arc<StateStore>,
    messages: RwLock<Vec<Message>>,
    timings: RwLock<HashMap<String, u64>>,
    status: RwLock<ChatStatus>,
    in_flight: RwLock<Option<InFlight>>,
}

impl Clone for ChatSession {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ChatSession {
    /// Hydrate the session from the store.
    ///
    /// A missing or malformed record yields an empty conversation and empty
    /// timing map. Status always starts at `Idle`; in-flight state is not
    /// persisted.
    #[must_use]
    pub fn hydrate(store: Arc<StateStore>) -> Self {
        let state = store
            .get(CHAT_STATE_KEY)
            .and_then(|raw| match serde_json::from_str::<ChatState>(&raw) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::debug!(error = %e, "discarding malformed chat record");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            inner: Arc::new(SessionInner {
                store,
                messages: RwLock::new(state.messages),
                timings: RwLock::new(state.timings),
                status: RwLock::new(ChatStatus::Idle),
                in_flight: RwLock::new(None),
            }),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ChatStatus {
        *self.inner.status.read().unwrap()
    }

    /// All messages in the conversation.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().unwrap().clone()
    }

    /// Number of messages in the conversation.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.messages.read().unwrap().len()
    }

    /// Response latency for a message, if recorded.
    #[must_use]
    pub fn duration_ms(&self, message_id: &str) -> Option<u64> {
        self.inner.timings.read().unwrap().get(message_id).copied()
    }

    /// Snapshot of the persisted record.
    #[must_use]
    pub fn state(&self) -> ChatState {
        ChatState {
            messages: self.inner.messages.read().unwrap().clone(),
            timings: self.inner.timings.read().unwrap().clone(),
        }
    }

    /// Whether a response is currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.inner.in_flight.read().unwrap().is_some()
    }

    /// Cancellation token of the in-flight response, if any.
    #[must_use]
    pub fn current_token(&self) -> Option<CancellationToken> {
        self.inner
            .in_flight
            .read()
            .unwrap()
            .as_ref()
            .map(|f| f.token.clone())
    }

    /// Submit a user message and begin a response.
    ///
    /// Rejects blank input and concurrent submission. On success the user
    /// message is appended, status flips to `Submitted`, and the in-flight
    /// guard holds a fresh cancellation token.
    pub fn submit(&self, text: &str) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        let mut in_flight = self.inner.in_flight.write().unwrap();
        if in_flight.is_some() {
            return Err(SubmitError::ResponseInFlight);
        }

        self.inner
            .messages
            .write()
            .unwrap()
            .push(Message::user(text.trim()));
        *self.inner.status.write().unwrap() = ChatStatus::Submitted;
        *in_flight = Some(InFlight {
            token: CancellationToken::new(),
            submitted_at: Instant::now(),
            stream_claimed: false,
        });
        drop(in_flight);

        self.persist();
        Ok(())
    }

    /// Claim the in-flight response for a stream consumer.
    ///
    /// Returns the cancellation token the first time it is called per
    /// response; further calls return `None` until the next submission, so
    /// one response never feeds two upstream requests.
    #[must_use]
    pub fn claim_stream(&self) -> Option<CancellationToken> {
        let mut guard = self.inner.in_flight.write().unwrap();
        let in_flight = guard.as_mut()?;
        if in_flight.stream_claimed {
            return None;
        }
        in_flight.stream_claimed = true;
        Some(in_flight.token.clone())
    }

    /// Mark the in-flight response as streaming (first delta arrived).
    pub fn mark_streaming(&self) {
        let mut status = self.inner.status.write().unwrap();
        if *status == ChatStatus::Submitted {
            *status = ChatStatus::Streaming;
        }
    }

    /// Finish the in-flight response.
    ///
    /// Commits `partial` as the assistant message when it is non-blank and
    /// records its latency (measured from submission). Status becomes `Ready`
    /// for completed and stopped responses, `Error` for failed ones. Returns
    /// `None` when nothing was in flight or no text was committed.
    pub fn finish(&self, partial: &str, outcome: FinishOutcome) -> Option<FinishedResponse> {
        let in_flight = self.inner.in_flight.write().unwrap().take()?;
        let elapsed_ms = in_flight.submitted_at.elapsed().as_millis() as u64;

        let mut finished = None;
        if !partial.trim().is_empty() {
            let msg = Message::assistant(partial);
            self.inner
                .timings
                .write()
                .unwrap()
                .insert(msg.id.clone(), elapsed_ms);
            finished = Some(FinishedResponse {
                message_id: msg.id.clone(),
                duration_ms: elapsed_ms,
            });
            self.inner.messages.write().unwrap().push(msg);
        }

        *self.inner.status.write().unwrap() = match outcome {
            FinishOutcome::Completed | FinishOutcome::Stopped => ChatStatus::Ready,
            FinishOutcome::Failed => ChatStatus::Error,
        };

        self.persist();
        finished
    }

    /// Stop the in-flight response. Returns whether one was in flight.
    ///
    /// When the response is still `Submitted` (no stream consumer has seen a
    /// delta) the session is finalized here; otherwise the streaming task
    /// observes the cancellation and commits whatever partial text it has.
    pub fn stop(&self) -> bool {
        let token = self.current_token();
        let Some(token) = token else {
            return false;
        };
        token.cancel();

        if self.status() == ChatStatus::Submitted {
            let _ = self.finish("", FinishOutcome::Stopped);
        }
        true
    }

    /// Clear the conversation and timing map.
    ///
    /// Rejected while a response is in flight.
    pub fn clear(&self) -> Result<(), SubmitError> {
        if self.in_flight() {
            return Err(SubmitError::ResponseInFlight);
        }
        self.inner.messages.write().unwrap().clear();
        self.inner.timings.write().unwrap().clear();
        *self.inner.status.write().unwrap() = ChatStatus::Idle;
        self.persist();
        Ok(())
    }

    /// Re-serialize the persisted record to the store.
    fn persist(&self) {
        let state = self.state();
        match serde_json::to_string(&state) {
            Ok(raw) => self.inner.store.set(CHAT_STATE_KEY, &raw),
            Err(e) => tracing::warn!(error = %e, "failed to serialize chat record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;
    use crate::store::StateStore;

    fn session_in(dir: &tempfile::TempDir) -> ChatSession {
        let store = Arc::new(StateStore::open(dir.path().join("state.json")));
        ChatSession::hydrate(store)
    }

    #[test]
    fn test_submit_and_finish_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        assert_eq!(session.status(), ChatStatus::Idle);
        assert_eq!(session.message_count(), 0);

        session.submit("Hello").unwrap();
        assert_eq!(session.status(), ChatStatus::Submitted);
        assert!(session.in_flight());

        session.mark_streaming();
        assert_eq!(session.status(), ChatStatus::Streaming);

        let finished = session
            .finish("Hi there!", FinishOutcome::Completed)
            .unwrap();
        assert_eq!(session.status(), ChatStatus::Ready);
        assert!(!session.in_flight());

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].text(), "Hi there!");
        assert_eq!(
            session.duration_ms(&finished.message_id),
            Some(finished.duration_ms)
        );
    }

    #[test]
    fn test_blank_submit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        assert_eq!(session.submit("   "), Err(SubmitError::EmptyMessage));
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.status(), ChatStatus::Idle);
    }

    #[test]
    fn test_concurrent_submit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        session.submit("first").unwrap();
        assert_eq!(
            session.submit("second"),
            Err(SubmitError::ResponseInFlight)
        );
        assert_eq!(session.message_count(), 1);
    }

    #[test]
    fn test_stop_before_any_delta_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        session.submit("hello").unwrap();
        assert!(session.stop());

        assert_eq!(session.status(), ChatStatus::Ready);
        assert!(!session.in_flight());
        // Only the user message remains
        assert_eq!(session.message_count(), 1);

        // Stop with nothing in flight is a no-op
        assert!(!session.stop());
        assert_eq!(session.status(), ChatStatus::Ready);
    }

    #[test]
    fn test_failed_response_commits_partial() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        session.submit("hello").unwrap();
        session.mark_streaming();
        let finished = session.finish("par", FinishOutcome::Failed).unwrap();

        assert_eq!(session.status(), ChatStatus::Error);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "par");
        assert!(session.duration_ms(&finished.message_id).is_some());
    }

    #[test]
    fn test_finish_with_nothing_in_flight_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        assert!(session.finish("text", FinishOutcome::Completed).is_none());
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn test_hydration_restores_conversation_and_timings() {
        let dir = tempfile::tempdir().unwrap();
        let finished = {
            let session = session_in(&dir);
            session.submit("hello").unwrap();
            session.finish("world", FinishOutcome::Completed).unwrap()
        };

        let session = session_in(&dir);
        assert_eq!(session.status(), ChatStatus::Idle);
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages()[1].text(), "world");
        assert_eq!(
            session.duration_ms(&finished.message_id),
            Some(finished.duration_ms)
        );
    }

    #[test]
    fn test_malformed_record_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = Arc::new(StateStore::open(&path));
        store.set(crate::store::CHAT_STATE_KEY, "{\"messages\": 42}");

        let session = ChatSession::hydrate(store);
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.status(), ChatStatus::Idle);
    }

    #[test]
    fn test_clear_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        session.submit("hello").unwrap();
        let _ = session.finish("world", FinishOutcome::Completed);
        session.clear().unwrap();

        assert_eq!(session.message_count(), 0);
        assert_eq!(session.status(), ChatStatus::Idle);
        assert!(session.state().timings.is_empty());

        // Cleared record persists across hydration
        let session = session_in(&dir);
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn test_claim_stream_is_single_use_per_response() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        assert!(session.claim_stream().is_none());

        session.submit("hello").unwrap();
        assert!(session.claim_stream().is_some());
        assert!(session.claim_stream().is_none());

        let _ = session.finish("world", FinishOutcome::Completed);
        assert!(session.claim_stream().is_none());

        // A fresh submission gets a fresh claim
        session.submit("again").unwrap();
        assert!(session.claim_stream().is_some());
    }

    #[test]
    fn test_clear_rejected_while_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);

        session.submit("hello").unwrap();
        assert_eq!(session.clear(), Err(SubmitError::ResponseInFlight));
    }
}
