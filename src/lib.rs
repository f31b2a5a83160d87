//! Colloquy
//!
//! A single-conversation streaming chat application. One page, one
//! conversation: user messages go to an OpenAI-compatible completion
//! endpoint, assistant text streams back over SSE, and the conversation
//! (plus per-response latency) survives restarts in a local state file.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **LLM**: Chat Completions driver behind the [`llm::LlmDriver`] trait
//! - **Session**: interior-mutable conversation with a status machine
//!   (idle / submitted / streaming / ready / error) and stop support
//! - **Store**: string-keyed JSON state file; the conversation lives under
//!   one fixed key and silently resets when the record is missing or bad
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`llm`]: driver trait, message types, Chat Completions implementation
//! - [`normalized`]: unified streaming event model and SSE encoding
//! - [`page`]: the server-rendered chat page
//! - [`server`]: router, handlers, SSE plumbing
//! - [`session`]: conversation state, timings, status transitions
//! - [`store`]: the persistent key-value state file

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod llm;
pub mod normalized;
pub mod page;
pub mod server;
pub mod session;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmDriver, LlmSettings};
use crate::session::ChatSession;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The one conversation this process hosts.
    pub session: ChatSession,
    /// Streaming completion driver.
    pub driver: Arc<dyn LlmDriver>,
    /// Upstream connection settings (model, system prompt).
    pub settings: Arc<LlmSettings>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("session", &self.session)
            .field("settings", &self.settings)
            .field("config", &self.config)
            .finish()
    }
}
