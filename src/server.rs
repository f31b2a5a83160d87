//! HTTP server: the chat page plus the JSON/SSE API behind it.
//!
//! Routes:
//! - `GET /` — the chat page
//! - `POST /api/chat` — submit a user message (422 blank, 409 in-flight)
//! - `GET /api/chat/stream` — SSE stream of the in-flight response
//! - `POST /api/chat/stop` — cancel the in-flight response
//! - `GET /api/chat/state` — conversation snapshot for hydration
//! - `DELETE /api/chat` — clear the conversation (409 while in-flight)

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::config::AppConfig;
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmRequest, LlmSettings, wire_messages};
use crate::normalized::{NormalizedEvent, sse_event};
use crate::page::render_chat_page;
use crate::session::{ChatSession, ChatStatus, FinishOutcome};
use crate::store::StateStore;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let timeout = if state.config.resilience.timeout_disabled {
        // Effectively no timeout; the layer stays in place so the stack
        // is identical either way.
        Duration::from_secs(60 * 60 * 24)
    } else {
        Duration::from_secs(30)
    };

    Router::new()
        // API routes
        .route("/api/chat", post(api_chat_submit))
        .route("/api/chat", delete(api_chat_clear))
        .route("/api/chat/stream", get(api_chat_stream))
        .route("/api/chat/stop", post(api_chat_stop))
        .route("/api/chat/state", get(api_chat_state))
        // HTML page
        .route("/", get(index_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .with_state(state)
}

/// Hydrate the session, wire up the driver, and serve until shutdown.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    let store = Arc::new(StateStore::open(&config.storage.path));
    let session = ChatSession::hydrate(store);
    info!(
        name: "chat.hydrated",
        messages = session.message_count(),
        path = %config.storage.path,
        "Chat state hydrated"
    );

    let driver: Arc<dyn LlmDriver> = Arc::new(ChatCompletionsDriver::new(settings.clone()));

    let state = AppState {
        session,
        driver,
        settings: Arc::new(settings),
        config: Arc::clone(&config),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %format!("http://{addr}"),
        "Server started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_chat_page(&state.config.branding))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    stream_url: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// POST /api/chat - Submit a user message and begin a response.
async fn api_chat_submit(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    use crate::session::SubmitError;

    match state.session.submit(&req.message) {
        Ok(()) => {
            info!(
                name: "chat.submitted",
                message_count = state.session.message_count(),
                "User message accepted"
            );
            Json(SubmitResponse {
                stream_url: "/api/chat/stream",
            })
            .into_response()
        }
        Err(SubmitError::EmptyMessage) => {
            error_json(StatusCode::UNPROCESSABLE_ENTITY, "message must not be empty")
        }
        Err(SubmitError::ResponseInFlight) => error_json(
            StatusCode::CONFLICT,
            "a response is already in flight",
        ),
    }
}

/// Finalizes the in-flight response exactly once, even when the client
/// disconnects mid-stream and the generator is dropped.
struct FinishGuard {
    session: ChatSession,
    partial: String,
    finished: bool,
}

impl FinishGuard {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            partial: String::new(),
            finished: false,
        }
    }

    fn push(&mut self, delta: &str) {
        self.partial.push_str(delta);
    }

    fn finish(&mut self, outcome: FinishOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.session.finish(&self.partial, outcome);
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        // Client went away mid-stream; keep whatever text arrived.
        self.finish(FinishOutcome::Stopped);
    }
}

/// What the stream loop should do next.
enum Step {
    Cancelled,
    Upstream(Option<anyhow::Result<NormalizedEvent>>),
}

/// GET /api/chat/stream - SSE stream of the in-flight response.
///
/// One consumer per response: a second open while the first is active gets
/// an error event instead of a duplicate upstream request.
async fn api_chat_stream(State(state): State<AppState>) -> Response {
    let Some(token) = state.session.claim_stream() else {
        if state.session.in_flight() {
            return single_error_sse("the response stream is already open");
        }
        return single_error_sse("no response is in flight");
    };

    let session = state.session.clone();
    let driver = Arc::clone(&state.driver);
    let request = LlmRequest {
        messages: wire_messages(state.settings.system_prompt.as_deref(), &session.messages()),
    };

    let request_id = Uuid::new_v4().to_string();
    info!(name: "chat.stream.opened", request_id = %request_id, "Stream opened");

    let sse_stream = async_stream::stream! {
        yield Ok::<String, std::convert::Infallible>(sse_event(&NormalizedEvent::StreamStart {
            request_id: request_id.clone(),
        }));

        let mut guard = FinishGuard::new(session.clone());

        let upstream = match driver.stream(request).await {
            Ok(s) => s,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Upstream request failed");
                guard.finish(FinishOutcome::Failed);
                yield Ok(sse_event(&NormalizedEvent::Error {
                    message: e.to_string(),
                    code: Some("upstream_request_failed".to_string()),
                }));
                yield Ok(sse_event(&NormalizedEvent::Done));
                return;
            }
        };
        futures::pin_mut!(upstream);

        loop {
            let step = tokio::select! {
                () = token.cancelled() => Step::Cancelled,
                item = upstream.next() => Step::Upstream(item),
            };

            match step {
                Step::Cancelled => {
                    info!(request_id = %request_id, "Stream stopped by user");
                    guard.finish(FinishOutcome::Stopped);
                    yield Ok(sse_event(&NormalizedEvent::Done));
                    break;
                }
                Step::Upstream(Some(Ok(NormalizedEvent::MessageDelta { text }))) => {
                    session.mark_streaming();
                    guard.push(&text);
                    yield Ok(sse_event(&NormalizedEvent::MessageDelta { text }));
                }
                Step::Upstream(Some(Ok(NormalizedEvent::Error { message, code }))) => {
                    warn!(request_id = %request_id, error = %message, "Upstream stream error");
                    guard.finish(FinishOutcome::Failed);
                    yield Ok(sse_event(&NormalizedEvent::Error { message, code }));
                    yield Ok(sse_event(&NormalizedEvent::Done));
                    break;
                }
                Step::Upstream(Some(Ok(NormalizedEvent::Done))) | Step::Upstream(None) => {
                    info!(request_id = %request_id, "Stream complete");
                    guard.finish(FinishOutcome::Completed);
                    yield Ok(sse_event(&NormalizedEvent::Done));
                    break;
                }
                Step::Upstream(Some(Ok(other @ NormalizedEvent::StreamStart { .. }))) => {
                    yield Ok(sse_event(&other));
                }
                Step::Upstream(Some(Err(e))) => {
                    warn!(request_id = %request_id, error = %e, "Upstream stream failed");
                    guard.finish(FinishOutcome::Failed);
                    yield Ok(sse_event(&NormalizedEvent::Error {
                        message: e.to_string(),
                        code: None,
                    }));
                    yield Ok(sse_event(&NormalizedEvent::Done));
                    break;
                }
            }
        }
    };

    let body = axum::body::Body::from_stream(sse_stream);
    build_sse_response(body)
}

#[derive(Debug, Serialize)]
struct StopResponse {
    stopped: bool,
}

/// POST /api/chat/stop - Cancel the in-flight response.
async fn api_chat_stop(State(state): State<AppState>) -> Json<StopResponse> {
    let stopped = state.session.stop();
    if stopped {
        info!(name: "chat.stopped", "In-flight response stopped");
    }
    Json(StopResponse { stopped })
}

#[derive(Debug, Serialize)]
struct MessageDto {
    id: String,
    role: crate::llm::MessageRole,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatStateDto {
    status: ChatStatus,
    messages: Vec<MessageDto>,
}

/// GET /api/chat/state - Conversation snapshot for page hydration.
async fn api_chat_state(State(state): State<AppState>) -> Json<ChatStateDto> {
    let messages = state
        .session
        .messages()
        .iter()
        .map(|m| MessageDto {
            id: m.id.clone(),
            role: m.role,
            text: m.text(),
            duration_ms: state.session.duration_ms(&m.id),
        })
        .collect();

    Json(ChatStateDto {
        status: state.session.status(),
        messages,
    })
}

/// DELETE /api/chat - Clear the conversation.
async fn api_chat_clear(State(state): State<AppState>) -> Response {
    match state.session.clear() {
        Ok(()) => {
            info!(name: "chat.cleared", "Conversation cleared");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(_) => error_json(
            StatusCode::CONFLICT,
            "cannot clear while a response is in flight",
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE helpers
// ─────────────────────────────────────────────────────────────────────────────

fn single_error_sse(message: &str) -> Response {
    let err = NormalizedEvent::Error {
        message: message.to_string(),
        code: None,
    };
    let done = NormalizedEvent::Done;

    let payload = format!("{}{}", sse_event(&err), sse_event(&done));
    let body = axum::body::Body::from(payload);
    build_sse_response(body)
}

fn build_sse_response(body: axum::body::Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert("Content-Type", "text/event-stream".parse().unwrap());
    h.insert("Cache-Control", "no-cache".parse().unwrap());
    h.insert("Connection", "keep-alive".parse().unwrap());
    h.insert("X-Accel-Buffering", "no".parse().unwrap());
    resp
}
