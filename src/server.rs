//! HTTP JSON API over the query engine.
//!
//! Each session owns its own document, vector index and conversation. The
//! index is persisted under `<index.namespace>/<session id>`. Requests for
//! one session are serialized through a fair (FIFO) async mutex, so asks
//! are answered in submission order; different sessions run concurrently.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Create a session |
//! | `POST` | `/sessions/{id}/document` | Upload a document (raw body, `Content-Type` header) and build its index |
//! | `POST` | `/sessions/{id}/ask` | `{ "question": "...", "k": 5 }` → `{ answer, sources, trimmed }` |
//! | `GET`  | `/sessions/{id}/conversation` | Conversation turns in order |
//! | `DELETE` | `/sessions/{id}/conversation` | Clear the conversation |
//! | `DELETE` | `/sessions/{id}` | Drop the session and its persisted index |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_not_ready", "message": "index not ready: no document has been indexed" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `index_not_ready` (409),
//! `index_building` (409), `provider_unavailable` (502), `generation_error` (502),
//! `internal` (500).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use query_assistant_core::session::{ConversationTurn, SessionContext};
use query_assistant_core::{AskResponse, RagError};

use crate::assistant::{Assistant, IngestReport};
use crate::config::Config;

/// Largest accepted document upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

type SharedSession = Arc<Mutex<SessionContext>>;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let assistant = Arc::new(Assistant::from_config(config.clone()).await?);
    let app = router(assistant);

    tracing::info!(bind = %bind_addr, "HTTP server listening");
    println!("Query Assistant listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with empty session state.
pub fn router(assistant: Arc<Assistant>) -> Router {
    let state = AppState {
        assistant,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route("/sessions/{id}/document", post(handle_upload_document))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route(
            "/sessions/{id}/conversation",
            get(handle_get_conversation).delete(handle_clear_conversation),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::Extraction(_) | RagError::EmptyDocument | RagError::Configuration(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            RagError::IndexNotReady => (StatusCode::CONFLICT, "index_not_ready"),
            RagError::IndexBuilding => (StatusCode::CONFLICT, "index_building"),
            RagError::ProviderUnavailable(_) => (StatusCode::BAD_GATEWAY, "provider_unavailable"),
            RagError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            RagError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RagError>() {
            Some(rag) => rag.clone().into(),
            None => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: format!("{:#}", err),
            },
        }
    }
}

async fn find_session(state: &AppState, id: &str) -> Result<SharedSession, AppError> {
    let unknown = || not_found(format!("session not found: {}", id));
    let id = Uuid::parse_str(id).map_err(|_| unknown())?;
    state.sessions.read().await.get(&id).cloned().ok_or_else(unknown)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

#[derive(Serialize)]
struct SessionCreated {
    id: Uuid,
    namespace: String,
}

async fn handle_create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let id = Uuid::new_v4();
    let namespace = format!("{}/{}", state.assistant.config().index.namespace, id);
    let session = state.assistant.session_with_id(id, &namespace);
    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(session)));
    tracing::info!(session = %id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { id, namespace }))
}

// ============ DELETE /sessions/{id} ============

/// Unregister the session, wait for its in-flight request, then remove its
/// index from memory and from the database.
async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let unknown = || not_found(format!("session not found: {}", id));
    let uuid = Uuid::parse_str(&id).map_err(|_| unknown())?;
    let session = state
        .sessions
        .write()
        .await
        .remove(&uuid)
        .ok_or_else(unknown)?;

    let session = session.lock().await;
    session.index().clear().await?;
    tracing::info!(session = %uuid, namespace = session.index().namespace(), "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/document ============

async fn handle_upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError> {
    let session = find_session(&state, &id).await?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("Content-Type header is required"))?
        .to_string();
    if body.is_empty() {
        return Err(bad_request("document body must not be empty"));
    }

    let mut session = session.lock().await;
    let report = state
        .assistant
        .ingest_bytes(&mut session, &body, &content_type)
        .await?;
    Ok(Json(report))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if req.k == Some(0) {
        return Err(bad_request("k must be at least 1"));
    }

    let engine = state.assistant.engine();
    let k = req.k.unwrap_or(engine.top_k());

    let mut session = session.lock().await;
    session.conversation_mut().push_question(question);
    let response = engine.ask_with_k(&mut session, question, k).await?;
    Ok(Json(response))
}

// ============ /sessions/{id}/conversation ============

#[derive(Serialize)]
struct ConversationResponse {
    turns: Vec<ConversationTurn>,
}

async fn handle_get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let session = session.lock().await;
    Ok(Json(ConversationResponse {
        turns: session.conversation().turns().to_vec(),
    }))
}

async fn handle_clear_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = find_session(&state, &id).await?;
    session.lock().await.conversation_mut().clear();
    Ok(StatusCode::NO_CONTENT)
}
