//! HTTP and WebSocket server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat/` (and `/api/chat`) | Answer a message within a session |
//! | `DELETE` | `/api/chat/{session_id}` | Forget a session |
//! | `GET` | `/api/chat/suggestions` | Canned starter questions |
//! | `GET` | `/health` | Readiness summary |
//! | `GET` | `/debug` | Process state dump |
//! | `GET` | `/` | Service banner |
//! | `GET` | `/ws` | WebSocket: retrieval-only replies per text frame |
//!
//! # Error Contract
//!
//! Failures are JSON with a single `detail` field:
//!
//! ```json
//! { "detail": "message must not be empty" }
//! ```
//!
//! # CORS
//!
//! Origins come from `[server].cors_origins`. A `*` entry allows any
//! origin; otherwise the listed origins are allowed with credentials.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tracing::{error, info, warn};

use curriculum_rag_core::models::{ChunkMetadata, RetrievalResult};

use crate::chat::{AnswerPayload, ChatRequest, ChatService, SUGGESTED_QUESTIONS};
use crate::config::Config;
use crate::embedding::select_embedder;
use crate::index::VectorIndex;
use crate::ingest::{load_documents, scan_markdown};
use crate::providers::truncate_chars;

pub const INITIALIZING_REPLY: &str =
    "Sorry, the AI service is still initializing. Please try again in a moment.";
pub const NOTHING_FOUND_REPLY: &str =
    "I couldn't find relevant information in the documentation. Could you please rephrase your question?";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    chat: Arc<ChatService>,
    /// Chunks produced by ingestion at startup.
    documents: usize,
}

impl AppState {
    pub fn new(config: Config, chat: ChatService, documents: usize) -> Self {
        Self {
            config: Arc::new(config),
            chat: Arc::new(chat),
            documents,
        }
    }

    fn index(&self) -> &Arc<VectorIndex> {
        self.chat.index()
    }
}

/// Ingest the markdown corpus, pick an embedder, and open the index.
pub async fn bootstrap(config: &Config) -> Result<AppState> {
    config.ensure_directories()?;

    let chunks = load_documents(&config.paths.markdown_dir, &config.chunking);
    if chunks.is_empty() {
        warn!(
            markdown_dir = %config.paths.markdown_dir.display(),
            "no documents found; starting with an empty index"
        );
    } else {
        info!(chunks = chunks.len(), "processed document chunks");
    }

    let embedder = select_embedder(config).await;
    let index = Arc::new(VectorIndex::from_config(embedder, config));
    index.create_or_load(&chunks).await;

    let chat = ChatService::from_config(index, config);
    Ok(AppState::new(config.clone(), chat, chunks.len()))
}

/// Bootstrap and serve on `[server].bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = bootstrap(config).await?;
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    serve(listener, state).await
}

/// Serve `state` on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    let app = router(state);
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/debug", get(handle_debug))
        .route("/ws", get(handle_ws))
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/", post(handle_chat))
        .route("/api/chat/suggestions", get(handle_suggestions))
        .route("/api/chat/{session_id}", delete(handle_clear_session))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

fn bad_request(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        detail: detail.into(),
    }
}

fn internal(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: detail.into(),
    }
}

// ============ POST /api/chat/ ============

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AnswerPayload>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    match state
        .chat
        .answer(&request.message, request.session_id.as_deref())
        .await
    {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            error!(error = %e, "chat request failed");
            Err(internal(e.to_string()))
        }
    }
}

// ============ DELETE /api/chat/{session_id} ============

async fn handle_clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    state.chat.clear_session(&session_id);
    Json(json!({ "message": "Session cleared" }))
}

// ============ GET /api/chat/suggestions ============

async fn handle_suggestions() -> Json<serde_json::Value> {
    Json(json!({ "questions": SUGGESTED_QUESTIONS }))
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "AI Chatbot API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/api/chat/",
            "suggestions": "/api/chat/suggestions",
            "websocket": "/ws",
            "health": "/health",
            "debug": "/debug",
        }
    }))
}

// ============ GET /health ============

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub vector_store_ready: bool,
    pub services: HealthServices,
}

#[derive(Serialize, Deserialize)]
pub struct HealthServices {
    pub vector_store: bool,
    pub vector_store_initialized: bool,
    pub processor: bool,
    pub documents: usize,
    pub markdown_dir: String,
    pub markdown_dir_exists: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let initialized = state.index().is_initialized().await;
    let markdown_dir = &state.config.paths.markdown_dir;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        vector_store_ready: initialized,
        services: HealthServices {
            vector_store: true,
            vector_store_initialized: initialized,
            processor: true,
            documents: state.documents,
            markdown_dir: markdown_dir.display().to_string(),
            markdown_dir_exists: markdown_dir.is_dir(),
        },
    })
}

// ============ GET /debug ============

async fn handle_debug(State(state): State<AppState>) -> Json<serde_json::Value> {
    let index = state.index();
    let paths = &state.config.paths;

    let mut files = json!({
        "markdown_files": [],
        "markdown_dir_exists": paths.markdown_dir.is_dir(),
    });
    if paths.markdown_dir.is_dir() {
        let dir = paths.markdown_dir.clone();
        match tokio::task::spawn_blocking(move || scan_markdown(&dir)).await {
            Ok(Ok(found)) => {
                files["markdown_files"] = json!(found
                    .iter()
                    .map(|f| f.relative.as_str())
                    .collect::<Vec<_>>());
            }
            Ok(Err(e)) => files["error"] = json!(e.to_string()),
            Err(e) => files["error"] = json!(format!("markdown scan aborted: {}", e)),
        }
    }

    Json(json!({
        "app_state": {
            "is_ready": index.is_initialized().await,
            "index_backend": index.backend_kind().await,
            "indexed_chunks": index.count().await,
            "embedder": index.embedder_name(),
            "documents": state.documents,
            "sessions": state.chat.session_count(),
            "providers": state.chat.provider_chain(),
        },
        "settings": {
            "markdown_dir": paths.markdown_dir.display().to_string(),
            "index_dir": paths.index_dir.display().to_string(),
            "index_file": index.index_file().display().to_string(),
            "upload_dir": paths.upload_dir.display().to_string(),
            "bind": state.config.server.bind,
        },
        "files": files,
    }))
}

// ============ WS /ws ============

#[derive(Deserialize)]
struct WsRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct WsSource {
    page_content: String,
    metadata: ChunkMetadata,
}

#[derive(Serialize)]
struct WsReply {
    response: String,
    sources: Vec<WsSource>,
}

impl WsReply {
    fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            sources: Vec::new(),
        }
    }
}

async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(mut socket: WebSocket, state: AppState) {
    info!("websocket connection established");

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "websocket receive failed");
                break;
            }
        };

        let request: WsRequest = match serde_json::from_str(text.as_str()) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "malformed websocket message, closing");
                break;
            }
        };

        let reply = match ws_answer(&state, &request.message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "failed to process websocket message");
                WsReply::text(format!("Sorry, I encountered an error: {}", e))
            }
        };

        let body = match serde_json::to_string(&reply) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to encode websocket reply");
                break;
            }
        };
        if let Err(e) = socket.send(Message::Text(body.into())).await {
            warn!(error = %e, "websocket send failed");
            break;
        }
    }

    info!("websocket connection closed");
}

/// Retrieval-only reply: raw context, no provider chain, no session.
async fn ws_answer(state: &AppState, message: &str) -> Result<WsReply> {
    let index = state.index();
    if !index.is_initialized().await {
        return Ok(WsReply::text(INITIALIZING_REPLY));
    }

    let results = index
        .try_search(message, state.config.retrieval.ws_search_k)
        .await?;
    Ok(render_ws_reply(&results))
}

fn render_ws_reply(results: &[RetrievalResult]) -> WsReply {
    let context = results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if context.is_empty() {
        return WsReply::text(NOTHING_FOUND_REPLY);
    }

    WsReply {
        response: format!(
            "Based on the available documentation:\n\n{}...",
            truncate_chars(&context, 500)
        ),
        sources: results
            .iter()
            .map(|r| WsSource {
                page_content: truncate_chars(&r.content, 100).to_string(),
                metadata: r.metadata.clone(),
            })
            .collect(),
    }
}
