//! Banter Memory Server
//!
//! HTTP API for the conversational memory subsystem.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use banter_memory::{
    config::Config,
    embedding::FastembedEmbedder,
    generation::{GenerationSettings, OpenAiGenerator},
    memory::{MemoryKind, MemoryStore},
    orchestrator::Orchestrator,
    storage::{LanceDbIndex, TranscriptRow, TranscriptStore},
    writer::WriterStats,
    Error,
};

/// Application state shared across handlers
struct AppState {
    config: Config,
    orchestrator: Orchestrator,
    transcript: Arc<TranscriptStore>,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::default();
    config.validate()?;
    config.ensure_dirs()?;
    tracing::info!("Starting Banter Memory Server on port {}", config.server_port);
    tracing::info!("Data directory: {:?}", config.data_dir);

    // Initialize components
    let embedder = Arc::new(FastembedEmbedder::new(&config)?);
    let index = Arc::new(LanceDbIndex::new(&config).await?);
    let store = Arc::new(MemoryStore::new(embedder, index));
    let transcript = Arc::new(TranscriptStore::new(&config.transcript_db_path())?);
    let generator = Arc::new(OpenAiGenerator::new(GenerationSettings::from_env()));

    let orchestrator = Orchestrator::new(&config, store, generator, transcript.clone())?;

    let state = Arc::new(AppState {
        config: config.clone(),
        orchestrator,
        transcript,
    });

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health))
        // Conversation
        .route("/chat", post(chat))
        // Direct memory access
        .route("/remember", post(remember))
        .route("/recall", post(recall))
        // Audit log
        .route("/transcripts/:subject", get(transcripts))
        // Background writer counters
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    let port = config.server_port;
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn internal_error(e: Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn parse_kind(kind: &str) -> Option<MemoryKind> {
    match kind {
        "user" => Some(MemoryKind::User),
        "agent" => Some(MemoryKind::Agent),
        _ => None,
    }
}

// === Handlers ===

async fn health() -> &'static str {
    "ok"
}

// --- Conversation handlers ---

#[derive(Debug, Deserialize)]
struct ChatRequest {
    subject: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
}

async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let reply = state
        .orchestrator
        .handle_message(&req.subject, &req.message)
        .await
        .map_err(internal_error)?;

    Ok(Json(ChatResponse { reply }))
}

// --- Memory handlers ---

#[derive(Debug, Deserialize)]
struct RememberRequest {
    subject: String,
    kind: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct RememberResponse {
    id: String,
}

async fn remember(
    State(state): State<SharedState>,
    Json(req): Json<RememberRequest>,
) -> Result<Json<RememberResponse>, (StatusCode, String)> {
    let kind = parse_kind(&req.kind)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown memory kind: {}", req.kind)))?;

    let id = state
        .orchestrator
        .store()
        .remember(&req.text, &req.subject, kind)
        .await
        .map_err(internal_error)?;

    Ok(Json(RememberResponse { id: id.to_string() }))
}

#[derive(Debug, Deserialize)]
struct RecallRequest {
    subject: String,
    kind: String,
    query: String,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RecallResponse {
    memories: Vec<String>,
}

async fn recall(
    State(state): State<SharedState>,
    Json(req): Json<RecallRequest>,
) -> Result<Json<RecallResponse>, (StatusCode, String)> {
    let kind = parse_kind(&req.kind)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown memory kind: {}", req.kind)))?;

    let memories = state
        .orchestrator
        .store()
        .recall(
            &req.query,
            &req.subject,
            kind,
            req.limit.unwrap_or(state.config.recall_limit),
        )
        .await
        .map_err(internal_error)?;

    Ok(Json(RecallResponse { memories }))
}

// --- Transcript handlers ---

#[derive(Debug, Deserialize)]
struct TranscriptsQuery {
    limit: Option<usize>,
}

async fn transcripts(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
    Query(query): Query<TranscriptsQuery>,
) -> Result<Json<Vec<TranscriptResponse>>, (StatusCode, String)> {
    let rows = state
        .transcript
        .recent(&subject, query.limit.unwrap_or(20))
        .map_err(internal_error)?;

    Ok(Json(rows.into_iter().map(TranscriptResponse::from).collect()))
}

// --- Stats handlers ---

async fn stats(State(state): State<SharedState>) -> Json<WriterStats> {
    Json(state.orchestrator.writer().stats())
}

// === Response types ===

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    id: i64,
    subject: String,
    message: String,
    reply: String,
    created_at: String,
}

impl From<TranscriptRow> for TranscriptResponse {
    fn from(row: TranscriptRow) -> Self {
        Self {
            id: row.id,
            subject: row.subject,
            message: row.message,
            reply: row.reply,
            created_at: row.created_at.to_rfc3339(),
        }
    }
}
