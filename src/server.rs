//! HTTP adapter over the caller-facing operations.
//!
//! A thin JSON surface — ask, summarize, list, remove, health — with no
//! logic of its own beyond request decoding and error mapping. The index
//! and answering engine are constructed once at startup and shared across
//! handlers; the embedding model load happens here, not per request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question (optional source scope) |
//! | `POST` | `/summarize` | Summarize one ingested document |
//! | `GET`  | `/documents` | Per-source chunk/page statistics |
//! | `DELETE` | `/documents/{source}` | Remove a document from the index |
//! | `GET`  | `/health` | Health check |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "completion_unavailable", "message": "..." } }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::AnswerEngine;
use crate::ask::ask;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::index::VectorIndex;
use crate::sources::{list_source_stats, remove_source};
use crate::summarize::summarize_source;

/// Shared application state passed to all route handlers.
struct AppState {
    config: Arc<Config>,
    index: Arc<VectorIndex>,
    /// Absent when the completion API key is not configured; retrieval
    /// endpoints still work.
    engine: Option<Arc<AnswerEngine>>,
}

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let embedder = embedding::load_embedder(&config.embedding);
    let index = Arc::new(VectorIndex::new(pool, embedder));

    let engine = match CompletionClient::new(&config.completion) {
        Ok(client) => Some(Arc::new(AnswerEngine::new(Arc::new(client)))),
        Err(e) => {
            tracing::warn!("completion service unavailable: {e}; ask/summarize disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        index,
        engine,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/summarize", post(handle_summarize))
        .route("/documents", get(handle_documents))
        .route("/documents/{source}", delete(handle_delete))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind = &config.server.bind;
    println!("Serving on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct SummarizeRequest {
    source: String,
}

async fn handle_ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Response {
    if req.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "question must not be empty");
    }

    let Some(engine) = &state.engine else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "completion_unavailable",
            "completion service is not configured",
        );
    };

    match ask(
        &state.index,
        engine,
        &state.config,
        &req.question,
        req.source.as_deref(),
    )
    .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &format!("{e:#}")),
    }
}

async fn handle_summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> Response {
    let Some(engine) = &state.engine else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "completion_unavailable",
            "completion service is not configured",
        );
    };

    match summarize_source(&state.index, engine, &state.config, &req.source).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &format!("{e:#}")),
    }
}

async fn handle_documents(State(state): State<Arc<AppState>>) -> Response {
    match list_source_stats(state.index.pool()).await {
        Ok(stats) => {
            let total_chunks: i64 = stats.iter().map(|s| s.chunks).sum();
            Json(serde_json::json!({
                "documents": stats,
                "total_chunks": total_chunks,
            }))
            .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &format!("{e:#}")),
    }
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Response {
    match remove_source(&state.index, state.index.pool(), &source).await {
        Ok(deleted) => Json(serde_json::json!({
            "source": source,
            "deleted": deleted,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &format!("{e:#}")),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let info = state.index.describe().await.ok();
    Json(serde_json::json!({
        "status": "healthy",
        "index": info,
        "semantic_search": state.index.semantic_enabled(),
        "completion_available": state.engine.is_some(),
    }))
    .into_response()
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": { "code": code, "message": message }
        })),
    )
        .into_response()
}
