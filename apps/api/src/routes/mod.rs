pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

/// Scanned transcripts and PDFs exceed axum's 2 MB default.
const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024; // 25 MB (multipart overhead)

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/sessions", post(handlers::create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/v1/sessions/:id/profile",
            put(handlers::update_profile),
        )
        .route(
            "/api/v1/sessions/:id/prompts",
            get(handlers::get_prompts).put(handlers::update_prompts),
        )
        .route(
            "/api/v1/sessions/:id/prompts/save",
            post(handlers::save_prompts),
        )
        // Document ingestion and analysis
        .route(
            "/api/v1/sessions/:id/documents",
            post(handlers::upload_documents).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/sessions/:id/analyze", post(handlers::analyze))
        .route("/api/v1/sessions/:id/report", get(handlers::get_report))
        // Knowledge and diagnostics
        .route("/api/v1/knowledge", get(handlers::query_knowledge))
        .route("/api/v1/status", get(handlers::status))
        .with_state(state)
}
