use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::endpoints::{analysis, chat, conversations, health, patients};
use super::types::ApiContext;

/// Build the full API router.
pub fn api_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/health", get(health::liveness))
        .route("/api/chat/send", post(chat::send))
        .route("/api/analysis", post(analysis::analyze))
        .route("/api/conversations", get(conversations::list))
        .route("/api/conversations/:id", get(conversations::get))
        .route(
            "/api/conversations/:id/messages",
            get(conversations::messages),
        )
        .route("/api/patients", post(patients::create))
        .route("/api/patients/:id", get(patients::get))
        .route("/api/patients/:id/diagnoses", get(patients::diagnoses))
        .route("/api/patients/:id/report", get(patients::report))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
