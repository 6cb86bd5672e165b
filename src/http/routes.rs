use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/interview/status", get(handlers::get_status))
        .route("/interview/events", get(handlers::stream_events))
        // Candidate actions
        .route("/interview/answer/submit", post(handlers::submit_answer))
        .route("/interview/retry", post(handlers::retry))
        .route("/interview/end", post(handlers::end_interview))
        // The UI is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
