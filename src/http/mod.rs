//! Local HTTP API for the presentation layer
//!
//! This module exposes the running interview to a UI:
//! - GET /health - Health check
//! - GET /interview/status - Current phase, message and question
//! - GET /interview/events - Server-sent status updates and completion signals
//! - POST /interview/answer/submit - Stop recording and submit the answer
//! - POST /interview/retry - Retry the step that failed
//! - POST /interview/end - End the interview now (already confirmed by the UI)

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
