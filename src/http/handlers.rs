use super::state::AppState;
use crate::session::{Phase, SessionEvent, SessionStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json},
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: String,
    pub phase: Phase,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub phase: Phase,
}

fn accepted(status: &SessionStatus, what: &str) -> axum::response::Response {
    (
        StatusCode::ACCEPTED,
        Json(CommandResponse {
            status: "accepted".to_string(),
            phase: status.phase,
            message: what.to_string(),
        }),
    )
        .into_response()
}

fn conflict(status: &SessionStatus, error: String) -> axum::response::Response {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error,
            phase: status.phase,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /interview/status
/// Current phase, status line, question and error
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.status()))
}

/// GET /interview/events
/// Server-sent stream of status updates and completion signals
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.session.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = match &event {
                        SessionEvent::Status(_) => "status",
                        SessionEvent::Finished => "finished",
                        SessionEvent::Completed(_) => "completed",
                    };
                    return Some((Event::default().event(name).json_data(&event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /interview/answer/submit
/// Stop the recording and submit the answer
pub async fn submit_answer(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session.status();

    if status.phase != Phase::Recording || !status.recording {
        return conflict(&status, "No answer is being recorded".to_string());
    }

    info!("Answer submission requested");
    state.session.stop_and_submit();
    accepted(&status, "Submitting answer")
}

/// POST /interview/retry
/// Retry the step that failed
pub async fn retry(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session.status();

    if status.phase != Phase::Error {
        return conflict(&status, "Nothing to retry".to_string());
    }

    info!("Retry requested after: {}", status.message);
    state.session.retry();
    accepted(&status, "Retrying")
}

/// POST /interview/end
/// End the interview now; the UI has already asked the candidate to confirm
pub async fn end_interview(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session.status();

    if status.phase.is_ending() {
        return conflict(&status, "Interview is already ending".to_string());
    }

    info!("End of interview requested");
    state.session.end_interview();
    accepted(&status, "Ending interview")
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
