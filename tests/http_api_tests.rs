// Tests for the local control API
//
// Requests go straight into the router with `oneshot`; the session behind
// it runs on scripted collaborators.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use loqa_interview::audio::{AnswerRecording, AudioPlayer, AudioRecorder};
use loqa_interview::{
    create_router, AppState, CompletionRecord, InterviewApi, InterviewConfig, InterviewError,
    InterviewSession, NextQuestion, Phase, Question, SessionHandle, SessionId, TurnOutcome,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

type ApiResult<T> = std::result::Result<T, InterviewError>;

/// Serves the same question forever
struct EndlessApi;

#[async_trait]
impl InterviewApi for EndlessApi {
    async fn next_question(&self, _session: &SessionId) -> ApiResult<NextQuestion> {
        Ok(NextQuestion::Question(Question {
            id: 1,
            text: "Describe a hard bug you fixed.".to_string(),
            level: "Hard".to_string(),
            category: None,
        }))
    }

    async fn submit_answer(&self, _: &SessionId, _: AnswerRecording) -> ApiResult<TurnOutcome> {
        Err(InterviewError::network("answer", "service unavailable"))
    }

    async fn end_session(&self, _session: &SessionId) -> ApiResult<()> {
        Ok(())
    }

    async fn fetch_result(&self, _session: &SessionId) -> ApiResult<CompletionRecord> {
        // Never resolves, so the session stays observable after ending
        std::future::pending().await
    }

    fn question_audio_url(&self, session: &SessionId) -> String {
        format!("http://service/interview/{}/question-audio", session)
    }

    fn resolve_audio_url(&self, raw: &str) -> String {
        raw.to_string()
    }
}

struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, _url: &str) -> ApiResult<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> &str {
        "silent"
    }
}

#[derive(Default)]
struct InstantRecorder {
    recording: AtomicBool,
}

#[async_trait]
impl AudioRecorder for InstantRecorder {
    async fn start(&self) -> ApiResult<()> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> ApiResult<AnswerRecording> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(AnswerRecording::wav(vec![0u8; 44], 500))
    }

    async fn abort(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "instant"
    }
}

fn session() -> InterviewSession {
    InterviewSession::new(
        InterviewConfig::new(SessionId::new("http-1")),
        Arc::new(EndlessApi),
        Arc::new(SilentPlayer),
        Arc::new(InstantRecorder::default()),
    )
}

async fn wait_for_phase(handle: &SessionHandle, phase: Phase) -> Result<()> {
    let mut status = handle.watch_status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| {
        s.phase == phase && (phase != Phase::Recording || s.recording)
    }))
    .await??;
    Ok(())
}

async fn send(app: &Router, method: Method, uri: &str) -> Result<(StatusCode, Value)> {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, body))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let session = session();
    let app = create_router(AppState::new(session.handle()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"OK");

    Ok(())
}

#[tokio::test]
async fn test_status_before_start() -> Result<()> {
    let session = session();
    let app = create_router(AppState::new(session.handle()));

    let (status, body) = send(&app, Method::GET, "/interview/status").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "http-1");
    assert_eq!(body["phase"], "INIT");
    assert_eq!(body["recording"], false);
    assert!(body["error"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_commands_rejected_in_wrong_phase() -> Result<()> {
    let session = session();
    let app = create_router(AppState::new(session.handle()));

    let (status, body) = send(&app, Method::POST, "/interview/answer/submit").await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["phase"], "INIT");

    let (status, _) = send(&app, Method::POST, "/interview/retry").await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn test_submit_then_retry_then_end() -> Result<()> {
    let session = session();
    let handle = session.handle();
    let app = create_router(AppState::new(handle.clone()));
    tokio::spawn(session.run());

    wait_for_phase(&handle, Phase::Recording).await?;

    let (status, body) = send(&app, Method::GET, "/interview/status").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "RECORDING");
    assert_eq!(body["recording"], true);
    assert_eq!(body["question"]["text"], "Describe a hard bug you fixed.");

    let (status, body) = send(&app, Method::POST, "/interview/answer/submit").await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");

    // The scripted service rejects every answer
    wait_for_phase(&handle, Phase::Error).await?;
    let (_, body) = send(&app, Method::GET, "/interview/status").await?;
    assert_eq!(body["error"], "failed to submit answer");

    let (status, _) = send(&app, Method::POST, "/interview/retry").await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_phase(&handle, Phase::Recording).await?;

    let (status, _) = send(&app, Method::POST, "/interview/end").await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_phase(&handle, Phase::FetchingResult).await?;

    let (status, body) = send(&app, Method::POST, "/interview/end").await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["phase"], "FETCHING_RESULT");

    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_event_stream_is_sse() -> Result<()> {
    let session = session();
    let app = create_router(AppState::new(session.handle()));

    let response = app
        .oneshot(Request::builder().uri("/interview/events").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/event-stream"));

    Ok(())
}
