use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use super::messages::{AnswerResponse, CompletionRecord, NextQuestion, TurnOutcome};
use crate::audio::AnswerRecording;
use crate::error::{InterviewError, Result};
use crate::session::SessionId;

/// Remote interview service operations
///
/// Each call is a single request/response exchange; callers never retry
/// the same operation for the same turn.
#[async_trait]
pub trait InterviewApi: Send + Sync {
    /// Fetch the next question, or learn that the interview is over
    async fn next_question(&self, session: &SessionId) -> Result<NextQuestion>;

    /// Upload the recorded answer; the recording is consumed by the call
    async fn submit_answer(
        &self,
        session: &SessionId,
        recording: AnswerRecording,
    ) -> Result<TurnOutcome>;

    async fn end_session(&self, session: &SessionId) -> Result<()>;

    async fn fetch_result(&self, session: &SessionId) -> Result<CompletionRecord>;

    /// Cache-defeating URL of the current question's audio
    fn question_audio_url(&self, session: &SessionId) -> String;

    /// Make a service-provided audio URL absolute
    fn resolve_audio_url(&self, raw: &str) -> String;
}

/// reqwest-backed client for the interview service
#[derive(Clone)]
pub struct HttpInterviewClient {
    client: Client,
    base_url: Url,
}

impl HttpInterviewClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:8080/api`)
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Interview service URL has no path: {}", base_url);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        info!("Interview service client targeting {}", base_url);

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/interview/{session}/{action}` with the session id percent-encoded
    fn endpoint(&self, session: &SessionId, action: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["interview", session.as_str(), action]);
        }
        url
    }

    async fn get_json(&self, operation: &'static str, url: Url) -> Result<Value> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InterviewError::network(operation, e))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| InterviewError::protocol(operation, e))
    }
}

#[async_trait]
impl InterviewApi for HttpInterviewClient {
    async fn next_question(&self, session: &SessionId) -> Result<NextQuestion> {
        let body = self
            .get_json("next-question", self.endpoint(session, "next-question"))
            .await?;

        NextQuestion::from_json(body).map_err(|e| InterviewError::protocol("next-question", e))
    }

    async fn submit_answer(
        &self,
        session: &SessionId,
        recording: AnswerRecording,
    ) -> Result<TurnOutcome> {
        let url = self.endpoint(session, "answer");
        debug!("POST {} ({} bytes)", url, recording.bytes.len());

        let AnswerRecording {
            bytes,
            mime_type,
            file_name,
            ..
        } = recording;

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&mime_type)
            .map_err(|e| InterviewError::network("answer", e))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InterviewError::network("answer", e))?;

        let body = response
            .json::<AnswerResponse>()
            .await
            .map_err(|e| InterviewError::protocol("answer", e))?;

        Ok(TurnOutcome::from(body))
    }

    async fn end_session(&self, session: &SessionId) -> Result<()> {
        let url = self.endpoint(session, "end");
        debug!("POST {}", url);

        self.client
            .post(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InterviewError::network("end", e))?;

        Ok(())
    }

    async fn fetch_result(&self, session: &SessionId) -> Result<CompletionRecord> {
        let body = self
            .get_json("result", self.endpoint(session, "result"))
            .await?;

        serde_json::from_value(body).map_err(|e| InterviewError::protocol("result", e))
    }

    fn question_audio_url(&self, session: &SessionId) -> String {
        let mut url = self.endpoint(session, "question-audio");
        url.query_pairs_mut().append_pair(
            "nocache",
            &chrono::Utc::now().timestamp_millis().to_string(),
        );
        url.to_string()
    }

    fn resolve_audio_url(&self, raw: &str) -> String {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }

        match self.base_url.join(raw) {
            Ok(url) => url.to_string(),
            Err(_) => raw.to_string(),
        }
    }
}
