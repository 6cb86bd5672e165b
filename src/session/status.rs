use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SessionId;
use crate::service::{CompletionRecord, Question};

/// Discrete phase of the interview orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    FetchingQuestion,
    PlayingQuestion,
    Recording,
    Submitting,
    /// Feedback, rephrase or notice between turns (audio or timed text)
    PlayingFeedback,
    Ending,
    FetchingResult,
    /// Terminal
    Result,
    /// Attempt failed; waiting for retry or manual end
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Result)
    }

    /// Whether the session is already winding down
    pub fn is_ending(&self) -> bool {
        matches!(self, Phase::Ending | Phase::FetchingResult | Phase::Result)
    }
}

/// Snapshot of what the presentation layer should render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,

    pub phase: Phase,

    /// Human-readable status line
    pub message: String,

    /// Question currently being asked, if any
    pub question: Option<Question>,

    /// Set only while in `Phase::Error`
    pub error: Option<String>,

    /// Whether the microphone is capturing and "stop and submit" is meaningful
    pub recording: bool,

    /// When this snapshot was produced
    pub updated_at: DateTime<Utc>,
}

impl SessionStatus {
    /// Compare everything except the timestamp
    pub fn same_state(&self, other: &SessionStatus) -> bool {
        self.phase == other.phase
            && self.message == other.message
            && self.question == other.question
            && self.error == other.error
            && self.recording == other.recording
    }
}

/// Items on the session's outbound event stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Phase or status message changed
    Status(SessionStatus),

    /// Interview finished on the service side; the result is being fetched
    Finished,

    /// Completion record obtained; the session is over
    Completed(CompletionRecord),
}
