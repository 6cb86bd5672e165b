use thiserror::Error;

/// Failures surfaced to the interview orchestrator.
///
/// Every variant ends the current attempt only; the session stays resumable.
#[derive(Debug, Error)]
pub enum InterviewError {
    /// Microphone could not be opened (denied, missing, busy)
    #[error("Microphone unavailable: {0}")]
    MediaPermission(String),

    /// Capture started but the recorded audio could not be collected
    #[error("Audio capture failed: {0}")]
    Capture(String),

    /// Question, feedback or rephrase audio failed to load or play
    #[error("Playback failed: {0}")]
    Playback(String),

    /// A remote call failed at the transport level or with a non-success status
    #[error("{operation} request failed: {reason}")]
    Network {
        operation: &'static str,
        reason: String,
    },

    /// The service answered with a body we could not decode
    #[error("Unexpected {operation} response: {reason}")]
    Protocol {
        operation: &'static str,
        reason: String,
    },

    #[error("Session aborted")]
    Aborted,
}

impl InterviewError {
    pub fn network(operation: &'static str, reason: impl ToString) -> Self {
        Self::Network {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn protocol(operation: &'static str, reason: impl ToString) -> Self {
        Self::Protocol {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn playback(reason: impl ToString) -> Self {
        Self::Playback(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InterviewError>;
