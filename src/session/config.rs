use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of one interview session, fixed for the session's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for one interview session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Session identifier issued by the interview service
    pub session_id: SessionId,

    /// How long clarification text stays up before recording restarts,
    /// when the service sends a REPEAT without rephrased audio.
    /// Stand-in for "the candidate has read it"; not a real signal.
    /// Default: 2 seconds
    pub clarification_delay: Duration,

    /// How long the skip notice is shown before the next question
    /// Default: 2 seconds
    pub skip_delay: Duration,

    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
}

impl InterviewConfig {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            clarification_delay: Duration::from_millis(2000),
            skip_delay: Duration::from_millis(2000),
            event_capacity: 64,
        }
    }
}
