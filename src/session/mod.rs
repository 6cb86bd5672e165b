//! Interview session orchestration
//!
//! This module provides the `InterviewSession` abstraction that manages:
//! - The turn phase machine (fetch, play, record, submit, branch)
//! - Audio playback and microphone capture through their collaborators
//! - Calls to the remote interview service
//! - Status updates and the completion signal for the presentation layer

mod config;
mod machine;
mod session;
mod status;

pub use config::{InterviewConfig, SessionId};
pub use machine::{
    Effect, Input, InterviewMachine, PlaybackSource, Ticket, MSG_CAPTURE_FAILED,
    MSG_LOAD_QUESTION_FAILED, MSG_MICROPHONE_DENIED, MSG_PLAY_QUESTION_FAILED,
    MSG_RECORDER_FAILED, MSG_RESULT_FAILED, MSG_SUBMIT_FAILED,
};
pub use session::{InterviewSession, SessionHandle};
pub use status::{Phase, SessionEvent, SessionStatus};
