pub mod audio;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod service;
pub mod session;

pub use audio::{
    AnswerRecording, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile,
    AudioFrame, AudioOutput, AudioPlayer, AudioRecorder, AudioSource, CaptureRecorder,
    HttpAudioPlayer, PacedOutput,
};
pub use config::Config;
pub use console::{run_console, spawn_line_reader, CommandConsole, ConsoleAction};
pub use error::InterviewError;
pub use http::{create_router, AppState};
pub use service::{
    CompletionRecord, HttpInterviewClient, InterviewApi, NextQuestion, Question, TurnOutcome,
};
pub use session::{
    InterviewConfig, InterviewSession, Phase, SessionEvent, SessionHandle, SessionId,
    SessionStatus,
};
