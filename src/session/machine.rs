//! Interview turn state machine
//!
//! `InterviewMachine` is synchronous and does no I/O. It consumes `Input`s
//! (commands from the candidate and completions of earlier effects) and
//! returns the `Effect`s the driver must carry out. Every awaited effect is
//! stamped with a ticket; a completion whose ticket is no longer current
//! belongs to an abandoned attempt and is dropped.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::{InterviewConfig, SessionId};
use super::status::{Phase, SessionStatus};
use crate::audio::AnswerRecording;
use crate::error::InterviewError;
use crate::service::{CompletionRecord, NextQuestion, Question, TurnOutcome};

pub const MSG_LOAD_QUESTION_FAILED: &str = "failed to load question";
pub const MSG_PLAY_QUESTION_FAILED: &str = "failed to play question audio";
pub const MSG_MICROPHONE_DENIED: &str = "microphone access denied, please enable the microphone";
pub const MSG_RECORDER_FAILED: &str = "failed to start recording";
pub const MSG_CAPTURE_FAILED: &str = "failed to capture answer";
pub const MSG_SUBMIT_FAILED: &str = "failed to submit answer";
pub const MSG_RESULT_FAILED: &str = "failed to load interview result";

/// Identity of one asynchronous attempt
pub type Ticket = u64;

/// What a playback effect should play
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSource {
    /// Audio of the current question, served by the interview service
    Question,
    /// Audio URL returned with a turn outcome (may be relative)
    Url(String),
}

/// Side effects requested by the machine
#[derive(Debug, PartialEq)]
pub enum Effect {
    FetchQuestion { ticket: Ticket },
    PlayAudio { ticket: Ticket, source: PlaybackSource },
    StartRecording { ticket: Ticket },
    StopRecording { ticket: Ticket },
    SubmitAnswer { ticket: Ticket, recording: AnswerRecording },
    /// Synthetic playback: report completion after `duration`
    Delay { ticket: Ticket, duration: Duration },
    EndSession { ticket: Ticket },
    FetchResult { ticket: Ticket },
    /// Abandon the current playback (no completion expected)
    StopPlayback,
    /// Stop capture and throw the audio away (no completion expected)
    AbortRecording,
    /// Completion signal: the interview is over, the result is being fetched
    SignalFinished,
    PublishResult(CompletionRecord),
}

/// Inputs accepted by the machine
#[derive(Debug)]
pub enum Input {
    Begin,
    /// Candidate finished speaking
    StopAndSubmit,
    /// Candidate confirmed ending the interview now
    EndInterview,
    /// Re-attempt whatever put the session into `Phase::Error`
    Retry,

    QuestionFetched {
        ticket: Ticket,
        result: Result<NextQuestion, InterviewError>,
    },
    PlaybackFinished {
        ticket: Ticket,
        result: Result<(), InterviewError>,
    },
    RecorderStarted {
        ticket: Ticket,
        result: Result<(), InterviewError>,
    },
    RecordingStopped {
        ticket: Ticket,
        result: Result<AnswerRecording, InterviewError>,
    },
    AnswerSubmitted {
        ticket: Ticket,
        result: Result<TurnOutcome, InterviewError>,
    },
    DelayElapsed {
        ticket: Ticket,
    },
    SessionEnded {
        ticket: Ticket,
        result: Result<(), InterviewError>,
    },
    ResultFetched {
        ticket: Ticket,
        result: Result<CompletionRecord, InterviewError>,
    },
}

impl Input {
    fn ticket(&self) -> Option<Ticket> {
        match self {
            Input::QuestionFetched { ticket, .. }
            | Input::PlaybackFinished { ticket, .. }
            | Input::RecorderStarted { ticket, .. }
            | Input::RecordingStopped { ticket, .. }
            | Input::AnswerSubmitted { ticket, .. }
            | Input::DelayElapsed { ticket }
            | Input::SessionEnded { ticket, .. }
            | Input::ResultFetched { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}

/// Where to go once an interlude (feedback, rephrase, notice) is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterInterlude {
    FetchQuestion,
    Record,
}

/// How a retry resumes a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    FetchQuestion,
    ReplayQuestion,
    Record,
    FetchResult,
}

/// Interview session phase machine
pub struct InterviewMachine {
    session_id: SessionId,
    clarification_delay: Duration,
    skip_delay: Duration,

    phase: Phase,
    message: String,

    /// Ticket of the single outstanding awaited effect
    ticket: Ticket,

    question: Option<Question>,
    recorder_active: bool,
    after_interlude: Option<AfterInterlude>,

    /// Set only in `Phase::Error`
    failure: Option<(Resume, &'static str)>,

    record: Option<CompletionRecord>,
}

impl InterviewMachine {
    pub fn new(config: &InterviewConfig) -> Self {
        Self {
            session_id: config.session_id.clone(),
            clarification_delay: config.clarification_delay,
            skip_delay: config.skip_delay,
            phase: Phase::Init,
            message: "Preparing interview...".to_string(),
            ticket: 0,
            question: None,
            recorder_active: false,
            after_interlude: None,
            failure: None,
            record: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder_active
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.map(|(_, message)| message)
    }

    pub fn record(&self) -> Option<&CompletionRecord> {
        self.record.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id.clone(),
            phase: self.phase,
            message: self.message.clone(),
            question: self.question.clone(),
            error: self.error().map(str::to_string),
            recording: self.recorder_active,
            updated_at: Utc::now(),
        }
    }

    /// Advance the machine by one input
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        if let Some(ticket) = input.ticket() {
            if ticket != self.ticket {
                return self.discard_stale(input);
            }
        }

        match input {
            Input::Begin => self.on_begin(),
            Input::StopAndSubmit => self.on_stop_and_submit(),
            Input::EndInterview => self.on_end_interview(),
            Input::Retry => self.on_retry(),
            Input::QuestionFetched { result, .. } => self.on_question_fetched(result),
            Input::PlaybackFinished { result, .. } => self.on_playback_finished(result),
            Input::RecorderStarted { result, .. } => self.on_recorder_started(result),
            Input::RecordingStopped { result, .. } => self.on_recording_stopped(result),
            Input::AnswerSubmitted { result, .. } => self.on_answer_submitted(result),
            Input::DelayElapsed { .. } => self.on_delay_elapsed(),
            Input::SessionEnded { result, .. } => self.on_session_ended(result),
            Input::ResultFetched { result, .. } => self.on_result_fetched(result),
        }
    }

    fn discard_stale(&mut self, input: Input) -> Vec<Effect> {
        debug!("Ignoring stale completion in {:?}: {:?}", self.phase, input);

        // A capture that came up after we moved on still holds the microphone
        match input {
            Input::RecorderStarted { result: Ok(()), .. } => vec![Effect::AbortRecording],
            _ => Vec::new(),
        }
    }

    fn next_ticket(&mut self) -> Ticket {
        self.ticket += 1;
        self.ticket
    }

    fn enter(&mut self, phase: Phase, message: impl Into<String>) {
        let message = message.into();
        if phase != self.phase {
            info!("Interview {}: {:?} -> {:?}", self.session_id, self.phase, phase);
        }
        self.phase = phase;
        self.message = message;
        if phase != Phase::Error {
            self.failure = None;
        }
    }

    fn fail(&mut self, resume: Resume, message: &'static str, error: InterviewError) -> Vec<Effect> {
        warn!(
            "Interview {} failed in {:?}: {} ({})",
            self.session_id, self.phase, message, error
        );

        // Nothing outstanding may complete into the error phase
        self.next_ticket();
        self.recorder_active = false;
        self.after_interlude = None;
        self.enter(Phase::Error, message);
        self.failure = Some((resume, message));
        Vec::new()
    }

    fn ignore(&self, what: &str) -> Vec<Effect> {
        debug!("Ignoring {} in {:?}", what, self.phase);
        Vec::new()
    }

    // ------------------------------------------------------------------
    // Phase entries
    // ------------------------------------------------------------------

    fn fetch_question(&mut self) -> Vec<Effect> {
        self.enter(Phase::FetchingQuestion, "Fetching next question...");
        let ticket = self.next_ticket();
        vec![Effect::FetchQuestion { ticket }]
    }

    fn play_question(&mut self) -> Vec<Effect> {
        self.enter(Phase::PlayingQuestion, "Interviewer is speaking...");
        let ticket = self.next_ticket();
        vec![Effect::PlayAudio {
            ticket,
            source: PlaybackSource::Question,
        }]
    }

    fn start_recording(&mut self) -> Vec<Effect> {
        self.enter(Phase::Recording, "Listening... (stop when finished)");
        self.recorder_active = false;
        let ticket = self.next_ticket();
        vec![Effect::StartRecording { ticket }]
    }

    /// Play `audio_url`, or show the message for `delay` when there is no audio
    fn interlude(
        &mut self,
        message: String,
        audio_url: Option<String>,
        delay: Duration,
        after: AfterInterlude,
    ) -> Vec<Effect> {
        self.enter(Phase::PlayingFeedback, message);
        self.after_interlude = Some(after);
        let ticket = self.next_ticket();

        match audio_url {
            Some(url) => vec![Effect::PlayAudio {
                ticket,
                source: PlaybackSource::Url(url),
            }],
            None => vec![Effect::Delay {
                ticket,
                duration: delay,
            }],
        }
    }

    fn finish_interlude(&mut self) -> Vec<Effect> {
        match self.after_interlude.take() {
            Some(AfterInterlude::Record) => self.start_recording(),
            Some(AfterInterlude::FetchQuestion) | None => self.fetch_question(),
        }
    }

    fn begin_ending(&mut self, message: &str) -> Vec<Effect> {
        self.enter(Phase::Ending, message);
        let ticket = self.next_ticket();
        vec![Effect::EndSession { ticket }]
    }

    fn fetch_result(&mut self) -> Vec<Effect> {
        self.enter(Phase::FetchingResult, "Fetching interview result...");
        let ticket = self.next_ticket();
        vec![Effect::FetchResult { ticket }]
    }

    // ------------------------------------------------------------------
    // Input handlers
    // ------------------------------------------------------------------

    fn on_begin(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Init {
            return self.ignore("begin");
        }
        info!("Starting interview session {}", self.session_id);
        self.fetch_question()
    }

    fn on_stop_and_submit(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Recording || !self.recorder_active {
            return self.ignore("stop-and-submit without an active recording");
        }

        self.recorder_active = false;
        self.enter(Phase::Submitting, "Processing your answer...");
        let ticket = self.next_ticket();
        vec![Effect::StopRecording { ticket }]
    }

    fn on_end_interview(&mut self) -> Vec<Effect> {
        if self.phase.is_ending() {
            return self.ignore("end request");
        }

        // The session already ended; only its result is missing
        if matches!(self.failure, Some((Resume::FetchResult, _))) && self.phase == Phase::Error {
            info!("Interview {} already ended, fetching result", self.session_id);
            return self.fetch_result();
        }

        info!("Ending interview {} on request", self.session_id);

        let mut effects = Vec::new();
        match self.phase {
            Phase::PlayingQuestion | Phase::PlayingFeedback => effects.push(Effect::StopPlayback),
            Phase::Recording => effects.push(Effect::AbortRecording),
            _ => {}
        }

        self.recorder_active = false;
        self.after_interlude = None;
        effects.extend(self.begin_ending("Ending interview and processing results..."));
        effects
    }

    fn on_retry(&mut self) -> Vec<Effect> {
        let Some((resume, _)) = self.failure.filter(|_| self.phase == Phase::Error) else {
            return self.ignore("retry");
        };

        info!("Retrying after failure: {:?}", resume);

        match resume {
            Resume::FetchQuestion => self.fetch_question(),
            Resume::ReplayQuestion if self.question.is_some() => self.play_question(),
            Resume::ReplayQuestion => self.fetch_question(),
            Resume::Record => self.start_recording(),
            Resume::FetchResult => self.fetch_result(),
        }
    }

    fn on_question_fetched(&mut self, result: Result<NextQuestion, InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::FetchingQuestion {
            return self.ignore("question");
        }

        match result {
            Ok(NextQuestion::Question(question)) => {
                info!(
                    "Question {} ({}): {}",
                    question.id, question.level, question.text
                );
                self.question = Some(question);
                self.play_question()
            }
            Ok(NextQuestion::Completed) => {
                info!("No more questions for session {}", self.session_id);
                self.begin_ending("Interview complete. Processing results...")
            }
            Err(e) => self.fail(Resume::FetchQuestion, MSG_LOAD_QUESTION_FAILED, e),
        }
    }

    fn on_playback_finished(&mut self, result: Result<(), InterviewError>) -> Vec<Effect> {
        match self.phase {
            Phase::PlayingQuestion => match result {
                Ok(()) => self.start_recording(),
                Err(e) => self.fail(Resume::ReplayQuestion, MSG_PLAY_QUESTION_FAILED, e),
            },
            Phase::PlayingFeedback => {
                if let Err(e) = result {
                    warn!("Interlude audio failed, continuing: {}", e);
                }
                self.finish_interlude()
            }
            _ => self.ignore("playback completion"),
        }
    }

    fn on_recorder_started(&mut self, result: Result<(), InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::Recording {
            return self.ignore("recorder start");
        }

        match result {
            Ok(()) => {
                self.recorder_active = true;
                Vec::new()
            }
            Err(e @ InterviewError::MediaPermission(_)) => {
                self.fail(Resume::Record, MSG_MICROPHONE_DENIED, e)
            }
            Err(e) => self.fail(Resume::Record, MSG_RECORDER_FAILED, e),
        }
    }

    fn on_recording_stopped(&mut self, result: Result<AnswerRecording, InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::Submitting {
            return self.ignore("recording");
        }

        match result {
            Ok(recording) => {
                info!(
                    "Submitting answer ({} bytes, {} ms)",
                    recording.bytes.len(),
                    recording.duration_ms
                );
                let ticket = self.next_ticket();
                vec![Effect::SubmitAnswer { ticket, recording }]
            }
            Err(e) => self.fail(Resume::Record, MSG_CAPTURE_FAILED, e),
        }
    }

    fn on_answer_submitted(&mut self, result: Result<TurnOutcome, InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::Submitting {
            return self.ignore("turn outcome");
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(Resume::Record, MSG_SUBMIT_FAILED, e),
        };

        info!("Turn outcome: {:?}", outcome);

        match outcome {
            TurnOutcome::Advance {
                feedback_audio_url: Some(url),
                feedback_text,
            } => self.interlude(
                feedback_text.unwrap_or_else(|| "Interviewer is replying...".to_string()),
                Some(url),
                Duration::ZERO,
                AfterInterlude::FetchQuestion,
            ),
            TurnOutcome::Advance { .. } => self.fetch_question(),
            TurnOutcome::Repeat { audio_url, text } => self.interlude(
                text.unwrap_or_else(|| "Could you please clarify?".to_string()),
                audio_url,
                self.clarification_delay,
                AfterInterlude::Record,
            ),
            TurnOutcome::Skip => self.interlude(
                "Question skipped. Moving next...".to_string(),
                None,
                self.skip_delay,
                AfterInterlude::FetchQuestion,
            ),
            TurnOutcome::Unknown(status) => {
                warn!("Unrecognized turn outcome {:?}, moving to next question", status);
                self.fetch_question()
            }
        }
    }

    fn on_delay_elapsed(&mut self) -> Vec<Effect> {
        if self.phase != Phase::PlayingFeedback {
            return self.ignore("delay");
        }
        self.finish_interlude()
    }

    fn on_session_ended(&mut self, result: Result<(), InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::Ending {
            return self.ignore("end acknowledgement");
        }

        // Ending always moves forward to the result
        if let Err(e) = result {
            warn!("End-session call failed, continuing to result: {}", e);
        }

        let mut effects = vec![Effect::SignalFinished];
        effects.extend(self.fetch_result());
        effects
    }

    fn on_result_fetched(&mut self, result: Result<CompletionRecord, InterviewError>) -> Vec<Effect> {
        if self.phase != Phase::FetchingResult {
            return self.ignore("result");
        }

        match result {
            Ok(record) => {
                info!(
                    "Interview {} finished (score: {:?})",
                    self.session_id, record.total_score
                );
                self.enter(Phase::Result, "Interview finished.");
                self.record = Some(record.clone());
                vec![Effect::PublishResult(record)]
            }
            Err(e) => self.fail(Resume::FetchResult, MSG_RESULT_FAILED, e),
        }
    }
}
