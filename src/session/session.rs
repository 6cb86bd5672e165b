use super::config::{InterviewConfig, SessionId};
use super::machine::{Effect, Input, InterviewMachine, PlaybackSource};
use super::status::{SessionEvent, SessionStatus};
use crate::audio::{AudioPlayer, AudioRecorder};
use crate::error::InterviewError;
use crate::service::{CompletionRecord, InterviewApi};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tracing::{debug, info, warn};

/// Runs one interview session: owns the phase machine and its collaborators
///
/// Inputs are processed strictly one at a time. Effects that wait on the
/// outside world run on their own tasks and report back through the input
/// queue, tagged with the ticket the machine issued for them.
pub struct InterviewSession {
    session_id: SessionId,
    machine: InterviewMachine,

    api: Arc<dyn InterviewApi>,
    player: Arc<dyn AudioPlayer>,
    recorder: Arc<dyn AudioRecorder>,
    /// Cancels the playback attempt in flight, even one that has not started yet
    playback: Option<oneshot::Sender<()>>,

    input_tx: mpsc::UnboundedSender<Input>,
    input_rx: mpsc::UnboundedReceiver<Input>,

    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    shutdown: Arc<Notify>,
}

/// Cloneable control surface for the presentation layer
#[derive(Clone)]
pub struct SessionHandle {
    input_tx: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    /// Finish the current answer and submit it (no-op unless recording)
    pub fn stop_and_submit(&self) {
        self.send(Input::StopAndSubmit);
    }

    /// End the interview now; the caller is responsible for confirming with the candidate
    pub fn end_interview(&self) {
        self.send(Input::EndInterview);
    }

    /// Re-attempt the step that failed (no-op unless in the error phase)
    pub fn retry(&self) {
        self.send(Input::Retry);
    }

    /// Tear the session down without ending it on the service
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Subscribe to status updates and completion signals
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Latest status snapshot
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch the status snapshot
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    fn send(&self, input: Input) {
        if self.input_tx.send(input).is_err() {
            debug!("Session is no longer running, command dropped");
        }
    }
}

impl InterviewSession {
    /// Create a session; nothing happens until `run` is awaited
    pub fn new(
        config: InterviewConfig,
        api: Arc<dyn InterviewApi>,
        player: Arc<dyn AudioPlayer>,
        recorder: Arc<dyn AudioRecorder>,
    ) -> Self {
        info!(
            "Creating interview session: {} (player: {}, recorder: {})",
            config.session_id,
            player.name(),
            recorder.name()
        );

        let machine = InterviewMachine::new(&config);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (status, _) = watch::channel(machine.status());

        Self {
            session_id: config.session_id,
            machine,
            api,
            player,
            playback: None,
            recorder,
            input_tx,
            input_rx,
            events,
            status,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            input_tx: self.input_tx.clone(),
            events: self.events.clone(),
            status: self.status.subscribe(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Drive the interview until the completion record is obtained
    ///
    /// Returns `InterviewError::Aborted` if the session is shut down first.
    pub async fn run(mut self) -> Result<CompletionRecord, InterviewError> {
        self.apply(Input::Begin);

        let outcome = loop {
            if let Some(record) = self.machine.record() {
                break Ok(record.clone());
            }

            tokio::select! {
                Some(input) = self.input_rx.recv() => self.apply(input),
                _ = self.shutdown.notified() => {
                    info!("Interview session {} shut down", self.session_id);
                    break Err(InterviewError::Aborted);
                }
            }
        };

        self.dispose().await;
        outcome
    }

    fn apply(&mut self, input: Input) {
        let effects = self.machine.handle(input);
        self.publish_status();

        for effect in effects {
            self.execute(effect);
        }
    }

    fn publish_status(&self) {
        let status = self.machine.status();
        let changed = self.status.send_if_modified(|current| {
            if current.same_state(&status) {
                false
            } else {
                *current = status.clone();
                true
            }
        });

        if changed {
            // No subscribers is fine
            let _ = self.events.send(SessionEvent::Status(status));
        }
    }

    fn execute(&mut self, effect: Effect) {
        let tx = self.input_tx.clone();
        let session = self.session_id.clone();

        match effect {
            Effect::FetchQuestion { ticket } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    let result = api.next_question(&session).await;
                    let _ = tx.send(Input::QuestionFetched { ticket, result });
                });
            }

            Effect::PlayAudio { ticket, source } => {
                let url = match source {
                    PlaybackSource::Question => self.api.question_audio_url(&session),
                    PlaybackSource::Url(raw) => self.api.resolve_audio_url(&raw),
                };
                let player = Arc::clone(&self.player);
                let (cancel_tx, cancel_rx) = oneshot::channel();
                self.cancel_playback();
                self.playback = Some(cancel_tx);
                tokio::spawn(async move {
                    let result = tokio::select! {
                        result = player.play(&url) => result,
                        _ = cancel_rx => {
                            debug!("Playback of {} cancelled", url);
                            Err(InterviewError::playback("playback stopped"))
                        }
                    };
                    let _ = tx.send(Input::PlaybackFinished { ticket, result });
                });
            }

            Effect::StartRecording { ticket } => {
                let recorder = Arc::clone(&self.recorder);
                tokio::spawn(async move {
                    let result = recorder.start().await;
                    let _ = tx.send(Input::RecorderStarted { ticket, result });
                });
            }

            Effect::StopRecording { ticket } => {
                let recorder = Arc::clone(&self.recorder);
                tokio::spawn(async move {
                    let result = recorder.stop().await;
                    let _ = tx.send(Input::RecordingStopped { ticket, result });
                });
            }

            Effect::SubmitAnswer { ticket, recording } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    // The recording is consumed (and dropped) by the call
                    let result = api.submit_answer(&session, recording).await;
                    let _ = tx.send(Input::AnswerSubmitted { ticket, result });
                });
            }

            Effect::Delay { ticket, duration } => {
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = tx.send(Input::DelayElapsed { ticket });
                });
            }

            Effect::EndSession { ticket } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    let result = api.end_session(&session).await;
                    let _ = tx.send(Input::SessionEnded { ticket, result });
                });
            }

            Effect::FetchResult { ticket } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    let result = api.fetch_result(&session).await;
                    let _ = tx.send(Input::ResultFetched { ticket, result });
                });
            }

            Effect::StopPlayback => {
                self.cancel_playback();
                self.player.stop();
            }

            Effect::AbortRecording => {
                let recorder = Arc::clone(&self.recorder);
                tokio::spawn(async move {
                    recorder.abort().await;
                });
            }

            Effect::SignalFinished => {
                let _ = self.events.send(SessionEvent::Finished);
            }

            Effect::PublishResult(record) => {
                let _ = self.events.send(SessionEvent::Completed(record));
            }
        }
    }

    fn cancel_playback(&mut self) {
        if let Some(cancel) = self.playback.take() {
            // Already finished is fine
            let _ = cancel.send(());
        }
    }

    /// Release media resources
    async fn dispose(&mut self) {
        self.cancel_playback();
        self.player.stop();
        if self.recorder.is_recording() {
            warn!("Recorder still active at teardown, discarding capture");
        }
        self.recorder.abort().await;
    }
}
