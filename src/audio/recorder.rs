use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource};
use super::wav::AnswerBuffer;
use crate::error::{InterviewError, Result};

/// One captured answer, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRecording {
    /// Encoded audio (WAV)
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub duration_ms: u64,
}

impl AnswerRecording {
    pub fn wav(bytes: Vec<u8>, duration_ms: u64) -> Self {
        Self {
            bytes,
            mime_type: "audio/wav".to_string(),
            file_name: "answer.wav".to_string(),
            duration_ms,
        }
    }
}

/// Microphone capture, start/stop controlled
///
/// The orchestrator guarantees a single active capture; implementations
/// only need to reject overlapping starts.
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    /// Open the input device and begin buffering.
    /// Device or permission problems are reported as `InterviewError::MediaPermission`.
    async fn start(&self) -> Result<()>;

    /// Close the device and hand over everything captured since `start`
    async fn stop(&self) -> Result<AnswerRecording>;

    /// Close the device and throw the captured audio away (no-op when idle)
    async fn abort(&self);

    fn is_recording(&self) -> bool;

    fn name(&self) -> &str;
}

type BackendFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn AudioBackend>> + Send + Sync>;

struct ActiveCapture {
    backend: Box<dyn AudioBackend>,
    buffer: Arc<Mutex<AnswerBuffer>>,
    collector: JoinHandle<()>,
}

/// Recorder built on an `AudioBackend`, encoding answers as WAV
pub struct CaptureRecorder {
    factory: BackendFactory,
    config: AudioBackendConfig,
    active: tokio::sync::Mutex<Option<ActiveCapture>>,
    recording: AtomicBool,
}

impl CaptureRecorder {
    /// Recorder that opens a fresh backend for `source` on every start
    pub fn new(source: AudioSource, config: AudioBackendConfig) -> Self {
        let backend_config = config.clone();
        Self::with_factory(config, move || {
            AudioBackendFactory::create(&source, backend_config.clone())
        })
    }

    /// Recorder with a custom backend factory
    pub fn with_factory<F>(config: AudioBackendConfig, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn AudioBackend>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            config,
            active: tokio::sync::Mutex::new(None),
            recording: AtomicBool::new(false),
        }
    }

    async fn shut_down(capture: &mut ActiveCapture) {
        if let Err(e) = capture.backend.stop().await {
            error!("Failed to stop audio backend: {}", e);
        }
    }
}

#[async_trait]
impl AudioRecorder for CaptureRecorder {
    async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(InterviewError::Capture("recorder is already active".to_string()));
        }

        let mut backend = (self.factory)()
            .map_err(|e| InterviewError::MediaPermission(format!("{:#}", e)))?;

        let mut audio_rx = backend
            .start()
            .await
            .map_err(|e| InterviewError::MediaPermission(format!("{:#}", e)))?;

        info!("Recording answer from {}", backend.name());

        let buffer = Arc::new(Mutex::new(AnswerBuffer::new(
            self.config.target_sample_rate,
            self.config.target_channels,
        )));

        let sink = Arc::clone(&buffer);
        let collector = tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                match sink.lock() {
                    Ok(mut buffer) => buffer.push(frame),
                    Err(_) => break,
                }
            }
        });

        *active = Some(ActiveCapture {
            backend,
            buffer,
            collector,
        });
        self.recording.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn stop(&self) -> Result<AnswerRecording> {
        let mut capture = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| InterviewError::Capture("recorder is not active".to_string()))?;
        self.recording.store(false, Ordering::SeqCst);

        Self::shut_down(&mut capture).await;

        // Backend stop closes the frame channel; drain what is left
        if let Err(e) = capture.collector.await {
            error!("Capture collector panicked: {}", e);
        }

        let buffer = capture
            .buffer
            .lock()
            .map_err(|_| InterviewError::Capture("capture buffer poisoned".to_string()))?;

        if buffer.is_empty() {
            warn!("Stopped recording with no captured audio");
        }

        let bytes = buffer
            .to_wav()
            .map_err(|e| InterviewError::Capture(format!("{:#}", e)))?;

        info!(
            "Answer captured: {} samples, {} ms, {} bytes",
            buffer.sample_count(),
            buffer.duration_ms(),
            bytes.len()
        );

        Ok(AnswerRecording::wav(bytes, buffer.duration_ms()))
    }

    async fn abort(&self) {
        let capture = self.active.lock().await.take();
        self.recording.store(false, Ordering::SeqCst);

        if let Some(mut capture) = capture {
            info!("Discarding in-progress recording");
            Self::shut_down(&mut capture).await;
            capture.collector.abort();
        }
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "capture recorder"
    }
}
