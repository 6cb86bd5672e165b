use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Notify;
use tracing::{debug, info};

use super::decode::{decode_audio, extension_hint};
use super::output::AudioOutput;
use crate::error::{InterviewError, Result};

/// Plays remote audio resources
///
/// Each `play` call resolves exactly once: `Ok` when the clip finished,
/// `Err(Playback)` when it could not be fetched, decoded or rendered.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, url: &str) -> Result<()>;

    /// Abandon whatever is playing; the pending `play` resolves with an error
    ///
    /// Only a `play` that is already running is interrupted. To cancel one
    /// particular attempt, drop its future.
    fn stop(&self);

    fn name(&self) -> &str;
}

/// Downloads a clip over HTTP, decodes it and renders it on an `AudioOutput`
pub struct HttpAudioPlayer {
    client: Client,
    output: Arc<dyn AudioOutput>,
    stop_signal: Notify,
}

impl HttpAudioPlayer {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self::with_client(Client::new(), output)
    }

    pub fn with_client(client: Client, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            client,
            output,
            stop_signal: Notify::new(),
        }
    }

    async fn fetch_and_render(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(InterviewError::playback)?;

        let bytes = response.bytes().await.map_err(InterviewError::playback)?;
        debug!("Fetched {} bytes of audio from {}", bytes.len(), url);

        let extension = extension_hint(url).map(str::to_string);
        let clip = tokio::task::spawn_blocking(move || {
            decode_audio(bytes.to_vec(), extension.as_deref())
        })
        .await
        .map_err(InterviewError::playback)?
        .map_err(|e| InterviewError::playback(format!("{:#}", e)))?;

        info!(
            "Playing {} ms of audio on {}",
            clip.duration_ms(),
            self.output.name()
        );

        self.output
            .render(clip)
            .await
            .map_err(|e| InterviewError::playback(format!("{:#}", e)))
    }
}

#[async_trait]
impl AudioPlayer for HttpAudioPlayer {
    async fn play(&self, url: &str) -> Result<()> {
        tokio::select! {
            result = self.fetch_and_render(url) => result,
            _ = self.stop_signal.notified() => {
                debug!("Playback of {} stopped", url);
                Err(InterviewError::playback("playback stopped"))
            }
        }
    }

    fn stop(&self) {
        self.stop_signal.notify_waiters();
    }

    fn name(&self) -> &str {
        "http audio player"
    }
}
