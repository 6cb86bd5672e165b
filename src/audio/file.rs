use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!(
                "Unsupported WAV format: {:?} {} bits (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the file into frames of `frame_ms` each
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let samples_per_frame = (self.sample_rate as u64 * self.channels as u64 * frame_ms / 1000)
            .max(self.channels as u64) as usize;

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Capture backend that replays a WAV file as if it were being spoken
///
/// Frames are paced in real time by default so a recording lasts as long
/// as the file; the stream simply ends when the file runs out.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    paced: bool,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: AudioBackendConfig) -> Self {
        Self {
            path,
            config,
            paced: true,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Deliver all frames immediately instead of in real time
    pub fn without_pacing(mut self) -> Self {
        self.paced = false;
        self
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            bail!("Already capturing");
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("WAV loader panicked")??;

        let frame_ms = self.config.buffer_duration_ms.max(1);
        let frames = audio.frames(frame_ms);
        let (tx, rx) = mpsc::channel(frames.len().max(1));

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);
        let paced = self.paced;

        self.task = Some(tokio::spawn(async move {
            for frame in frames {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(frame).await.is_err() {
                    break;
                }
                if paced {
                    tokio::time::sleep(Duration::from_millis(frame_ms)).await;
                }
            }
        }));

        info!("Replaying {} as microphone input", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("File replay task panicked: {}", e);
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}
