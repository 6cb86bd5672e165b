//! Microphone capture and speaker playback via cpal
//!
//! cpal streams are not `Send`, so each stream lives on its own OS thread
//! and is controlled through channels.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::decode::DecodedAudio;
use super::output::AudioOutput;
use super::wav::process_frame;

/// Default input device as a capture backend
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Result<Self> {
        let host = cpal::default_host();
        if host.default_input_device().is_none() {
            bail!("No input device available");
        }

        info!(
            "Microphone backend initialized (target {}Hz, {} channels)",
            config.target_sample_rate, config.target_channels
        );

        Ok(Self {
            config,
            stop_tx: None,
            thread: None,
        })
    }
}

fn open_input_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let supported = device
        .default_input_config()
        .context("Input device has no usable configuration")?;
    let config: StreamConfig = supported.config();

    debug!(
        "Opening input {:?}: {}Hz, {} channels, {:?}",
        device.name().ok(),
        config.sample_rate.0,
        config.channels,
        supported.sample_format()
    );

    match supported.sample_format() {
        SampleFormat::F32 => build_input::<f32>(&device, &config, frame_tx),
        SampleFormat::I16 => build_input::<i16>(&device, &config, frame_tx),
        SampleFormat::U16 => build_input::<u16>(&device, &config, frame_tx),
        other => bail!("Unsupported input sample format: {:?}", other),
    }
}

fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let mut emitted: u64 = 0;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
            let timestamp_ms = emitted * 1000 / (sample_rate as u64 * channels as u64).max(1);
            emitted += samples.len() as u64;

            // Never block the audio thread; a full queue drops the frame
            let _ = frame_tx.try_send(AudioFrame {
                samples,
                sample_rate,
                channels,
                timestamp_ms,
            });
        },
        |err| error!("Microphone stream error: {}", err),
        None,
    )?;

    stream.play().context("Failed to start microphone stream")?;
    Ok(stream)
}

#[async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.thread.is_some() {
            bail!("Already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let thread = std::thread::spawn(move || match open_input_stream(frame_tx) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                // Sender dropped or stop requested
                let _ = stop_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .context("Microphone startup panicked")?
            .map_err(|_| anyhow!("Microphone thread exited during startup"))?;

        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e.context("Failed to open microphone"));
        }

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);

        info!(
            "Microphone capture started (buffer {} ms)",
            self.config.buffer_duration_ms
        );

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        tokio::task::spawn_blocking(move || thread.join())
            .await
            .context("Microphone shutdown panicked")?
            .map_err(|_| anyhow!("Microphone thread panicked"))?;

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Default output device
pub struct CpalOutput;

impl CpalOutput {
    pub fn new() -> Result<Self> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        Ok(Self)
    }
}

/// Sets the flag when the render future is dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioOutput for CpalOutput {
    async fn render(&self, clip: DecodedAudio) -> Result<()> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        let (done_tx, done_rx) = oneshot::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(play_blocking(clip, cancelled));
        });

        done_rx
            .await
            .map_err(|_| anyhow!("Playback thread exited unexpectedly"))?
    }

    fn name(&self) -> &str {
        "cpal speaker"
    }
}

fn play_blocking(clip: DecodedAudio, cancelled: Arc<AtomicBool>) -> Result<()> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    let supported = device
        .default_output_config()
        .context("Output device has no usable configuration")?;
    let config: StreamConfig = supported.config();

    let pcm = Arc::new(to_device_layout(clip, config.sample_rate.0, config.channels));
    let position = Arc::new(AtomicUsize::new(0));

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_output::<f32>(&device, &config, Arc::clone(&pcm), Arc::clone(&position))?,
        SampleFormat::I16 => build_output::<i16>(&device, &config, Arc::clone(&pcm), Arc::clone(&position))?,
        SampleFormat::U16 => build_output::<u16>(&device, &config, Arc::clone(&pcm), Arc::clone(&position))?,
        other => bail!("Unsupported output sample format: {:?}", other),
    };

    stream.play().context("Failed to start speaker stream")?;

    while position.load(Ordering::SeqCst) < pcm.len() && !cancelled.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(20));
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    Ok(())
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    pcm: Arc<Vec<i16>>,
    position: Arc<AtomicUsize>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut pos = position.load(Ordering::SeqCst);
            for slot in data.iter_mut() {
                *slot = match pcm.get(pos) {
                    Some(&sample) => T::from_sample(sample),
                    None => T::EQUILIBRIUM,
                };
                pos += 1;
            }
            position.store(pos.min(pcm.len()), Ordering::SeqCst);
        },
        |err| error!("Speaker stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Resample to the device rate and map channels (mono is duplicated)
fn to_device_layout(clip: DecodedAudio, sample_rate: u32, channels: u16) -> Vec<i16> {
    process_frame(
        AudioFrame {
            samples: clip.samples,
            sample_rate: clip.sample_rate,
            channels: clip.channels,
            timestamp_ms: 0,
        },
        sample_rate,
        channels,
    )
    .samples
}
