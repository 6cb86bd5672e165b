use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::AudioFrame;

/// In-memory accumulator for one spoken answer
///
/// Frames are normalized to the target format on the way in, so the
/// buffer always holds a single sample rate and channel layout.
#[derive(Debug)]
pub struct AnswerBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl AnswerBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    pub fn push(&mut self, frame: AudioFrame) {
        let frame = process_frame(frame, self.sample_rate, self.channels);
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64).max(1)
    }

    /// Encode as a 16-bit PCM WAV file
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate, self.channels)
    }
}

/// Encode interleaved i16 samples as a WAV file in memory
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;

        for &sample in samples {
            writer.write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize()
            .context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}

/// Process audio frame: resample and convert to target format
pub fn process_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    // Resample if needed
    if processed.sample_rate != target_sample_rate {
        processed = resample_frame(processed, target_sample_rate);
    }

    // Match the channel layout
    if processed.channels != target_channels {
        processed = remix_channels(processed, target_channels);
    }

    processed
}

/// Resample audio frame by nearest-neighbour frame selection
fn resample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || target_rate == 0 || frame.sample_rate == 0 {
        return frame;
    }

    // Pick whole sample frames so interleaved channels stay aligned
    let channels = frame.channels.max(1) as usize;
    let source_frames = frame.samples.len() / channels;
    let target_frames =
        (source_frames as u64 * target_rate as u64 / frame.sample_rate as u64) as usize;

    let mut resampled = Vec::with_capacity(target_frames * channels);
    for i in 0..target_frames {
        let src = (i as u64 * frame.sample_rate as u64 / target_rate as u64) as usize;
        let src = src.min(source_frames.saturating_sub(1));
        resampled.extend_from_slice(&frame.samples[src * channels..(src + 1) * channels]);
    }

    AudioFrame {
        samples: resampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert between channel layouts
///
/// Downmixing to mono averages every interleaved frame. Otherwise each
/// target channel copies the matching source channel, and channels past
/// the source count repeat the last one (mono is duplicated).
fn remix_channels(frame: AudioFrame, target_channels: u16) -> AudioFrame {
    let source = frame.channels.max(1) as usize;
    let target = target_channels.max(1) as usize;
    if source == target {
        return frame;
    }

    let mut remixed = Vec::with_capacity(frame.samples.len() / source * target);
    for src in frame.samples.chunks_exact(source) {
        if target == 1 {
            let sum: i32 = src.iter().map(|&s| s as i32).sum();
            remixed.push((sum / source as i32) as i16);
        } else {
            remixed.extend((0..target).map(|c| src[c.min(source - 1)]));
        }
    }

    AudioFrame {
        samples: remixed,
        sample_rate: frame.sample_rate,
        channels: target as u16,
        timestamp_ms: frame.timestamp_ms,
    }
}
