// Integration tests for audio file handling
//
// These tests verify that we can read WAV files, split them into frames,
// decode service audio and encode captured answers.

use anyhow::Result;
use loqa_interview::audio::decode::extension_hint;
use loqa_interview::audio::{decode_audio, encode_wav, AnswerBuffer, AudioFile, AudioFrame};
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

fn sine(sample_rate: u32, channels: u16, millis: u64) -> Vec<i16> {
    let frames = (sample_rate as u64 * millis / 1000) as usize;
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let value = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16;
            std::iter::repeat(value).take(channels as usize)
        })
        .collect()
}

fn write_wav(dir: &TempDir, name: &str, samples: &[i16], rate: u32, channels: u16) -> Result<PathBuf> {
    let path = dir.path().join(name);
    std::fs::write(&path, encode_wav(samples, rate, channels)?)?;
    Ok(path)
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "answer.wav", &sine(16000, 1, 2000), 16000, 1)?;

    let audio = AudioFile::open(&path)?;

    assert!((audio.duration_seconds - 2.0).abs() < 0.001);
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 32000);
    assert!(audio.path.contains("answer.wav"));

    Ok(())
}

#[test]
fn test_audio_file_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "stereo.wav", &sine(48000, 2, 250), 48000, 2)?;

    let audio = AudioFile::open(&path)?;
    let frames = audio.frames(100);

    // 100ms, 100ms, 50ms
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].samples.len(), 9600);
    assert_eq!(frames[2].samples.len(), 4800);
    assert_eq!(frames[1].timestamp_ms, 100);
    assert!(frames.iter().all(|f| f.sample_rate == 48000 && f.channels == 2));

    Ok(())
}

#[test]
fn test_audio_file_rejects_float_wav() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..160 {
        writer.write_sample(0.25f32)?;
    }
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err());

    Ok(())
}

#[test]
fn test_audio_file_not_found() {
    assert!(AudioFile::open("/nonexistent/file.wav").is_err());
}

#[test]
fn test_encode_wav_is_readable() -> Result<()> {
    let samples = sine(16000, 1, 500);

    let bytes = encode_wav(&samples, 16000, 1)?;
    let reader = hound::WavReader::new(Cursor::new(bytes))?;

    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);

    let decoded: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(decoded, samples);

    Ok(())
}

#[test]
fn test_answer_buffer_normalizes_input() -> Result<()> {
    let mut buffer = AnswerBuffer::new(16000, 1);
    assert!(buffer.is_empty());

    for i in 0..5 {
        buffer.push(AudioFrame {
            samples: sine(48000, 2, 100),
            sample_rate: 48000,
            channels: 2,
            timestamp_ms: i * 100,
        });
    }

    assert_eq!(buffer.sample_count(), 8000);
    assert_eq!(buffer.duration_ms(), 500);

    let reader = hound::WavReader::new(Cursor::new(buffer.to_wav()?))?;
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.duration(), 8000);

    Ok(())
}

#[test]
fn test_empty_answer_still_encodes() -> Result<()> {
    let buffer = AnswerBuffer::new(16000, 1);

    let reader = hound::WavReader::new(Cursor::new(buffer.to_wav()?))?;
    assert_eq!(reader.duration(), 0);

    Ok(())
}

#[test]
fn test_decode_wav_clip() -> Result<()> {
    let samples = sine(22050, 2, 400);
    let bytes = encode_wav(&samples, 22050, 2)?;

    let clip = decode_audio(bytes, Some("wav"))?;

    assert_eq!(clip.sample_rate, 22050);
    assert_eq!(clip.channels, 2);
    assert_eq!(clip.samples.len(), samples.len());
    assert_eq!(clip.duration_ms(), 400);

    Ok(())
}

#[test]
fn test_decode_garbage_fails() {
    assert!(decode_audio(b"definitely not audio".to_vec(), None).is_err());
}

#[test]
fn test_extension_hint() {
    assert_eq!(extension_hint("http://svc/audio/feedback-1.mp3"), Some("mp3"));
    assert_eq!(extension_hint("/audio/q.wav?nocache=1700000000"), Some("wav"));
    assert_eq!(
        extension_hint("http://svc/api/interview/abc/question-audio?nocache=1"),
        None
    );
}
