use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::{AudioBackendConfig, AudioSource};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Interview service API root, e.g. `http://localhost:8080/api`
    pub base_url: String,
    /// Unset means requests may wait indefinitely
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub clarification_delay_ms: u64,
    pub skip_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            clarification_delay_ms: 2000,
            skip_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `microphone` or a path to a WAV file to replay as the answer
    pub input: String,
    /// `speaker` or `paced` (no device, real-time timing only)
    pub output: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input: "microphone".to_string(),
            output: "speaker".to_string(),
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

impl AudioConfig {
    pub fn source(&self) -> AudioSource {
        AudioSource::parse(&self.input)
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.sample_rate,
            target_channels: self.channels,
            buffer_duration_ms: self.buffer_duration_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

impl Config {
    /// Load `path` (extension optional) layered with `INTERVIEW__SECTION__KEY` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("INTERVIEW").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.service.request_timeout_secs.map(Duration::from_secs)
    }
}

impl TimingConfig {
    pub fn clarification_delay(&self) -> Duration {
        Duration::from_millis(self.clarification_delay_ms)
    }

    pub fn skip_delay(&self) -> Duration {
        Duration::from_millis(self.skip_delay_ms)
    }
}
