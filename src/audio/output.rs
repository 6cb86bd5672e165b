use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::decode::DecodedAudio;

/// Where decoded audio ends up
///
/// `render` resolves once the clip has finished playing. Dropping the
/// future must silence the clip.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn render(&self, clip: DecodedAudio) -> Result<()>;

    fn name(&self) -> &str;
}

/// Output without a device: takes exactly as long as the clip would
///
/// Keeps turn timing realistic on headless machines and in tests.
pub struct PacedOutput {
    /// Playback speed multiplier (1.0 = real time)
    speed: f64,
}

impl PacedOutput {
    pub fn new() -> Self {
        Self { speed: 1.0 }
    }

    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed: if speed > 0.0 { speed } else { 1.0 },
        }
    }
}

impl Default for PacedOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for PacedOutput {
    async fn render(&self, clip: DecodedAudio) -> Result<()> {
        let millis = (clip.duration_ms() as f64 / self.speed) as u64;
        debug!("Pacing {} ms of audio", millis);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "paced (no device)"
    }
}
