//! Capture configuration
//!
//! Loaded from TOML; every field has a default so a partial file is valid.

use crate::{PreviewError, PreviewResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How each frame is sampled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Screen copy of the host's capture rectangle
    #[default]
    Region,
    /// Off-screen copy of the embedded window's own surface
    Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Periodic thumbnail refresh interval
    pub thumbnail_interval_ms: u64,
    /// Wait before the one-shot thumbnail so the first frame is rendered
    pub settle_delay_ms: u64,
    /// Frames sampled for the animated preview
    pub total_frames: usize,
    /// Sampling rate while recording the preview
    pub capture_fps: u32,
    /// Playback rate written into the animation
    pub playback_fps: u32,
    /// Record an animated preview after the one-shot thumbnail
    pub animation_enabled: bool,
    pub jpeg_quality: u8,
    /// NeuQuant sample factor for the shared palette (1 best, 30 fastest)
    pub quantize_sample_factor: i32,
    pub source: CaptureSource,
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl PreviewConfig {
    pub const DEFAULT_THUMBNAIL_INTERVAL_MS: u64 = 3000;
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
    pub const DEFAULT_TOTAL_FRAMES: usize = 60;
    pub const DEFAULT_CAPTURE_FPS: u32 = 30;
    pub const DEFAULT_PLAYBACK_FPS: u32 = 120;

    /// Read and validate a TOML file
    pub fn load(path: &Path) -> PreviewResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| PreviewError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PreviewResult<()> {
        if self.thumbnail_interval_ms == 0 {
            return Err(PreviewError::Config(
                "thumbnail_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.total_frames == 0 {
            return Err(PreviewError::Config(
                "total_frames must be greater than 0".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.capture_fps) || !(1..=1000).contains(&self.playback_fps) {
            return Err(PreviewError::Config(
                "capture_fps and playback_fps must be within 1-1000".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PreviewError::Config(
                "jpeg_quality must be within 1-100".to_string(),
            ));
        }
        if !(1..=30).contains(&self.quantize_sample_factor) {
            return Err(PreviewError::Config(
                "quantize_sample_factor must be within 1-30".to_string(),
            ));
        }
        Ok(())
    }

    pub fn thumbnail_interval(&self) -> Duration {
        Duration::from_millis(self.thumbnail_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Wait after each sampled frame (1000/30 = 33 ms by default)
    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(1000 / self.capture_fps.max(1) as u64)
    }

    /// Per-frame display time in the animation (1000/120 = 8 ms by default)
    pub fn playback_delay_ms(&self) -> u32 {
        1000 / self.playback_fps.max(1)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            thumbnail_interval_ms: Self::DEFAULT_THUMBNAIL_INTERVAL_MS,
            settle_delay_ms: Self::DEFAULT_SETTLE_DELAY_MS,
            total_frames: Self::DEFAULT_TOTAL_FRAMES,
            capture_fps: Self::DEFAULT_CAPTURE_FPS,
            playback_fps: Self::DEFAULT_PLAYBACK_FPS,
            animation_enabled: true,
            jpeg_quality: export::DEFAULT_JPEG_QUALITY,
            quantize_sample_factor: 10,
            source: CaptureSource::default(),
            log_level: "info".to_string(),
        }
    }
}
