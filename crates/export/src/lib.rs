//! Export module for livecap
//!
//! Provides JPEG still and optimized GIF animation export.

mod animation;
mod quantize;
mod still;

pub use animation::{delay_to_centis, GifExportConfig, GifExporter};
pub use quantize::{SharedPalette, MAX_COLORS, TRANSPARENT_INDEX};
pub use still::{save_still, DEFAULT_JPEG_QUALITY};

use capture_gdi::FrameBuffer;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("GIF encoding error: {0}")]
    GifEncode(String),

    #[error("No frames to export")]
    NoFrames,

    #[error("Frame {index} is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Unsupported buffer: {0}")]
    InvalidBuffer(String),
}

impl From<gif::EncodingError> for ExportError {
    fn from(e: gif::EncodingError) -> Self {
        match e {
            gif::EncodingError::Io(io) => ExportError::Io(io),
            other => ExportError::GifEncode(other.to_string()),
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Ordered frames destined for one animation
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: Vec<FrameBuffer>,
}

impl FrameSequence {
    pub fn with_capacity(total_frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(total_frames),
        }
    }

    pub fn push(&mut self, frame: FrameBuffer) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    /// Shared dimensions of every frame
    pub fn dimensions(&self) -> ExportResult<(u32, u32)> {
        let first = self.frames.first().ok_or(ExportError::NoFrames)?;
        let expected = first.dimensions();
        for (index, frame) in self.frames.iter().enumerate().skip(1) {
            if frame.dimensions() != expected {
                return Err(ExportError::SizeMismatch {
                    index,
                    expected,
                    actual: frame.dimensions(),
                });
            }
        }
        Ok(expected)
    }
}

impl From<Vec<FrameBuffer>> for FrameSequence {
    fn from(frames: Vec<FrameBuffer>) -> Self {
        Self { frames }
    }
}
