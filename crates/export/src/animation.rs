//! GIF export with one palette shared by every frame

use crate::quantize::{FramePatch, SharedPalette};
use crate::{ExportError, ExportResult, FrameSequence};
use gif::{DisposalMethod, Encoder, Frame, Repeat};
use imgref::{ImgRef, ImgVec};
use rgb::{FromSlice, RGBA8};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// GIF export configuration
#[derive(Debug, Clone)]
pub struct GifExportConfig {
    /// NeuQuant sample factor, 1 (best) to 30 (fastest)
    pub sample_factor: i32,
    pub repeat: Repeat,
}

impl Default for GifExportConfig {
    fn default() -> Self {
        Self {
            sample_factor: 10,
            repeat: Repeat::Infinite,
        }
    }
}

/// GIF frame delays are in hundredths of a second; never emit zero.
pub fn delay_to_centis(delay_ms: u32) -> u16 {
    (delay_ms.saturating_add(5) / 10).clamp(1, u16::MAX as u32) as u16
}

/// Animated GIF writer
pub struct GifExporter {
    config: GifExportConfig,
}

impl GifExporter {
    pub fn new(config: GifExportConfig) -> Self {
        Self { config }
    }

    /// Encode `sequence` to `path`, each frame shown for `display_delay_ms`.
    ///
    /// A partially written file is removed on failure.
    pub fn save_animation(
        &self,
        sequence: &FrameSequence,
        path: &Path,
        display_delay_ms: u32,
    ) -> ExportResult<PathBuf> {
        check_sequence(sequence)?;

        let result = File::create(path)
            .map_err(ExportError::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                self.encode(sequence, &mut writer, display_delay_ms)?;
                writer.flush()?;
                Ok(())
            });

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "animation export failed");
            let _ = fs::remove_file(path);
            return Err(e);
        }

        info!(
            path = %path.display(),
            frames = sequence.len(),
            display_delay_ms,
            "animation saved"
        );
        Ok(path.to_path_buf())
    }

    /// Encode into any writer
    pub fn encode<W: Write>(
        &self,
        sequence: &FrameSequence,
        writer: W,
        display_delay_ms: u32,
    ) -> ExportResult<()> {
        let (width, height) = check_sequence(sequence)?;

        let views: Vec<ImgRef<'_, RGBA8>> = sequence
            .frames()
            .iter()
            .map(|f| ImgRef::new(f.data.as_rgba(), f.width as usize, f.height as usize))
            .collect();

        let palette = SharedPalette::train(&views, self.config.sample_factor);
        let mut encoder = Encoder::new(writer, width, height, &palette.global_palette())?;
        encoder.set_repeat(self.config.repeat)?;

        let delay = delay_to_centis(display_delay_ms);
        let mut previous: Option<ImgVec<u8>> = None;
        for (i, view) in views.into_iter().enumerate() {
            let indexed = palette.index(view);
            let patch = match &previous {
                None => FramePatch::full(&indexed),
                Some(prev) => FramePatch::diff(prev, &indexed),
            };
            debug!(
                frame = i,
                left = patch.left,
                top = patch.top,
                width = patch.width,
                height = patch.height,
                "writing frame"
            );

            let frame = Frame {
                left: patch.left,
                top: patch.top,
                width: patch.width,
                height: patch.height,
                buffer: Cow::Owned(patch.indices),
                transparent: patch.transparent,
                dispose: DisposalMethod::Keep,
                delay,
                ..Frame::default()
            };
            encoder.write_frame(&frame)?;
            previous = Some(indexed);
        }

        encoder.into_inner()?;
        Ok(())
    }
}

impl Default for GifExporter {
    fn default() -> Self {
        Self::new(GifExportConfig::default())
    }
}

/// Shared frame size, checked against the GIF limits and each buffer's length
fn check_sequence(sequence: &FrameSequence) -> ExportResult<(u16, u16)> {
    let (width, height) = sequence.dimensions()?;
    if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(ExportError::InvalidBuffer(format!(
            "{width}x{height} cannot be stored in a GIF"
        )));
    }
    let expected = width as usize * height as usize * 4;
    if let Some(index) = sequence.frames().iter().position(|f| f.data.len() != expected) {
        return Err(ExportError::InvalidBuffer(format!(
            "frame {index} holds {} bytes, expected {expected}",
            sequence.frames()[index].data.len()
        )));
    }
    Ok((width as u16, height as u16))
}
