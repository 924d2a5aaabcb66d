//! Single-frame JPEG export

use crate::{ExportError, ExportResult};
use capture_gdi::FrameBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Write `frame` as a JPEG at `path`, replacing any existing file.
pub fn save_still(frame: &FrameBuffer, path: &Path, quality: u8) -> ExportResult<()> {
    if frame.width == 0 || frame.height == 0 {
        return Err(ExportError::InvalidBuffer(format!(
            "{}x{} frame",
            frame.width, frame.height
        )));
    }
    let rgba = frame
        .to_rgba_image()
        .map_err(|e| ExportError::InvalidBuffer(e.to_string()))?;
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(&rgb)?;
    writer.flush()?;

    debug!(path = %path.display(), width = frame.width, height = frame.height, "still saved");
    Ok(())
}
