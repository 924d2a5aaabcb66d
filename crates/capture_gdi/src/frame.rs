//! Captured pixel buffers

use crate::{CaptureError, CaptureResult};
use image::{ImageBuffer, RgbaImage};
use std::time::Instant;

/// Owned RGBA8 bitmap produced by one capture call
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

impl FrameBuffer {
    /// Wrap RGBA bytes. The length must be exactly `width * height * 4`.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> CaptureResult<Self> {
        check_len(&data, width, height)?;
        Ok(Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    /// Convert top-down BGRA surface bytes in place.
    ///
    /// GDI block copies leave the alpha channel zeroed, so alpha is forced
    /// opaque.
    pub fn from_bgra(mut data: Vec<u8>, width: u32, height: u32) -> CaptureResult<Self> {
        check_len(&data, width, height)?;
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
            px[3] = u8::MAX;
        }
        Self::from_rgba(data, width, height)
    }

    /// Single-color frame
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Borrow as an `image` buffer
    pub fn to_rgba_image(&self) -> CaptureResult<RgbaImage> {
        ImageBuffer::from_raw(self.width, self.height, self.data.clone()).ok_or(
            CaptureError::BufferSize {
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            },
        )
    }

    pub fn into_rgba_image(self) -> CaptureResult<RgbaImage> {
        let (width, height, actual) = (self.width, self.height, self.data.len());
        ImageBuffer::from_raw(width, height, self.data).ok_or(CaptureError::BufferSize {
            width,
            height,
            actual,
        })
    }
}

fn check_len(data: &[u8], width: u32, height: u32) -> CaptureResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4));
    if expected != Some(data.len()) {
        return Err(CaptureError::BufferSize {
            width,
            height,
            actual: data.len(),
        });
    }
    Ok(())
}
