//! Shared-palette quantization and frame-diff optimization

use color_quant::NeuQuant;
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;

/// Upper bound of the palette shared by every frame
pub const MAX_COLORS: usize = 256;
/// Palette slot reserved for "unchanged since previous frame"
pub const TRANSPARENT_INDEX: u8 = (MAX_COLORS - 1) as u8;

const OPAQUE_COLORS: usize = MAX_COLORS - 1;
const MAX_SAMPLES: usize = 1 << 20;
const MIN_SAMPLES: usize = 4096;

/// One palette trained jointly over all frames of a sequence
pub struct SharedPalette {
    quant: NeuQuant,
}

impl SharedPalette {
    /// Train over an evenly strided sample of every frame's pixels.
    ///
    /// `sample_factor` is NeuQuant's: 1 is slowest and best, 30 fastest.
    pub fn train(frames: &[ImgRef<'_, RGBA8>], sample_factor: i32) -> Self {
        let total: usize = frames.iter().map(|f| f.width() * f.height()).sum();
        let step = (total / MAX_SAMPLES).max(1);

        let mut samples: Vec<u8> = Vec::with_capacity((total / step + 1) * 4);
        for px in frames
            .iter()
            .flat_map(|f| f.rows().flat_map(|row| row.iter()))
            .step_by(step)
        {
            samples.extend_from_slice(&[px.r, px.g, px.b, u8::MAX]);
        }
        if samples.is_empty() {
            samples.extend_from_slice(&[0, 0, 0, u8::MAX]);
        }
        // NeuQuant needs enough input to run its learning cycles.
        while samples.len() / 4 < MIN_SAMPLES {
            samples.extend_from_within(..);
        }

        Self {
            quant: NeuQuant::new(sample_factor.clamp(1, 30), OPAQUE_COLORS, &samples),
        }
    }

    /// RGB triplets for the GIF global color table, padded to [`MAX_COLORS`]
    pub fn global_palette(&self) -> Vec<u8> {
        let mut palette = self.quant.color_map_rgb();
        palette.resize(MAX_COLORS * 3, 0);
        palette
    }

    /// Map a frame onto the palette. Never yields [`TRANSPARENT_INDEX`].
    pub fn index(&self, frame: ImgRef<'_, RGBA8>) -> ImgVec<u8> {
        let mut out = Vec::with_capacity(frame.width() * frame.height());
        let mut last: Option<(RGBA8, u8)> = None;
        for row in frame.rows() {
            for &px in row {
                let idx = match last {
                    Some((color, idx)) if color == px => idx,
                    _ => {
                        let idx = self.quant.index_of(&[px.r, px.g, px.b, u8::MAX]) as u8;
                        last = Some((px, idx));
                        idx
                    }
                };
                out.push(idx);
            }
        }
        ImgVec::new(out, frame.width(), frame.height())
    }
}

/// Sub-rectangle of indexed pixels to draw over the previous frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FramePatch {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub indices: Vec<u8>,
    pub transparent: Option<u8>,
}

impl FramePatch {
    pub fn full(frame: &ImgVec<u8>) -> Self {
        Self {
            left: 0,
            top: 0,
            width: frame.width() as u16,
            height: frame.height() as u16,
            indices: frame.rows().flat_map(|row| row.iter().copied()).collect(),
            transparent: None,
        }
    }

    /// Crop `next` to the pixels that differ from `prev`; pixels inside the
    /// crop that did not change become transparent.
    ///
    /// Both frames must share dimensions that fit in `u16`.
    pub fn diff(prev: &ImgVec<u8>, next: &ImgVec<u8>) -> Self {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (y, (a, b)) in prev.rows().zip(next.rows()).enumerate() {
            for (x, (pa, pb)) in a.iter().zip(b.iter()).enumerate() {
                if pa != pb {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }

        let Some((x0, y0, x1, y1)) = bounds else {
            // Nothing changed; keep the timing slot with an invisible pixel.
            return Self {
                left: 0,
                top: 0,
                width: 1,
                height: 1,
                indices: vec![TRANSPARENT_INDEX],
                transparent: Some(TRANSPARENT_INDEX),
            };
        };

        let width = x1 - x0 + 1;
        let height = y1 - y0 + 1;
        let mut indices = Vec::with_capacity(width * height);
        for (a, b) in prev.rows().zip(next.rows()).skip(y0).take(height) {
            for x in x0..=x1 {
                indices.push(if a[x] == b[x] { TRANSPARENT_INDEX } else { b[x] });
            }
        }

        Self {
            left: x0 as u16,
            top: y0 as u16,
            width: width as u16,
            height: height as u16,
            indices,
            transparent: Some(TRANSPARENT_INDEX),
        }
    }
}
