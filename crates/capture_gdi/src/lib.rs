//! GDI capture module for livecap
//!
//! Copies pixels from a screen region or from a window's own drawing surface
//! into an owned [`FrameBuffer`].

pub mod capture;
pub mod frame;
#[cfg(windows)]
pub mod gdi;
pub mod surface;

pub use capture::{FrameGrabber, PixelCapture};
pub use frame::FrameBuffer;
#[cfg(windows)]
pub use gdi::GdiSurfaceApi;
pub use surface::{SurfaceApi, SurfaceChain, SurfaceSource};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    #[error("Invalid capture region {width}x{height}")]
    InvalidRegion { width: u32, height: u32 },

    #[error("Invalid capture target")]
    InvalidTarget,

    #[error("Pixel buffer of {actual} bytes does not match {width}x{height}")]
    BufferSize { width: u32, height: u32, actual: usize },
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Rectangle in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from Win32-style edges. Inverted edges collapse to zero size.
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reject rectangles no drawing surface can be created for.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.is_empty() || self.width > i32::MAX as u32 || self.height > i32::MAX as u32 {
            return Err(CaptureError::InvalidRegion {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Opaque native window handle, stored as isize so it can cross threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// What a single capture call samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Whatever is composited at these screen coordinates
    ScreenRegion(Rect),
    /// A window's own surface; its rectangle is resolved at capture time
    Window(WindowHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ltrb_matches_edges() {
        let rect = Rect::from_ltrb(10, 20, 110, 70);
        assert_eq!(rect, Rect::new(10, 20, 100, 50));
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 70);
    }

    #[test]
    fn far_edges_saturate() {
        let rect = Rect::new(i32::MAX - 10, 5, 100, i32::MAX as u32);
        assert!(rect.validate().is_ok());
        assert_eq!(rect.right(), i32::MAX);
        assert_eq!(rect.bottom(), i32::MAX);
    }

    #[test]
    fn inverted_edges_are_empty() {
        let rect = Rect::from_ltrb(50, 50, 10, 10);
        assert!(rect.is_empty());
        assert!(rect.validate().is_err());
    }

    #[test]
    fn zero_sized_region_is_rejected() {
        match Rect::new(0, 0, 0, 10).validate() {
            Err(CaptureError::InvalidRegion { width: 0, height: 10 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Rect::new(-5, -5, 1, 1).validate().is_ok());
    }
}
