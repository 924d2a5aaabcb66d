//! Region and window capture

use crate::surface::{SurfaceApi, SurfaceChain, SurfaceSource};
use crate::{CaptureError, CaptureResult, CaptureTarget, FrameBuffer, Rect, WindowHandle};
use tracing::{debug, trace};

/// Anything that can turn a [`CaptureTarget`] into a frame
pub trait FrameGrabber {
    fn grab(&self, target: &CaptureTarget) -> CaptureResult<FrameBuffer>;
}

/// Synchronous capture built on a [`SurfaceApi`]
pub struct PixelCapture<A> {
    api: A,
}

impl<A: SurfaceApi> PixelCapture<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Copy whatever is composited at `region` on screen.
    ///
    /// The result is exactly `region.width` × `region.height`.
    pub fn capture_region(&self, region: Rect) -> CaptureResult<FrameBuffer> {
        region.validate()?;
        trace!(?region, "capturing screen region");
        self.copy(SurfaceSource::Screen, region.x, region.y, region.width, region.height)
    }

    /// Copy a window's own surface, whether or not it is on top.
    pub fn capture_window(&self, window: WindowHandle) -> CaptureResult<FrameBuffer> {
        if window.is_null() {
            return Err(CaptureError::CaptureFailure(format!(
                "window {:#x} is not valid",
                window.0
            )));
        }
        let rect = self.api.window_rect(window).map_err(|e| match e {
            CaptureError::InvalidTarget => {
                CaptureError::CaptureFailure(format!("window {:#x} is not valid", window.0))
            }
            other => other,
        })?;
        rect.validate().map_err(|_| {
            CaptureError::CaptureFailure(format!(
                "window {:#x} has no drawable area ({}x{})",
                window.0, rect.width, rect.height
            ))
        })?;
        trace!(handle = window.0, ?rect, "capturing window");
        // The window DC is addressed relative to the window origin.
        self.copy(SurfaceSource::Window(window), 0, 0, rect.width, rect.height)
    }

    pub fn capture(&self, target: &CaptureTarget) -> CaptureResult<FrameBuffer> {
        match *target {
            CaptureTarget::ScreenRegion(region) => self.capture_region(region),
            CaptureTarget::Window(window) => self.capture_window(window),
        }
    }

    fn copy(&self, source: SurfaceSource, x: i32, y: i32, width: u32, height: u32) -> CaptureResult<FrameBuffer> {
        let chain = SurfaceChain::acquire(&self.api, source, width as i32, height as i32)?;
        chain.copy_from(x, y)?;
        let pixels = chain.into_pixels()?;
        let frame = FrameBuffer::from_bgra(pixels, width, height)?;
        debug!(width, height, "frame captured");
        Ok(frame)
    }
}

impl<A: SurfaceApi> FrameGrabber for PixelCapture<A> {
    fn grab(&self, target: &CaptureTarget) -> CaptureResult<FrameBuffer> {
        self.capture(target)
    }
}
