//! Drawing-surface primitives and the scoped acquisition chain
//!
//! A capture needs four native resources: the source surface, an off-screen
//! surface, a bitmap on it and the object the bitmap displaced. They are
//! always released in reverse order of acquisition, which [`SurfaceChain`]
//! enforces from its `Drop` impl.

use crate::{CaptureResult, Rect, WindowHandle};

/// Where the block copy reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSource {
    /// The whole virtual screen, addressed in screen coordinates
    Screen,
    /// A window's own surface, addressed relative to its top-left corner
    Window(WindowHandle),
}

/// Native drawing-surface operations used by a capture
pub trait SurfaceApi {
    type Dc: Copy;
    type Bitmap: Copy;
    type Object: Copy;

    /// Current bounding rectangle of a window in screen coordinates
    fn window_rect(&self, window: WindowHandle) -> CaptureResult<Rect>;

    fn source_dc(&self, source: SurfaceSource) -> CaptureResult<Self::Dc>;
    fn release_source_dc(&self, source: SurfaceSource, dc: Self::Dc);

    fn create_memory_dc(&self, compatible_with: Self::Dc) -> CaptureResult<Self::Dc>;
    fn delete_memory_dc(&self, dc: Self::Dc);

    fn create_bitmap(
        &self,
        compatible_with: Self::Dc,
        width: i32,
        height: i32,
    ) -> CaptureResult<Self::Bitmap>;
    fn delete_bitmap(&self, bitmap: Self::Bitmap);

    /// Select `bitmap` into `dc`, returning the object it displaced
    fn select_bitmap(&self, dc: Self::Dc, bitmap: Self::Bitmap) -> CaptureResult<Self::Object>;
    fn restore_object(&self, dc: Self::Dc, previous: Self::Object);

    fn block_copy(
        &self,
        dst: Self::Dc,
        src: Self::Dc,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
    ) -> CaptureResult<()>;

    /// Top-down BGRA bytes of a bitmap that is not selected into any DC
    fn read_pixels(
        &self,
        dc: Self::Dc,
        bitmap: Self::Bitmap,
        width: i32,
        height: i32,
    ) -> CaptureResult<Vec<u8>>;
}

/// Scoped source DC → memory DC → bitmap → selection chain
pub struct SurfaceChain<'a, A: SurfaceApi> {
    api: &'a A,
    source: SurfaceSource,
    source_dc: Option<A::Dc>,
    memory_dc: Option<A::Dc>,
    bitmap: Option<A::Bitmap>,
    previous: Option<A::Object>,
    width: i32,
    height: i32,
}

impl<'a, A: SurfaceApi> SurfaceChain<'a, A> {
    /// Acquire every resource needed to copy a `width`×`height` block.
    ///
    /// If any step fails the partially built chain is dropped, releasing
    /// whatever was already acquired.
    pub fn acquire(api: &'a A, source: SurfaceSource, width: i32, height: i32) -> CaptureResult<Self> {
        let mut chain = Self {
            api,
            source,
            source_dc: None,
            memory_dc: None,
            bitmap: None,
            previous: None,
            width,
            height,
        };

        let source_dc = api.source_dc(source)?;
        chain.source_dc = Some(source_dc);

        let memory_dc = api.create_memory_dc(source_dc)?;
        chain.memory_dc = Some(memory_dc);

        let bitmap = api.create_bitmap(source_dc, width, height)?;
        chain.bitmap = Some(bitmap);

        chain.previous = Some(api.select_bitmap(memory_dc, bitmap)?);
        Ok(chain)
    }

    /// Block-copy from the source surface at (`x`, `y`) into the bitmap
    pub fn copy_from(&self, x: i32, y: i32) -> CaptureResult<()> {
        match (self.memory_dc, self.source_dc) {
            (Some(dst), Some(src)) => self.api.block_copy(dst, src, x, y, self.width, self.height),
            _ => Err(crate::CaptureError::CaptureFailure(
                "surface chain is incomplete".into(),
            )),
        }
    }

    /// Deselect the bitmap and read its pixels. The chain is released on return.
    pub fn into_pixels(mut self) -> CaptureResult<Vec<u8>> {
        let (Some(memory_dc), Some(bitmap)) = (self.memory_dc, self.bitmap) else {
            return Err(crate::CaptureError::CaptureFailure(
                "surface chain is incomplete".into(),
            ));
        };
        if let Some(previous) = self.previous.take() {
            self.api.restore_object(memory_dc, previous);
        }
        self.api.read_pixels(memory_dc, bitmap, self.width, self.height)
    }
}

impl<A: SurfaceApi> Drop for SurfaceChain<'_, A> {
    fn drop(&mut self) {
        if let (Some(previous), Some(dc)) = (self.previous.take(), self.memory_dc) {
            self.api.restore_object(dc, previous);
        }
        if let Some(bitmap) = self.bitmap.take() {
            self.api.delete_bitmap(bitmap);
        }
        if let Some(dc) = self.memory_dc.take() {
            self.api.delete_memory_dc(dc);
        }
        if let Some(dc) = self.source_dc.take() {
            self.api.release_source_dc(self.source, dc);
        }
    }
}
