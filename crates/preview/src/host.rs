//! Collaborators the controller reads its target from

use capture_gdi::{CaptureResult, Rect, WindowHandle};

/// Kind of content shown by the embedded target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Video, web page, application: frames change over time
    MovingSource,
    /// A picture; one capture is enough
    StaticImage,
}

/// The window that embeds the capture target.
///
/// Every method is called fresh before each capture; implementations must
/// not assume results are cached.
pub trait PreviewHost {
    fn target_handle(&self) -> WindowHandle;
    fn target_kind(&self) -> TargetKind;
    /// Screen rectangle the target currently occupies, in device pixels
    fn capture_rectangle(&self) -> CaptureResult<Rect>;
}

/// Host with a fixed target, for tools and scripts without a UI
#[derive(Debug, Clone, Copy)]
pub struct FixedHost {
    pub handle: WindowHandle,
    pub kind: TargetKind,
    pub rect: Rect,
}

impl PreviewHost for FixedHost {
    fn target_handle(&self) -> WindowHandle {
        self.handle
    }

    fn target_kind(&self) -> TargetKind {
        self.kind
    }

    fn capture_rectangle(&self) -> CaptureResult<Rect> {
        self.rect.validate()?;
        Ok(self.rect)
    }
}
