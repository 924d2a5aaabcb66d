//! State machines for the capture controller

use capture_gdi::WindowHandle;
use std::path::PathBuf;

/// What the capture worker is doing, as seen by the guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Settling and taking the one-shot thumbnail
    CapturingStill,
    /// Sampling animation frames
    CapturingSequence,
}

impl CaptureState {
    pub fn is_capturing(&self) -> bool {
        !matches!(self, CaptureState::Idle)
    }
}

/// Which capture task owns the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Stopped,
    /// Thumbnail refresh on a timer
    Periodic,
    /// Thumbnail plus optional animation, run once
    OneShot,
}

impl LoopMode {
    pub fn can_start_periodic(&self) -> bool {
        matches!(self, LoopMode::Stopped)
    }

    /// A one-shot sequence needs the periodic task cancelled first
    pub fn can_begin_one_shot(&self) -> bool {
        matches!(self, LoopMode::Stopped)
    }
}

/// Per-mode session data
#[derive(Debug, Clone)]
pub struct CaptureSession {
    /// Where thumbnails and previews are written
    pub output_dir: PathBuf,
    /// Handle of the embedded target when the session started
    pub target: WindowHandle,
    /// Temporary thumbnail from the previous periodic tick
    pub last_thumbnail: Option<PathBuf>,
}

impl CaptureSession {
    pub fn new(output_dir: PathBuf, target: WindowHandle) -> Self {
        Self {
            output_dir,
            target,
            last_thumbnail: None,
        }
    }
}

/// Mode transitions
#[derive(Debug, Default)]
pub struct StateMachine {
    mode: LoopMode,
    session: Option<CaptureSession>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        self.session.as_mut()
    }

    /// Transition to the periodic loop
    pub fn start_periodic(&mut self, session: CaptureSession) -> bool {
        if self.mode.can_start_periodic() {
            self.session = Some(session);
            self.mode = LoopMode::Periodic;
            true
        } else {
            false
        }
    }

    /// Leave the periodic loop, handing back its session
    pub fn stop_periodic(&mut self) -> Option<CaptureSession> {
        if matches!(self.mode, LoopMode::Periodic) {
            self.mode = LoopMode::Stopped;
            self.session.take()
        } else {
            None
        }
    }

    /// Transition to a one-shot sequence. Refused while periodic.
    pub fn begin_one_shot(&mut self, session: CaptureSession) -> bool {
        if self.mode.can_begin_one_shot() {
            self.session = Some(session);
            self.mode = LoopMode::OneShot;
            true
        } else {
            false
        }
    }

    /// Sequence finished or failed, return to stopped
    pub fn finish_one_shot(&mut self) {
        if matches!(self.mode, LoopMode::OneShot) {
            self.mode = LoopMode::Stopped;
            self.session = None;
        }
    }
}
