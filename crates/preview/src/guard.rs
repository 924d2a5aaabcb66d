//! Geometry and close protection while a capture is in flight
//!
//! The controller is the only writer of the capture state. The hosting
//! window asks the guard whether a move/resize or a close may proceed.

use crate::state::CaptureState;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Whether the hosting window may change position or size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryPolicy {
    Allow,
    Deny,
}

/// Pure mapping from capture state to geometry policy
pub fn geometry_policy(state: CaptureState) -> GeometryPolicy {
    if state.is_capturing() {
        GeometryPolicy::Deny
    } else {
        GeometryPolicy::Allow
    }
}

/// A pending move/resize request, mirroring Win32 `WINDOWPOS`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryChange {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub flags: u32,
}

impl GeometryChange {
    /// `SWP_NOSIZE`
    pub const NO_SIZE: u32 = 0x0001;
    /// `SWP_NOMOVE`
    pub const NO_MOVE: u32 = 0x0002;

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            flags: 0,
        }
    }

    pub fn moves(&self) -> bool {
        self.flags & Self::NO_MOVE == 0
    }

    pub fn resizes(&self) -> bool {
        self.flags & Self::NO_SIZE == 0
    }
}

/// Answer to a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Nothing in flight; tear down
    Proceed,
    /// A capture is running; keep the window and tell the user
    Deferred,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureGuard {
    state: Arc<RwLock<CaptureState>>,
}

impl CaptureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    pub fn is_engaged(&self) -> bool {
        self.state().is_capturing()
    }

    pub fn geometry_policy(&self) -> GeometryPolicy {
        geometry_policy(self.state())
    }

    /// Rewrite `change` in place so it neither moves nor resizes.
    ///
    /// Returns true when the request was rewritten and counts as handled.
    pub fn filter_geometry_change(&self, change: &mut GeometryChange) -> bool {
        match self.geometry_policy() {
            GeometryPolicy::Allow => false,
            GeometryPolicy::Deny => {
                change.flags |= GeometryChange::NO_MOVE | GeometryChange::NO_SIZE;
                debug!(?change, "geometry change suppressed during capture");
                true
            }
        }
    }

    /// A deferred close is not retried; the user has to ask again.
    pub fn request_close(&self) -> CloseDecision {
        if self.is_engaged() {
            debug!("close deferred during capture");
            CloseDecision::Deferred
        } else {
            CloseDecision::Proceed
        }
    }

    pub(crate) fn set(&self, state: CaptureState) {
        *self.state.write() = state;
    }

    /// Move to `state` only from `Idle`. Returns false if already engaged.
    pub(crate) fn try_engage(&self, state: CaptureState) -> bool {
        let mut current = self.state.write();
        if current.is_capturing() {
            return false;
        }
        *current = state;
        true
    }
}
