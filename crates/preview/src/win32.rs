//! Window-procedure hook for the hosting window

use crate::guard::{CaptureGuard, GeometryChange};
use windows::Win32::Foundation::LPARAM;
use windows::Win32::UI::WindowsAndMessaging::{SET_WINDOW_POS_FLAGS, WINDOWPOS, WM_WINDOWPOSCHANGING};

/// Call from the host's window procedure before default processing.
///
/// On `WM_WINDOWPOSCHANGING` during a capture the `WINDOWPOS` pointed to by
/// `lparam` gets `SWP_NOMOVE | SWP_NOSIZE`. Returns true when the message
/// was rewritten.
///
/// # Safety
/// `lparam` must be the one the system passed with `msg`.
pub unsafe fn intercept_window_pos_changing(guard: &CaptureGuard, msg: u32, lparam: LPARAM) -> bool {
    if msg != WM_WINDOWPOSCHANGING || lparam.0 == 0 {
        return false;
    }

    let pos = &mut *(lparam.0 as *mut WINDOWPOS);
    let mut change = GeometryChange {
        x: pos.x,
        y: pos.y,
        width: pos.cx,
        height: pos.cy,
        flags: pos.flags.0,
    };
    if guard.filter_geometry_change(&mut change) {
        pos.flags = SET_WINDOW_POS_FLAGS(change.flags);
        true
    } else {
        false
    }
}
