//! Collaborators the transport depends on.

use std::time::Duration;

use shelltray_protocol::{AppBarRequest, Envelope, WindowHandle};

/// Window-system operations used for forwarding and pointer dispatch.
pub trait TrayHost {
    fn is_window(&self, window: WindowHandle) -> bool;

    /// Looks for another shell tray window that is not ours.
    fn find_secondary_tray(&self) -> Option<WindowHandle>;

    /// Re-sends `envelope` unchanged to `target` and returns its reply.
    fn forward(&self, target: WindowHandle, envelope: &Envelope<'_>) -> isize;

    /// Current system double-click threshold.
    fn double_click_time(&self) -> Duration {
        Duration::from_millis(500)
    }
}

/// Handles app-bar requests (discriminant 0).
///
/// Returning `None` means "not handled"; the request is then forwarded to
/// the secondary tray if there is one.
pub trait AppBarHandler {
    fn handle(&mut self, request: &AppBarRequest<'_>) -> Option<isize>;
}

impl<F> AppBarHandler for F
where
    F: FnMut(&AppBarRequest<'_>) -> Option<isize>,
{
    fn handle(&mut self, request: &AppBarRequest<'_>) -> Option<isize> {
        self(request)
    }
}
