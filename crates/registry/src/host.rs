//! Host collaborator used by the registry.
//!
//! The registry never touches the window system directly; the platform
//! layer implements [`IconHost`] (Win32 on Windows, fakes in tests).

use shelltray_protocol::WindowHandle;

/// One outbound callback message for an icon owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyMessage {
    pub window: WindowHandle,
    /// The owner's callback message id (`uCallbackMessage`).
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

/// Window-system operations the registry depends on.
pub trait IconHost {
    /// Whether `window` still refers to a live window.
    fn is_window(&self, window: WindowHandle) -> bool;

    /// Posts a callback message without waiting for the owner to process it.
    /// Returns `false` if the post failed.
    fn post_notify(&self, message: &NotifyMessage) -> bool;

    /// Lets the process owning `window` take the foreground (so the menu it
    /// opens in response to a click appears on top).
    fn allow_foreground(&self, _window: WindowHandle) {}

    /// Executable path of the process owning `window`.
    fn process_path(&self, _window: WindowHandle) -> Option<String> {
        None
    }
}
