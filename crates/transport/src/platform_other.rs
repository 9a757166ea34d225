//! Stand-in for platforms without a Win32 shell tray to emulate.

use std::convert::Infallible;

use shelltray_protocol::WindowHandle;

use crate::error::TransportError;
use crate::queue::QueueHandle;
use crate::transport::Transport;

/// Never constructed: [`TrayWindows::create`] always fails here.
pub struct TrayWindows {
    never: Infallible,
}

impl TrayWindows {
    pub fn create(_transport: Transport) -> Result<Self, TransportError> {
        Err(TransportError::Unsupported)
    }

    pub fn tray_window(&self) -> WindowHandle {
        match self.never {}
    }

    pub fn announce(&self) {
        match self.never {}
    }

    pub fn with_transport<R>(&self, _f: impl FnOnce(&mut Transport) -> R) -> Option<R> {
        match self.never {}
    }

    pub fn queue_handle(&self) -> QueueHandle {
        match self.never {}
    }

    pub fn run_message_loop(&self) -> Result<(), TransportError> {
        match self.never {}
    }
}
