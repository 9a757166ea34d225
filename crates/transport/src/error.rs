//! Error types for the transport layer.

use shelltray_protocol::ProtocolError;
use shelltray_registry::RegistryError;

/// Errors produced while receiving or dispatching tray traffic.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A Win32 call failed; carries the `GetLastError` code.
    #[error("{call} failed with error {code}")]
    Win32 { call: &'static str, code: u32 },

    #[error("another shell tray window is already owned by this process")]
    AlreadyHosting,

    #[error("dispatch queue is closed")]
    QueueClosed,

    #[error("shell tray hosting is only available on Windows")]
    Unsupported,
}
