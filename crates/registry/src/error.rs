//! Error types for registry operations.

use shelltray_protocol::WindowHandle;

use crate::registry::IconKey;

/// Errors produced by the icon registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no icon registered for window {window} id {sub_id}")]
    UnknownIcon { window: WindowHandle, sub_id: u32 },

    #[error("new icon with id {sub_id} has no owner window")]
    MissingWindow { sub_id: u32 },

    #[error("unsupported icon version {0}")]
    InvalidVersion(u32),

    #[error("no icon with key {0}")]
    UnknownKey(IconKey),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pin file: {0}")]
    PinFormat(#[from] toml::de::Error),

    #[error("failed to encode pin file: {0}")]
    PinEncode(#[from] toml::ser::Error),
}
