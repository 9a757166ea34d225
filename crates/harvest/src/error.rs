//! Error types for harvesting.

/// Errors produced while reading a foreign tray.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("no foreign shell tray is running")]
    NoForeignTray,

    #[error("{call} failed with error {code}")]
    Win32 { call: &'static str, code: u32 },

    #[error("remote read of {len} bytes at {address:#x} failed")]
    RemoteRead { address: u64, len: usize },

    #[error("remote read of {len} bytes exceeds the {cap} byte cap")]
    ReadTooLarge { len: usize, cap: usize },

    #[error("{what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("tray notify interface call failed: HRESULT {0:#010x}")]
    Com(i32),

    #[error("auto-tray preference interface is unavailable")]
    AutoTrayUnavailable,

    #[error("harvesting is only available on Windows")]
    Unsupported,
}
