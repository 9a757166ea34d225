//! Error types for payload decoding.

/// Errors produced while decoding an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("payload too short for {what}: {actual} bytes (need {expected})")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("bad signature {0:#010x}")]
    BadSignature(u32),

    #[error("unknown message code {0}")]
    UnknownMessage(u32),

    #[error("unknown placement call {0}")]
    UnknownPlacementCall(u32),
}
