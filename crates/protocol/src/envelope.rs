//! Outer `WM_COPYDATA` envelope.
//!
//! The shell tray window receives every protocol request as a copy-data
//! message: a discriminant (`dwData`) and an opaque byte payload. The sender
//! window travels alongside so unhandled traffic can be forwarded verbatim.

use crate::types::WindowHandle;

/// Discriminant values fixed by the emulated protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discriminant {
    AppBar,
    Systray,
    Placement,
    /// Anything else, including the reserved value 2.
    Other(usize),
}

impl Discriminant {
    pub fn from_raw(raw: usize) -> Self {
        match raw {
            0 => Self::AppBar,
            1 => Self::Systray,
            3 => Self::Placement,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> usize {
        match self {
            Self::AppBar => 0,
            Self::Systray => 1,
            Self::Placement => 3,
            Self::Other(raw) => raw,
        }
    }
}

/// One inbound copy-data request. Borrowed: the payload only lives for the
/// duration of the send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub sender: WindowHandle,
    pub discriminant: usize,
    pub payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    pub fn new(sender: WindowHandle, discriminant: usize, payload: &'a [u8]) -> Self {
        Self {
            sender,
            discriminant,
            payload,
        }
    }

    pub fn kind(&self) -> Discriminant {
        Discriminant::from_raw(self.discriminant)
    }

    /// Copies the envelope so it can outlive the send (used when a request
    /// has to be queued).
    pub fn detach(&self) -> OwnedEnvelope {
        OwnedEnvelope {
            sender: self.sender,
            discriminant: self.discriminant,
            payload: self.payload.to_vec(),
        }
    }
}

/// Owned copy of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedEnvelope {
    pub sender: WindowHandle,
    pub discriminant: usize,
    pub payload: Vec<u8>,
}

impl OwnedEnvelope {
    pub fn as_envelope(&self) -> Envelope<'_> {
        Envelope::new(self.sender, self.discriminant, &self.payload)
    }
}
