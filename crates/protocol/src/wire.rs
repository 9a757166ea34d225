//! Systray datagram (discriminant 1) and its decoded form.
//!
//! # Wire format
//!
//! ```text
//! SHELLTRAYDATA (964 bytes, little-endian):
//!   @0    u32  signature (0x34753423)
//!   @4    u32  message code (NIM_*)
//!   @8    NOTIFYICONDATA32:
//!     @8    u32       cbSize
//!     @12   u32       hWnd
//!     @16   u32       uID
//!     @20   u32       uFlags (NIF_*)
//!     @24   u32       uCallbackMessage
//!     @28   u32       hIcon
//!     @32   [u16;128] szTip
//!     @288  u32       dwState
//!     @292  u32       dwStateMask
//!     @296  [u16;256] szInfo
//!     @808  u32       uTimeout / uVersion
//!     @812  [u16;64]  szInfoTitle
//!     @940  u32       dwInfoFlags
//!     @944  [u8;16]   guidItem (mixed-endian GUID)
//!     @960  u32       hBalloonIcon
//! ```

use uuid::Uuid;

use crate::constants::{
    NIF_GUID, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_STATE, NIF_TIP, NIM_ADD, NIM_DELETE,
    NIM_MODIFY, NIM_SETFOCUS, NIM_SETVERSION, NIS_HIDDEN, TRAY_SIGNATURE,
};
use crate::error::ProtocolError;
use crate::types::{IconHandle, WindowHandle};

/// Size of the whole systray payload.
pub const TRAY_DATA_SIZE: usize = 964;

/// Size of the embedded `NOTIFYICONDATA32` (value of its `cbSize`).
pub const NOTIFY_ICON_DATA_SIZE: u32 = 956;

pub(crate) const TIP_CHARS: usize = 128;
pub(crate) const INFO_CHARS: usize = 256;
pub(crate) const INFO_TITLE_CHARS: usize = 64;

const OFF_SIGNATURE: usize = 0;
const OFF_MESSAGE: usize = 4;
const OFF_CB_SIZE: usize = 8;
const OFF_HWND: usize = 12;
const OFF_UID: usize = 16;
const OFF_FLAGS: usize = 20;
const OFF_CALLBACK: usize = 24;
const OFF_ICON: usize = 28;
const OFF_TIP: usize = 32;
const OFF_STATE: usize = 288;
const OFF_STATE_MASK: usize = 292;
const OFF_INFO: usize = 296;
const OFF_VERSION: usize = 808;
const OFF_INFO_TITLE: usize = 812;
const OFF_INFO_FLAGS: usize = 940;
const OFF_GUID: usize = 944;
const OFF_BALLOON_ICON: usize = 960;

/// What a systray datagram asks the registry to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Add,
    Modify,
    Delete,
    SetFocus,
    SetVersion,
}

impl MessageKind {
    pub fn from_code(code: u32) -> Result<Self, ProtocolError> {
        match code {
            NIM_ADD => Ok(Self::Add),
            NIM_MODIFY => Ok(Self::Modify),
            NIM_DELETE => Ok(Self::Delete),
            NIM_SETFOCUS => Ok(Self::SetFocus),
            NIM_SETVERSION => Ok(Self::SetVersion),
            other => Err(ProtocolError::UnknownMessage(other)),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Add => NIM_ADD,
            Self::Modify => NIM_MODIFY,
            Self::Delete => NIM_DELETE,
            Self::SetFocus => NIM_SETFOCUS,
            Self::SetVersion => NIM_SETVERSION,
        }
    }
}

/// Balloon notification carried by a datagram with `NIF_INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balloon {
    pub title: String,
    pub text: String,
    pub flags: u32,
    pub timeout_ms: u32,
    pub icon: IconHandle,
}

/// Snapshot of one inbound systray datagram.
///
/// Raw fields are public so the harvester and tests can build messages, but
/// consumers should read through the accessors: they return `None` when the
/// field's presence bit is not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireMessage {
    pub window: WindowHandle,
    pub sub_id: u32,
    pub flags: u32,
    pub callback_message: u32,
    pub icon: IconHandle,
    pub tooltip: String,
    pub state: u32,
    pub state_mask: u32,
    pub balloon_text: String,
    pub balloon_title: String,
    pub balloon_flags: u32,
    pub balloon_icon: IconHandle,
    /// `uTimeout` for balloons, `uVersion` for `NIM_SETVERSION` (same slot).
    pub timeout_or_version: u32,
    pub guid: Uuid,
}

impl WireMessage {
    /// Creates an empty message for the given session identity.
    pub fn new(window: WindowHandle, sub_id: u32) -> Self {
        Self {
            window,
            sub_id,
            ..Self::default()
        }
    }

    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn with_callback_message(mut self, message: u32) -> Self {
        self.flags |= NIF_MESSAGE;
        self.callback_message = message;
        self
    }

    pub fn with_icon(mut self, icon: IconHandle) -> Self {
        self.flags |= NIF_ICON;
        self.icon = icon;
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.flags |= NIF_TIP;
        self.tooltip = tooltip.into();
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.flags |= NIF_STATE;
        self.state_mask |= NIS_HIDDEN;
        if hidden {
            self.state |= NIS_HIDDEN;
        } else {
            self.state &= !NIS_HIDDEN;
        }
        self
    }

    pub fn with_stable_id(mut self, guid: Uuid) -> Self {
        self.flags |= NIF_GUID;
        self.guid = guid;
        self
    }

    pub fn with_balloon(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.flags |= NIF_INFO;
        self.balloon_title = title.into();
        self.balloon_text = text.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.timeout_or_version = version;
        self
    }

    pub fn callback_message(&self) -> Option<u32> {
        self.has(NIF_MESSAGE).then_some(self.callback_message)
    }

    pub fn icon(&self) -> Option<IconHandle> {
        self.has(NIF_ICON).then_some(self.icon)
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.has(NIF_TIP).then_some(self.tooltip.as_str())
    }

    /// Hidden flag, when the state bit is present and the mask covers it.
    ///
    /// A zero mask is treated as covering `NIS_HIDDEN`; several legacy
    /// callers never fill the mask.
    pub fn hidden(&self) -> Option<bool> {
        if !self.has(NIF_STATE) {
            return None;
        }
        let mask = if self.state_mask == 0 {
            NIS_HIDDEN
        } else {
            self.state_mask
        };
        (mask & NIS_HIDDEN != 0).then_some(self.state & NIS_HIDDEN != 0)
    }

    /// Stable id, when present and not the nil GUID.
    pub fn stable_id(&self) -> Option<Uuid> {
        (self.has(NIF_GUID) && !self.guid.is_nil()).then_some(self.guid)
    }

    pub fn balloon(&self) -> Option<Balloon> {
        if !self.has(NIF_INFO) {
            return None;
        }
        Some(Balloon {
            title: self.balloon_title.clone(),
            text: self.balloon_text.clone(),
            flags: self.balloon_flags,
            timeout_ms: self.timeout_or_version,
            icon: self.balloon_icon,
        })
    }

    /// Requested protocol version (meaningful for `SetVersion` only).
    pub fn version(&self) -> u32 {
        self.timeout_or_version
    }
}

/// A decoded systray payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconDatagram {
    pub kind: MessageKind,
    pub message: WireMessage,
}

impl IconDatagram {
    /// Decodes a `SHELLTRAYDATA` payload.
    ///
    /// Trailing bytes past the fixed layout are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < TRAY_DATA_SIZE {
            return Err(ProtocolError::Truncated {
                what: "systray datagram",
                expected: TRAY_DATA_SIZE,
                actual: payload.len(),
            });
        }

        let signature = read_u32(payload, OFF_SIGNATURE);
        if signature != TRAY_SIGNATURE {
            return Err(ProtocolError::BadSignature(signature));
        }
        let kind = MessageKind::from_code(read_u32(payload, OFF_MESSAGE))?;

        let message = WireMessage {
            window: WindowHandle::from_wire(read_u32(payload, OFF_HWND)),
            sub_id: read_u32(payload, OFF_UID),
            flags: read_u32(payload, OFF_FLAGS),
            callback_message: read_u32(payload, OFF_CALLBACK),
            icon: IconHandle(u64::from(read_u32(payload, OFF_ICON))),
            tooltip: read_utf16(payload, OFF_TIP, TIP_CHARS),
            state: read_u32(payload, OFF_STATE),
            state_mask: read_u32(payload, OFF_STATE_MASK),
            balloon_text: read_utf16(payload, OFF_INFO, INFO_CHARS),
            timeout_or_version: read_u32(payload, OFF_VERSION),
            balloon_title: read_utf16(payload, OFF_INFO_TITLE, INFO_TITLE_CHARS),
            balloon_flags: read_u32(payload, OFF_INFO_FLAGS),
            guid: read_guid(payload, OFF_GUID),
            balloon_icon: IconHandle(u64::from(read_u32(payload, OFF_BALLOON_ICON))),
        };

        Ok(Self { kind, message })
    }

    /// Encodes the datagram the way `Shell_NotifyIcon` lays it out.
    ///
    /// Every field is written regardless of the presence bits; strings longer
    /// than their fixed slot are truncated to leave room for the terminator.
    pub fn encode(&self) -> Vec<u8> {
        let m = &self.message;
        let mut buf = vec![0u8; TRAY_DATA_SIZE];
        write_u32(&mut buf, OFF_SIGNATURE, TRAY_SIGNATURE);
        write_u32(&mut buf, OFF_MESSAGE, self.kind.code());
        write_u32(&mut buf, OFF_CB_SIZE, NOTIFY_ICON_DATA_SIZE);
        write_u32(&mut buf, OFF_HWND, m.window.to_wire());
        write_u32(&mut buf, OFF_UID, m.sub_id);
        write_u32(&mut buf, OFF_FLAGS, m.flags);
        write_u32(&mut buf, OFF_CALLBACK, m.callback_message);
        write_u32(&mut buf, OFF_ICON, m.icon.0 as u32);
        write_utf16(&mut buf, OFF_TIP, TIP_CHARS, &m.tooltip);
        write_u32(&mut buf, OFF_STATE, m.state);
        write_u32(&mut buf, OFF_STATE_MASK, m.state_mask);
        write_utf16(&mut buf, OFF_INFO, INFO_CHARS, &m.balloon_text);
        write_u32(&mut buf, OFF_VERSION, m.timeout_or_version);
        write_utf16(&mut buf, OFF_INFO_TITLE, INFO_TITLE_CHARS, &m.balloon_title);
        write_u32(&mut buf, OFF_INFO_FLAGS, m.balloon_flags);
        buf[OFF_GUID..OFF_GUID + 16].copy_from_slice(&m.guid.to_bytes_le());
        write_u32(&mut buf, OFF_BALLOON_ICON, m.balloon_icon.0 as u32);
        buf
    }
}

/// Reads a little-endian `u32`. Callers check bounds first.
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Reads a Windows `GUID` (first three groups little-endian).
pub fn read_guid(buf: &[u8], offset: usize) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    Uuid::from_bytes_le(bytes)
}

/// Reads a NUL-terminated UTF-16LE string from a fixed slot of `chars` units.
///
/// A slot without a terminator is read to its end.
pub fn read_utf16(buf: &[u8], offset: usize, chars: usize) -> String {
    let units: Vec<u16> = buf[offset..offset + chars * 2]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

pub(crate) fn write_utf16(buf: &mut [u8], offset: usize, chars: usize, value: &str) {
    for (i, unit) in value.encode_utf16().take(chars - 1).enumerate() {
        let at = offset + i * 2;
        buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
    }
}
