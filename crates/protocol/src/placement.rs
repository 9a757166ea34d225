//! Placement query payload (discriminant 3).
//!
//! ```text
//! WINNOTIFYICONIDENTIFIER (40 bytes, little-endian):
//!   @0   u32      magic (0x34753423)
//!   @4   u32      call number: 1 = top-left, 2 = bottom-right
//!   @8   u32      cbSize
//!   @12  u32      padding
//!   @16  u32      hWnd
//!   @20  u32      uID
//!   @24  [u8;16]  guidItem
//! ```
//!
//! The owner asks twice; each reply packs one corner with `MAKELONG(x, y)`.

use uuid::Uuid;

use crate::constants::{PLACEMENT_BOTTOM_RIGHT, PLACEMENT_TOP_LEFT, TRAY_SIGNATURE, make_long};
use crate::error::ProtocolError;
use crate::types::{Rect, WindowHandle};
use crate::wire::{read_guid, read_u32, write_u32};

pub const PLACEMENT_QUERY_SIZE: usize = 40;

/// Which corner a placement call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementCorner {
    TopLeft,
    BottomRight,
}

impl PlacementCorner {
    /// Packs the requested corner of `rect` into a reply value.
    pub fn reply(self, rect: &Rect) -> u32 {
        match self {
            Self::TopLeft => make_long(rect.left, rect.top),
            Self::BottomRight => make_long(rect.right, rect.bottom),
        }
    }
}

/// A decoded placement query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementQuery {
    pub corner: PlacementCorner,
    pub window: WindowHandle,
    pub sub_id: u32,
    pub guid: Uuid,
}

impl PlacementQuery {
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < PLACEMENT_QUERY_SIZE {
            return Err(ProtocolError::Truncated {
                what: "placement query",
                expected: PLACEMENT_QUERY_SIZE,
                actual: payload.len(),
            });
        }
        let magic = read_u32(payload, 0);
        if magic != TRAY_SIGNATURE {
            return Err(ProtocolError::BadSignature(magic));
        }
        let corner = match read_u32(payload, 4) {
            PLACEMENT_TOP_LEFT => PlacementCorner::TopLeft,
            PLACEMENT_BOTTOM_RIGHT => PlacementCorner::BottomRight,
            other => return Err(ProtocolError::UnknownPlacementCall(other)),
        };
        Ok(Self {
            corner,
            window: WindowHandle::from_wire(read_u32(payload, 16)),
            sub_id: read_u32(payload, 20),
            guid: read_guid(payload, 24),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PLACEMENT_QUERY_SIZE];
        write_u32(&mut buf, 0, TRAY_SIGNATURE);
        let call = match self.corner {
            PlacementCorner::TopLeft => PLACEMENT_TOP_LEFT,
            PlacementCorner::BottomRight => PLACEMENT_BOTTOM_RIGHT,
        };
        write_u32(&mut buf, 4, call);
        write_u32(&mut buf, 8, PLACEMENT_QUERY_SIZE as u32);
        write_u32(&mut buf, 16, self.window.to_wire());
        write_u32(&mut buf, 20, self.sub_id);
        buf[24..40].copy_from_slice(&self.guid.to_bytes_le());
        buf
    }

    /// Stable id of the query, when not the nil GUID.
    pub fn stable_id(&self) -> Option<Uuid> {
        (!self.guid.is_nil()).then_some(self.guid)
    }
}
