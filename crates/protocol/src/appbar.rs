//! App-bar payload (discriminant 0).
//!
//! App-bar negotiation is handled outside this engine; the typed view below
//! only exists so a handler does not have to re-parse offsets. The raw bytes
//! always travel with it.
//!
//! ```text
//! APPBARMSGDATAV3 (80 bytes, little-endian):
//!   @0   u32   abd.cbSize
//!   @8   u64   abd.hWnd
//!   @16  u32   abd.uCallbackMessage
//!   @24  u32   abd.uEdge
//!   @28  RECT  abd.rc (4 x i32)
//!   @48  i64   abd.lParam
//!   @56  u32   dwMessage (ABM_*)
//!   @64  u64   hSharedMemory
//!   @72  u32   dwSourceProcessId
//! ```

use crate::error::ProtocolError;
use crate::types::{Rect, WindowHandle};
use crate::wire::read_u32;

pub const APPBAR_MESSAGE_SIZE: usize = 80;

/// Typed view over an app-bar request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppBarRequest<'a> {
    pub message: u32,
    pub window: WindowHandle,
    pub callback_message: u32,
    pub edge: u32,
    pub rect: Rect,
    pub lparam: i64,
    pub shared_memory: u64,
    pub source_pid: u32,
    pub raw: &'a [u8],
}

impl<'a> AppBarRequest<'a> {
    pub fn parse(raw: &'a [u8]) -> Result<Self, ProtocolError> {
        if raw.len() < APPBAR_MESSAGE_SIZE {
            return Err(ProtocolError::Truncated {
                what: "app-bar message",
                expected: APPBAR_MESSAGE_SIZE,
                actual: raw.len(),
            });
        }
        Ok(Self {
            window: WindowHandle(read_u64(raw, 8)),
            callback_message: read_u32(raw, 16),
            edge: read_u32(raw, 24),
            rect: Rect::new(
                read_u32(raw, 28) as i32,
                read_u32(raw, 32) as i32,
                read_u32(raw, 36) as i32,
                read_u32(raw, 40) as i32,
            ),
            lparam: read_u64(raw, 48) as i64,
            message: read_u32(raw, 56),
            shared_memory: read_u64(raw, 64),
            source_pid: read_u32(raw, 72),
            raw,
        })
    }
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
