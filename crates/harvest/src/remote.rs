//! Bounded reads of foreign process memory and the records found there.
//!
//! The foreign tray keeps one `TBBUTTON` per icon in its toolbar; the
//! button's `dwData` points at a private `TRAYDATA` record. Both layouts
//! depend on the pointer width of the foreign process.
//!
//! ```text
//! TBBUTTON            64-bit   32-bit
//!   iBitmap   i32       @0       @0
//!   idCommand i32       @4       @4
//!   fsState   u8        @8       @8
//!   fsStyle   u8        @9       @9
//!   dwData    ptr       @16      @12
//!   iString   ptr       @24      @16
//!   size                32       20
//!
//! TRAYDATA            64-bit   32-bit
//!   hWnd      ptr       @0       @0
//!   uID       u32       @8       @4
//!   uCallback u32       @12      @8
//!   dwState   u32       @16      @12
//!   uVersion  u32       @20      @16
//!   hIcon     ptr       @24      @20
//!   exe  [u16;260]      @48      @36
//!   tip  [u16;260]      @568     @556
//!   guid [u8;16]        @1092    @1080
//!   size                1108     1096
//! ```

use uuid::Uuid;

use shelltray_protocol::wire::{read_guid, read_utf16};
use shelltray_protocol::{IconHandle, WindowHandle, WireMessage};

use crate::error::HarvestError;

/// Largest single remote read. Everything we read is far smaller; a bigger
/// request means a corrupt length.
pub const MAX_REMOTE_READ: usize = 4096;

const PATH_CHARS: usize = 260;

/// Read access to another process's address space.
///
/// Every call is one bounded attempt: no retries, and a failure only
/// affects the item being read.
pub trait RemoteMemory {
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, HarvestError>;
}

/// Rejects zero addresses and lengths over [`MAX_REMOTE_READ`] before
/// touching the foreign process.
pub fn check_read(address: u64, len: usize) -> Result<(), HarvestError> {
    if address == 0 {
        return Err(HarvestError::RemoteRead { address, len });
    }
    if len > MAX_REMOTE_READ {
        return Err(HarvestError::ReadTooLarge {
            len,
            cap: MAX_REMOTE_READ,
        });
    }
    Ok(())
}

/// Pointer width of the foreign process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn button_size(self) -> usize {
        match self {
            Self::Bits32 => 20,
            Self::Bits64 => 32,
        }
    }

    pub fn tray_data_size(self) -> usize {
        match self {
            Self::Bits32 => 1096,
            Self::Bits64 => 1108,
        }
    }

    fn read_ptr(self, buf: &[u8], offset: usize) -> u64 {
        match self {
            Self::Bits32 => u64::from(read_u32(buf, offset)),
            Self::Bits64 => read_u64(buf, offset),
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn ensure_len(what: &'static str, buf: &[u8], expected: usize) -> Result<(), HarvestError> {
    if buf.len() < expected {
        return Err(HarvestError::Truncated {
            what,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// The parts of a toolbar button we need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TbButton {
    pub command: i32,
    pub state: u8,
    /// Address of the button's `TRAYDATA` in the foreign process.
    pub data: u64,
}

impl TbButton {
    pub fn parse(width: PointerWidth, buf: &[u8]) -> Result<Self, HarvestError> {
        ensure_len("TBBUTTON", buf, width.button_size())?;
        let data_offset = match width {
            PointerWidth::Bits32 => 12,
            PointerWidth::Bits64 => 16,
        };
        Ok(Self {
            command: read_u32(buf, 4) as i32,
            state: buf[8],
            data: width.read_ptr(buf, data_offset),
        })
    }
}

/// A foreign tray's private per-icon record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayData {
    pub window: WindowHandle,
    pub sub_id: u32,
    pub callback_message: u32,
    pub state: u32,
    pub version: u32,
    pub icon: IconHandle,
    pub exe_path: String,
    pub tooltip: String,
    pub guid: Uuid,
}

struct TrayDataLayout {
    uid: usize,
    callback: usize,
    state: usize,
    version: usize,
    icon: usize,
    exe: usize,
    tip: usize,
    guid: usize,
}

const LAYOUT_32: TrayDataLayout = TrayDataLayout {
    uid: 4,
    callback: 8,
    state: 12,
    version: 16,
    icon: 20,
    exe: 36,
    tip: 556,
    guid: 1080,
};

const LAYOUT_64: TrayDataLayout = TrayDataLayout {
    uid: 8,
    callback: 12,
    state: 16,
    version: 20,
    icon: 24,
    exe: 48,
    tip: 568,
    guid: 1092,
};

impl TrayData {
    pub fn parse(width: PointerWidth, buf: &[u8]) -> Result<Self, HarvestError> {
        ensure_len("TRAYDATA", buf, width.tray_data_size())?;
        let layout = match width {
            PointerWidth::Bits32 => &LAYOUT_32,
            PointerWidth::Bits64 => &LAYOUT_64,
        };
        Ok(Self {
            // Window handles only carry 32 significant bits.
            window: WindowHandle::from_wire(width.read_ptr(buf, 0) as u32),
            sub_id: read_u32(buf, layout.uid),
            callback_message: read_u32(buf, layout.callback),
            state: read_u32(buf, layout.state),
            version: read_u32(buf, layout.version),
            icon: IconHandle(width.read_ptr(buf, layout.icon)),
            exe_path: read_utf16(buf, layout.exe, PATH_CHARS),
            tooltip: read_utf16(buf, layout.tip, PATH_CHARS),
            guid: read_guid(buf, layout.guid),
        })
    }

    pub fn is_hidden(&self) -> bool {
        self.state & shelltray_protocol::constants::NIS_HIDDEN != 0
    }

    /// The datagram a live `NIM_ADD` for this icon would have carried.
    pub fn to_message(&self) -> WireMessage {
        let message = WireMessage::new(self.window, self.sub_id)
            .with_callback_message(self.callback_message)
            .with_icon(self.icon)
            .with_tooltip(self.tooltip.clone())
            .with_hidden(self.is_hidden());
        if self.guid.is_nil() {
            message
        } else {
            message.with_stable_id(self.guid)
        }
    }

    /// Version to replay with `SetVersion`, if the record negotiated one.
    pub fn negotiated_version(&self) -> Option<u32> {
        (1..=4).contains(&self.version).then_some(self.version)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    use shelltray_protocol::constants::{NIF_GUID, NIF_ICON, NIF_MESSAGE, NIF_STATE, NIF_TIP};

    #[test]
    fn check_read_caps_length() {
        assert!(check_read(0x1000, MAX_REMOTE_READ).is_ok());
        assert!(matches!(
            check_read(0x1000, MAX_REMOTE_READ + 1),
            Err(HarvestError::ReadTooLarge { .. })
        ));
        assert!(matches!(
            check_read(0, 4),
            Err(HarvestError::RemoteRead { address: 0, .. })
        ));
    }

    #[test]
    fn button_64_data_pointer() {
        let buf = button_64(7, 0x0000_7FF6_1234_5678);
        let button = TbButton::parse(PointerWidth::Bits64, &buf).unwrap();
        assert_eq!(button.command, 7);
        assert_eq!(button.data, 0x0000_7FF6_1234_5678);
    }

    #[test]
    fn button_32_data_pointer() {
        let mut buf = vec![0u8; 20];
        put_u32(&mut buf, 4, 3);
        buf[8] = 0x04;
        put_u32(&mut buf, 12, 0x0040_1000);
        let button = TbButton::parse(PointerWidth::Bits32, &buf).unwrap();
        assert_eq!(button.command, 3);
        assert_eq!(button.state, 0x04);
        assert_eq!(button.data, 0x0040_1000);
    }

    #[test]
    fn short_button_is_rejected() {
        let err = TbButton::parse(PointerWidth::Bits64, &[0u8; 20]).unwrap_err();
        assert!(matches!(err, HarvestError::Truncated { expected: 32, .. }));
    }

    #[test]
    fn tray_data_64_fields() {
        let guid = Uuid::from_u128(0x1122_3344_5566_7788_99AA_BBCC_DDEE_FF00);
        let buf = tray_data_64(0x10_0000, 5, true, "Battery: 80%", guid);
        let data = TrayData::parse(PointerWidth::Bits64, &buf).unwrap();

        assert_eq!(data.window, WindowHandle(0x10_0000));
        assert_eq!(data.sub_id, 5);
        assert_eq!(data.callback_message, 0x8005);
        assert!(data.is_hidden());
        assert_eq!(data.version, 4);
        assert_eq!(data.icon, IconHandle(0xABCD));
        assert_eq!(data.exe_path, r"C:\Apps\tool.exe");
        assert_eq!(data.tooltip, "Battery: 80%");
        assert_eq!(data.guid, guid);
    }

    #[test]
    fn tray_data_64_window_keeps_low_32_bits() {
        let buf = tray_data_64(0xFFFF_FFFF_8000_0100, 3, false, "Sync", Uuid::nil());
        let data = TrayData::parse(PointerWidth::Bits64, &buf).unwrap();
        assert_eq!(data.window, WindowHandle(0x8000_0100));
        assert_eq!(data.to_message().window, WindowHandle::from_wire(0x8000_0100));
    }

    #[test]
    fn tray_data_32_fields() {
        let mut buf = vec![0u8; PointerWidth::Bits32.tray_data_size()];
        put_u32(&mut buf, 0, 0x2000);
        put_u32(&mut buf, 4, 9);
        put_u32(&mut buf, 8, 0x401);
        put_u32(&mut buf, 16, 3);
        put_u32(&mut buf, 20, 0x77);
        put_utf16(&mut buf, 556, "Sync");

        let data = TrayData::parse(PointerWidth::Bits32, &buf).unwrap();
        assert_eq!(data.window, WindowHandle(0x2000));
        assert_eq!(data.sub_id, 9);
        assert_eq!(data.callback_message, 0x401);
        assert!(!data.is_hidden());
        assert_eq!(data.negotiated_version(), Some(3));
        assert_eq!(data.icon, IconHandle(0x77));
        assert_eq!(data.tooltip, "Sync");
        assert!(data.guid.is_nil());
    }

    #[test]
    fn synthesized_message_flags() {
        let plain = TrayData::parse(
            PointerWidth::Bits64,
            &tray_data_64(1, 1, false, "x", Uuid::nil()),
        )
        .unwrap()
        .to_message();
        assert_eq!(plain.flags, NIF_MESSAGE | NIF_ICON | NIF_TIP | NIF_STATE);
        assert_eq!(plain.hidden(), Some(false));

        let guid = Uuid::from_u128(42);
        let with_guid = TrayData::parse(PointerWidth::Bits64, &tray_data_64(1, 1, true, "x", guid))
            .unwrap()
            .to_message();
        assert!(with_guid.has(NIF_GUID));
        assert_eq!(with_guid.stable_id(), Some(guid));
        assert_eq!(with_guid.hidden(), Some(true));
    }

    #[test]
    fn version_zero_or_out_of_range_is_not_replayed() {
        let mut data =
            TrayData::parse(PointerWidth::Bits64, &tray_data_64(1, 1, false, "", Uuid::nil()))
                .unwrap();
        data.version = 0;
        assert_eq!(data.negotiated_version(), None);
        data.version = 7;
        assert_eq!(data.negotiated_version(), None);
    }
}
