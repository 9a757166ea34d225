//! Numeric values fixed by the emulated shell protocol.
//!
//! None of these may be renumbered: third-party applications compile them
//! into their binaries.

/// Signature stamped at the start of every systray and placement payload.
pub const TRAY_SIGNATURE: u32 = 0x3475_3423;

/// `Shell_NotifyIcon` message codes carried in the systray payload.
pub const NIM_ADD: u32 = 0x0000_0000;
pub const NIM_MODIFY: u32 = 0x0000_0001;
pub const NIM_DELETE: u32 = 0x0000_0002;
pub const NIM_SETFOCUS: u32 = 0x0000_0003;
pub const NIM_SETVERSION: u32 = 0x0000_0004;

/// Field-presence bits (`uFlags`).
pub const NIF_MESSAGE: u32 = 0x0000_0001;
pub const NIF_ICON: u32 = 0x0000_0002;
pub const NIF_TIP: u32 = 0x0000_0004;
pub const NIF_STATE: u32 = 0x0000_0008;
pub const NIF_INFO: u32 = 0x0000_0010;
pub const NIF_GUID: u32 = 0x0000_0020;

/// Icon state bit: icon is hidden.
pub const NIS_HIDDEN: u32 = 0x0000_0001;

/// Highest protocol version an icon may request.
pub const NOTIFYICON_VERSION_4: u32 = 4;

/// Placement query call numbers (`dwMessage` of the identifier payload).
pub const PLACEMENT_TOP_LEFT: u32 = 1;
pub const PLACEMENT_BOTTOM_RIGHT: u32 = 2;

/// Mouse messages delivered to icon owners.
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_LBUTTONDBLCLK: u32 = 0x0203;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_RBUTTONDBLCLK: u32 = 0x0206;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MBUTTONDBLCLK: u32 = 0x0209;
pub const WM_CONTEXTMENU: u32 = 0x007B;

const WM_USER: u32 = 0x0400;

/// Notification events only sent to version 4 icons (except the balloon set,
/// which every version receives).
pub const NIN_SELECT: u32 = WM_USER;
pub const NIN_KEYSELECT: u32 = WM_USER + 1;
pub const NIN_BALLOONSHOW: u32 = WM_USER + 2;
pub const NIN_BALLOONHIDE: u32 = WM_USER + 3;
pub const NIN_BALLOONTIMEOUT: u32 = WM_USER + 4;
pub const NIN_BALLOONUSERCLICK: u32 = WM_USER + 5;
pub const NIN_POPUPOPEN: u32 = WM_USER + 6;
pub const NIN_POPUPCLOSE: u32 = WM_USER + 7;

/// Stable id the legacy volume control probes before its icon exists.
pub const VOLUME_ICON_GUID: &str = "7820ae73-23e3-4229-82c1-e41cb67d5b9c";

/// Packs two 16-bit halves the way `MAKELONG` does.
pub fn make_long(low: i32, high: i32) -> u32 {
    ((high as u32 & 0xFFFF) << 16) | (low as u32 & 0xFFFF)
}
