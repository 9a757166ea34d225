//! Win32 access to the running shell's tray toolbar and its auto-tray
//! preference.

use std::ffi::c_void;
use std::ptr::{null, null_mut};

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, HWND};
use windows_sys::Win32::System::Com::{
    CLSCTX_LOCAL_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows_sys::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows_sys::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAllocEx, VirtualFreeEx,
};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcessId, IsWow64Process, OpenProcess, PROCESS_QUERY_INFORMATION,
    PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};
use windows_sys::Win32::UI::Controls::{TB_BUTTONCOUNT, TB_GETBUTTON};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, GetWindowThreadProcessId, SMTO_ABORTIFHUNG, SendMessageTimeoutW,
};
use windows_sys::core::GUID;

use crate::autotray::{AutoTrayControl, TrayNotifyCapability};
use crate::error::HarvestError;
use crate::foreign::ForeignTray;
use crate::remote::{PointerWidth, RemoteMemory, check_read};

const TOOLBAR_TIMEOUT_MS: u32 = 2_000;

const CLSID_TRAY_NOTIFY: GUID = GUID::from_u128(0x25dead04_1eac_4911_9e3a_ad0a4ab560fd);
const IID_TRAY_NOTIFY_WIN8: GUID = GUID::from_u128(0xd133ce13_3537_48ba_93a7_afcd5d2053b4);
const IID_TRAY_NOTIFY_LEGACY: GUID = GUID::from_u128(0xfb852b2c_6bad_4605_9551_f15f87830935);

/// `EnableAutoTray` position in each interface's vtable.
const ENABLE_AUTO_TRAY_WIN8: usize = 6;
const ENABLE_AUTO_TRAY_LEGACY: usize = 5;
const RELEASE: usize = 2;

const EXPLORER_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer";

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error(call: &'static str) -> HarvestError {
    HarvestError::Win32 {
        call,
        code: unsafe { GetLastError() },
    }
}

fn window_pid(hwnd: HWND) -> u32 {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
    pid
}

fn find_child(parent: HWND, class: &str) -> Option<HWND> {
    let class = wide(class);
    let found = unsafe { FindWindowExW(parent, null_mut(), class.as_ptr(), null()) };
    (!found.is_null()).then_some(found)
}

/// `Shell_TrayWnd` → `TrayNotifyWnd` → `SysPager` → `ToolbarWindow32`,
/// starting from a tray window that is not ours.
fn find_toolbar() -> Option<HWND> {
    let class = wide("Shell_TrayWnd");
    let own_pid = unsafe { GetCurrentProcessId() };
    let mut tray: HWND = null_mut();
    loop {
        tray = unsafe { FindWindowExW(null_mut(), tray, class.as_ptr(), null()) };
        if tray.is_null() {
            return None;
        }
        if window_pid(tray) == own_pid {
            continue;
        }
        let toolbar = find_child(tray, "TrayNotifyWnd")
            .and_then(|notify| find_child(notify, "SysPager"))
            .and_then(|pager| find_child(pager, "ToolbarWindow32"));
        if toolbar.is_some() {
            return toolbar;
        }
    }
}

/// Process handle closed on drop.
struct OwnedProcess(HANDLE);

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

/// One page allocated inside the foreign process, released on drop.
struct ScratchBuffer {
    process: HANDLE,
    address: *mut c_void,
}

impl ScratchBuffer {
    const SIZE: usize = 4096;

    fn allocate(process: HANDLE) -> Result<Self, HarvestError> {
        let address = unsafe {
            VirtualAllocEx(
                process,
                null(),
                Self::SIZE,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };
        if address.is_null() {
            return Err(last_error("VirtualAllocEx"));
        }
        Ok(Self { process, address })
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        unsafe { VirtualFreeEx(self.process, self.address, 0, MEM_RELEASE) };
    }
}

/// Reads from a foreign process with `ReadProcessMemory`.
pub struct ProcessMemory {
    process: HANDLE,
}

impl RemoteMemory for ProcessMemory {
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, HarvestError> {
        check_read(address, len)?;
        let mut buf = vec![0u8; len];
        let mut read = 0usize;
        let ok = unsafe {
            ReadProcessMemory(
                self.process,
                address as usize as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                len,
                &mut read,
            )
        };
        if ok == 0 || read != len {
            return Err(HarvestError::RemoteRead { address, len });
        }
        Ok(buf)
    }
}

/// The running shell's tray toolbar.
///
/// Field order matters: the scratch buffer is freed before the process
/// handle it was allocated through is closed.
pub struct Win32ForeignTray {
    toolbar: HWND,
    width: PointerWidth,
    memory: ProcessMemory,
    scratch: ScratchBuffer,
    _process: OwnedProcess,
}

impl Win32ForeignTray {
    pub fn open() -> Result<Self, HarvestError> {
        let toolbar = find_toolbar().ok_or(HarvestError::NoForeignTray)?;
        let pid = window_pid(toolbar);

        let access =
            PROCESS_VM_OPERATION | PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_QUERY_INFORMATION;
        let handle = unsafe { OpenProcess(access, 0, pid) };
        if handle.is_null() {
            return Err(last_error("OpenProcess"));
        }
        let process = OwnedProcess(handle);
        let scratch = ScratchBuffer::allocate(handle)?;

        let width = pointer_width(handle);
        tracing::debug!(pid, ?width, "opened foreign tray process");
        Ok(Self {
            toolbar,
            width,
            memory: ProcessMemory { process: handle },
            scratch,
            _process: process,
        })
    }

    fn send(&self, msg: u32, wparam: usize, lparam: isize) -> Result<usize, HarvestError> {
        let mut result = 0usize;
        let sent = unsafe {
            SendMessageTimeoutW(
                self.toolbar,
                msg,
                wparam,
                lparam,
                SMTO_ABORTIFHUNG,
                TOOLBAR_TIMEOUT_MS,
                &mut result,
            )
        };
        if sent == 0 {
            return Err(last_error("SendMessageTimeoutW"));
        }
        Ok(result)
    }
}

fn pointer_width(process: HANDLE) -> PointerWidth {
    let mut wow64 = 0;
    let ok = unsafe { IsWow64Process(process, &mut wow64) };
    if (ok != 0 && wow64 != 0) || cfg!(target_pointer_width = "32") {
        PointerWidth::Bits32
    } else {
        PointerWidth::Bits64
    }
}

impl ForeignTray for Win32ForeignTray {
    fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    fn button_count(&self) -> Result<usize, HarvestError> {
        self.send(TB_BUTTONCOUNT, 0, 0)
    }

    fn button(&self, index: usize) -> Result<Vec<u8>, HarvestError> {
        let copied = self.send(TB_GETBUTTON, index, self.scratch.address as isize)?;
        if copied == 0 {
            return Err(HarvestError::RemoteRead {
                address: self.scratch.address as u64,
                len: self.width.button_size(),
            });
        }
        self.memory
            .read(self.scratch.address as u64, self.width.button_size())
    }

    fn memory(&self) -> &dyn RemoteMemory {
        &self.memory
    }
}

type EnableAutoTrayFn = unsafe extern "system" fn(this: *mut c_void, enabled: i32) -> i32;
type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

/// Reads entry `index` of a COM object's vtable.
unsafe fn vtable_entry(object: *mut c_void, index: usize) -> *const c_void {
    unsafe {
        let vtable = *(object as *const *const *const c_void);
        *vtable.add(index)
    }
}

/// The shell's tray-notify COM object.
pub struct ComTrayNotify {
    object: *mut c_void,
    capability: TrayNotifyCapability,
    uninitialize: bool,
}

impl ComTrayNotify {
    /// Connects to the running shell, trying the Windows 8 interface first.
    pub fn resolve() -> Self {
        let hr = unsafe { CoInitializeEx(null(), COINIT_APARTMENTTHREADED as _) };
        // S_OK and S_FALSE both need a matching CoUninitialize.
        let uninitialize = hr >= 0;

        for (iid, capability) in [
            (&IID_TRAY_NOTIFY_WIN8, TrayNotifyCapability::Win8),
            (&IID_TRAY_NOTIFY_LEGACY, TrayNotifyCapability::Legacy),
        ] {
            let mut object: *mut c_void = null_mut();
            let hr = unsafe {
                CoCreateInstance(
                    &CLSID_TRAY_NOTIFY,
                    null_mut(),
                    CLSCTX_LOCAL_SERVER,
                    iid,
                    &mut object,
                )
            };
            if hr >= 0 && !object.is_null() {
                tracing::debug!(?capability, "tray notify interface resolved");
                return Self {
                    object,
                    capability,
                    uninitialize,
                };
            }
        }

        tracing::debug!("no tray notify interface");
        Self {
            object: null_mut(),
            capability: TrayNotifyCapability::Unavailable,
            uninitialize,
        }
    }
}

impl AutoTrayControl for ComTrayNotify {
    fn capability(&self) -> TrayNotifyCapability {
        self.capability
    }

    fn is_enabled(&self) -> Option<bool> {
        use winreg::RegKey;
        use winreg::enums::HKEY_CURRENT_USER;

        let key = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey(EXPLORER_KEY)
            .ok()?;
        let value: u32 = key.get_value("EnableAutoTray").ok()?;
        Some(value != 0)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), HarvestError> {
        let index = match self.capability {
            TrayNotifyCapability::Win8 => ENABLE_AUTO_TRAY_WIN8,
            TrayNotifyCapability::Legacy => ENABLE_AUTO_TRAY_LEGACY,
            TrayNotifyCapability::Unavailable => return Err(HarvestError::AutoTrayUnavailable),
        };
        let hr = unsafe {
            let enable: EnableAutoTrayFn = std::mem::transmute(vtable_entry(self.object, index));
            enable(self.object, i32::from(enabled))
        };
        if hr < 0 {
            return Err(HarvestError::Com(hr));
        }
        Ok(())
    }
}

impl Drop for ComTrayNotify {
    fn drop(&mut self) {
        unsafe {
            if !self.object.is_null() {
                let release: ReleaseFn = std::mem::transmute(vtable_entry(self.object, RELEASE));
                release(self.object);
            }
            if self.uninitialize {
                CoUninitialize();
            }
        }
    }
}

pub fn open_foreign_tray() -> Result<Win32ForeignTray, HarvestError> {
    Win32ForeignTray::open()
}

pub fn auto_tray_control() -> ComTrayNotify {
    ComTrayNotify::resolve()
}
