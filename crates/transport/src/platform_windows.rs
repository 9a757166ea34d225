//! Win32 backend: the masquerading `Shell_TrayWnd` / `TrayNotifyWnd` pair.
//!
//! `Shell_NotifyIcon` finds the tray with `FindWindow("Shell_TrayWnd")` and
//! talks to it with `WM_COPYDATA`. Our window is created topmost so that
//! lookup lands on it even when another shell is still running; that other
//! shell then becomes the secondary tray for forwarded traffic.

use std::ffi::c_void;
use std::ptr::{null, null_mut};
use std::time::Duration;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::DataExchange::COPYDATASTRUCT;
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::{
    GetCurrentProcessId, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::GetDoubleClickTime;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    AllowSetForegroundWindow, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    FindWindowExW, GWLP_USERDATA, GetMessageW, GetWindowThreadProcessId, HWND_BROADCAST, IsWindow,
    MSG, RegisterClassExW, RegisterWindowMessageW, SMTO_ABORTIFHUNG, SendMessageTimeoutW,
    SendNotifyMessageW, TranslateMessage, WM_COPYDATA, WNDCLASSEXW, WS_CHILD, WS_EX_TOOLWINDOW,
    WS_EX_TOPMOST, WS_POPUP,
};

use shelltray_protocol::{Envelope, WindowHandle};
use shelltray_registry::{IconHost, NotifyMessage};

use crate::dispatch::Dispatcher;
use crate::error::TransportError;
use crate::host::TrayHost;
use crate::queue::QueueHandle;
use crate::transport::Transport;

const TRAY_CLASS: &str = "Shell_TrayWnd";
const NOTIFY_CLASS: &str = "TrayNotifyWnd";

/// Forwarded requests give up after this long if the secondary tray hangs.
const FORWARD_TIMEOUT_MS: u32 = 5_000;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn hwnd(window: WindowHandle) -> HWND {
    window.0 as usize as HWND
}

fn handle_of(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd as usize as u64)
}

fn last_error(call: &'static str) -> TransportError {
    TransportError::Win32 {
        call,
        code: unsafe { GetLastError() },
    }
}

fn window_pid(window: WindowHandle) -> Option<u32> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd(window), &mut pid) };
    (pid != 0).then_some(pid)
}

/// Win32 implementation of both host collaborator traits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Host;

impl IconHost for Win32Host {
    fn is_window(&self, window: WindowHandle) -> bool {
        !window.is_null() && unsafe { IsWindow(hwnd(window)) } != 0
    }

    fn post_notify(&self, message: &NotifyMessage) -> bool {
        unsafe {
            SendNotifyMessageW(
                hwnd(message.window),
                message.message,
                message.wparam,
                message.lparam,
            ) != 0
        }
    }

    fn allow_foreground(&self, window: WindowHandle) {
        if let Some(pid) = window_pid(window) {
            unsafe { AllowSetForegroundWindow(pid) };
        }
    }

    fn process_path(&self, window: WindowHandle) -> Option<String> {
        let pid = window_pid(window)?;
        let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        if process.is_null() {
            return None;
        }

        let mut buf = [0u16; 1024];
        let mut len = buf.len() as u32;
        let ok = unsafe {
            QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, buf.as_mut_ptr(), &mut len)
        };
        unsafe { CloseHandle(process) };

        (ok != 0).then(|| String::from_utf16_lossy(&buf[..len as usize]))
    }
}

impl TrayHost for Win32Host {
    fn is_window(&self, window: WindowHandle) -> bool {
        IconHost::is_window(self, window)
    }

    /// First `Shell_TrayWnd` that belongs to another process.
    fn find_secondary_tray(&self) -> Option<WindowHandle> {
        let class = wide(TRAY_CLASS);
        let own_pid = unsafe { GetCurrentProcessId() };
        let mut after: HWND = null_mut();
        loop {
            after = unsafe { FindWindowExW(null_mut(), after, class.as_ptr(), null()) };
            if after.is_null() {
                return None;
            }
            let candidate = handle_of(after);
            if window_pid(candidate) != Some(own_pid) {
                return Some(candidate);
            }
        }
    }

    fn forward(&self, target: WindowHandle, envelope: &Envelope<'_>) -> isize {
        let data = COPYDATASTRUCT {
            dwData: envelope.discriminant,
            cbData: envelope.payload.len() as u32,
            lpData: envelope.payload.as_ptr() as *mut c_void,
        };
        let mut result: usize = 0;
        let sent = unsafe {
            SendMessageTimeoutW(
                hwnd(target),
                WM_COPYDATA,
                envelope.sender.0 as usize,
                &data as *const COPYDATASTRUCT as LPARAM,
                SMTO_ABORTIFHUNG,
                FORWARD_TIMEOUT_MS,
                &mut result,
            )
        };
        if sent == 0 {
            tracing::warn!(target = %target, "forward to secondary tray timed out or failed");
            return 0;
        }
        result as isize
    }

    fn double_click_time(&self) -> Duration {
        Duration::from_millis(u64::from(unsafe { GetDoubleClickTime() }))
    }
}

#[cfg(target_pointer_width = "64")]
unsafe fn set_user_data(hwnd: HWND, value: isize) {
    unsafe { windows_sys::Win32::UI::WindowsAndMessaging::SetWindowLongPtrW(hwnd, GWLP_USERDATA, value) };
}

#[cfg(target_pointer_width = "64")]
unsafe fn get_user_data(hwnd: HWND) -> isize {
    unsafe { windows_sys::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW(hwnd, GWLP_USERDATA) }
}

#[cfg(target_pointer_width = "32")]
unsafe fn set_user_data(hwnd: HWND, value: isize) {
    unsafe {
        windows_sys::Win32::UI::WindowsAndMessaging::SetWindowLongW(hwnd, GWLP_USERDATA, value as i32)
    };
}

#[cfg(target_pointer_width = "32")]
unsafe fn get_user_data(hwnd: HWND) -> isize {
    unsafe { windows_sys::Win32::UI::WindowsAndMessaging::GetWindowLongW(hwnd, GWLP_USERDATA) as isize }
}

unsafe extern "system" fn tray_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_COPYDATA && lparam != 0 {
        let state = unsafe { get_user_data(hwnd) } as *const Dispatcher;
        if !state.is_null() {
            let data = unsafe { &*(lparam as *const COPYDATASTRUCT) };
            let payload: &[u8] = if data.lpData.is_null() || data.cbData == 0 {
                &[]
            } else {
                unsafe { std::slice::from_raw_parts(data.lpData as *const u8, data.cbData as usize) }
            };
            let envelope = Envelope::new(WindowHandle(wparam as u64), data.dwData, payload);
            return unsafe { &*state }.receive(&envelope);
        }
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn register_class(name: &[u16]) -> Result<(), TransportError> {
    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: 0,
        lpfnWndProc: Some(tray_wndproc),
        cbClsExtra: 0,
        cbWndExtra: 0,
        hInstance: unsafe { GetModuleHandleW(null()) },
        hIcon: null_mut(),
        hCursor: null_mut(),
        hbrBackground: null_mut(),
        lpszMenuName: null(),
        lpszClassName: name.as_ptr(),
        hIconSm: null_mut(),
    };
    if unsafe { RegisterClassExW(&class) } == 0 {
        return Err(last_error("RegisterClassExW"));
    }
    Ok(())
}

/// The two host windows plus the transport they feed.
///
/// Dropping this destroys both windows and the transport with them.
pub struct TrayWindows {
    tray: HWND,
    notify: HWND,
    state: *mut Dispatcher,
}

impl TrayWindows {
    /// Registers the window classes, creates both windows and wires them to
    /// `transport`.
    pub fn create(transport: Transport) -> Result<Self, TransportError> {
        let tray_class = wide(TRAY_CLASS);
        let notify_class = wide(NOTIFY_CLASS);
        register_class(&tray_class)?;
        register_class(&notify_class)?;

        let instance = unsafe { GetModuleHandleW(null()) };
        let tray = unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW | WS_EX_TOPMOST,
                tray_class.as_ptr(),
                null(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                null_mut(),
                null_mut(),
                instance,
                null(),
            )
        };
        if tray.is_null() {
            return Err(last_error("CreateWindowExW(Shell_TrayWnd)"));
        }

        let notify = unsafe {
            CreateWindowExW(
                0,
                notify_class.as_ptr(),
                null(),
                WS_CHILD,
                0,
                0,
                0,
                0,
                tray,
                null_mut(),
                instance,
                null(),
            )
        };
        if notify.is_null() {
            let err = last_error("CreateWindowExW(TrayNotifyWnd)");
            unsafe { DestroyWindow(tray) };
            return Err(err);
        }

        let state = Box::into_raw(Box::new(Dispatcher::new(transport, Box::new(Win32Host))));
        unsafe {
            set_user_data(tray, state as isize);
            set_user_data(notify, state as isize);
        }

        tracing::info!(tray = %handle_of(tray), "shell tray windows created");
        Ok(Self {
            tray,
            notify,
            state,
        })
    }

    pub fn tray_window(&self) -> WindowHandle {
        handle_of(self.tray)
    }

    /// Tells running applications the taskbar was (re)created so they
    /// register their icons again.
    pub fn announce(&self) {
        let name = wide("TaskbarCreated");
        let msg = unsafe { RegisterWindowMessageW(name.as_ptr()) };
        if msg == 0 {
            tracing::warn!("TaskbarCreated could not be registered");
            return;
        }
        unsafe { SendNotifyMessageW(HWND_BROADCAST, msg, 0, 0) };
        tracing::info!("TaskbarCreated broadcast");
    }

    /// Runs `f` against the transport, unless a request is being handled
    /// right now (then the caller should queue work instead).
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut Transport) -> R) -> Option<R> {
        unsafe { &*self.state }.with_transport(f)
    }

    pub fn queue_handle(&self) -> QueueHandle {
        unsafe { &*self.state }.queue_handle()
    }

    /// Pumps messages until `WM_QUIT`, draining queued work after each one.
    pub fn run_message_loop(&self) -> Result<(), TransportError> {
        let state = unsafe { &*self.state };
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        loop {
            let ret = unsafe { GetMessageW(&mut msg, null_mut(), 0, 0) };
            match ret {
                0 => return Ok(()),
                -1 => return Err(last_error("GetMessageW")),
                _ => unsafe {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
            state.drain();
        }
    }
}

impl Drop for TrayWindows {
    fn drop(&mut self) {
        unsafe {
            set_user_data(self.notify, 0);
            set_user_data(self.tray, 0);
            DestroyWindow(self.notify);
            DestroyWindow(self.tray);
            drop(Box::from_raw(self.state));
        }
        tracing::info!("shell tray windows destroyed");
    }
}
