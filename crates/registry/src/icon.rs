//! A single tracked icon and the rules for talking back to its owner.
//!
//! Outbound callback encoding depends on the version the owner negotiated:
//!
//! ```text
//! version <= 3:  wParam = uID              lParam = event
//! version  = 4:  wParam = MAKELONG(x, y)   lParam = MAKELONG(event, uID)
//! ```
//!
//! Version 4 owners additionally receive `NIN_SELECT`, `WM_CONTEXTMENU`,
//! `NIN_POPUPOPEN` and `NIN_POPUPCLOSE`.

use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use shelltray_protocol::constants::{
    NIN_BALLOONHIDE, NIN_BALLOONSHOW, NIN_BALLOONTIMEOUT, NIN_BALLOONUSERCLICK, NIN_POPUPCLOSE,
    NIN_POPUPOPEN, NIN_SELECT, WM_CONTEXTMENU, WM_LBUTTONDBLCLK, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MBUTTONDBLCLK, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_RBUTTONDBLCLK,
    WM_RBUTTONDOWN, WM_RBUTTONUP, make_long,
};
use shelltray_protocol::{Balloon, IconHandle, Point, Rect, WindowHandle};

use crate::host::NotifyMessage;
use crate::identity::{Identity, stable_key};
use crate::registry::IconKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Middle => 2,
        }
    }

    fn down_code(self) -> u32 {
        match self {
            Self::Left => WM_LBUTTONDOWN,
            Self::Right => WM_RBUTTONDOWN,
            Self::Middle => WM_MBUTTONDOWN,
        }
    }

    fn up_code(self) -> u32 {
        match self {
            Self::Left => WM_LBUTTONUP,
            Self::Right => WM_RBUTTONUP,
            Self::Middle => WM_MBUTTONUP,
        }
    }

    fn double_click_code(self) -> u32 {
        match self {
            Self::Left => WM_LBUTTONDBLCLK,
            Self::Right => WM_RBUTTONDBLCLK,
            Self::Middle => WM_MBUTTONDBLCLK,
        }
    }
}

/// Pointer interaction reported by the UI for one icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Move,
    HoverEnter,
    HoverLeave,
}

/// Balloon lifecycle reported by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalloonEvent {
    Shown,
    Hidden,
    TimedOut,
    Clicked,
}

impl BalloonEvent {
    fn code(self) -> u32 {
        match self {
            Self::Shown => NIN_BALLOONSHOW,
            Self::Hidden => NIN_BALLOONHIDE,
            Self::TimedOut => NIN_BALLOONTIMEOUT,
            Self::Clicked => NIN_BALLOONUSERCLICK,
        }
    }
}

/// One icon tracked by the registry.
#[derive(Debug, Clone)]
pub struct IconRecord {
    pub(crate) key: IconKey,
    pub(crate) window: WindowHandle,
    pub(crate) sub_id: u32,
    pub(crate) stable_id: Option<Uuid>,
    pub(crate) path: String,
    pub(crate) callback_message: u32,
    pub(crate) icon: IconHandle,
    pub(crate) tooltip: String,
    pub(crate) hidden: bool,
    pub(crate) pinned: bool,
    pub(crate) pin_order: usize,
    pub(crate) placement: Rect,
    pub(crate) version: u32,
    pub(crate) balloon: Option<Balloon>,
    last_click: [Option<Instant>; 3],
}

impl IconRecord {
    pub(crate) fn new(key: IconKey, window: WindowHandle, sub_id: u32, placement: Rect) -> Self {
        Self {
            key,
            window,
            sub_id,
            stable_id: None,
            path: String::new(),
            callback_message: 0,
            icon: IconHandle::default(),
            tooltip: String::new(),
            hidden: false,
            pinned: false,
            pin_order: 0,
            placement,
            version: 0,
            balloon: None,
            last_click: [None; 3],
        }
    }

    pub fn key(&self) -> IconKey {
        self.key
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn sub_id(&self) -> u32 {
        self.sub_id
    }

    pub fn stable_id(&self) -> Option<Uuid> {
        self.stable_id
    }

    /// Executable path of the owning process (empty if unknown).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn callback_message(&self) -> u32 {
        self.callback_message
    }

    /// Icon image handle; null means the UI should draw its default icon.
    pub fn icon(&self) -> IconHandle {
        self.icon
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn pin_order(&self) -> usize {
        self.pin_order
    }

    pub fn placement(&self) -> Rect {
        self.placement
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The last balloon the owner asked to show, if any.
    pub fn balloon(&self) -> Option<&Balloon> {
        self.balloon.as_ref()
    }

    /// Whether this record answers to `identity`.
    pub fn matches(&self, identity: &Identity) -> bool {
        match identity {
            Identity::Stable(guid) => self.stable_id.as_ref() == Some(guid),
            Identity::Session { window, sub_id } => {
                self.window == *window && self.sub_id == *sub_id
            }
            Identity::Composite {
                path,
                sub_id,
                title,
            } => self.path == *path && self.sub_id == *sub_id && self.tooltip == *title,
        }
    }

    /// Identity used for persisted pins: the stable id when present,
    /// otherwise the composite key.
    pub fn pin_identity(&self) -> Identity {
        match self.stable_id {
            Some(guid) => Identity::Stable(guid),
            None => Identity::Composite {
                path: self.path.clone(),
                sub_id: self.sub_id,
                title: self.tooltip.clone(),
            },
        }
    }

    /// The string this icon is stored under in the pin list.
    pub fn pin_key(&self) -> String {
        match self.stable_id {
            Some(guid) => stable_key(&guid),
            None => format!("{}:{}:{}", self.path, self.sub_id, self.tooltip),
        }
    }

    /// Whether a pin-list entry refers to this icon. GUIDs compare
    /// case-insensitively.
    pub fn matches_pin(&self, entry: &str) -> bool {
        match self.stable_id {
            Some(guid) => entry.eq_ignore_ascii_case(&stable_key(&guid)),
            None => entry == self.pin_key(),
        }
    }

    /// Encodes one callback event in the shape this icon's version expects.
    pub fn encode(&self, event: u32, cursor: Point) -> NotifyMessage {
        let (wparam, lparam) = if self.version > 3 {
            (
                make_long(cursor.x, cursor.y) as usize,
                make_long(event as i32, self.sub_id as i32) as i32 as isize,
            )
        } else {
            (self.sub_id as usize, event as isize)
        };
        NotifyMessage {
            window: self.window,
            message: self.callback_message,
            wparam,
            lparam,
        }
    }

    /// Translates a pointer event into the callback messages to deliver.
    ///
    /// `now` and `double_click` are read at delivery time; a button-down
    /// within `double_click` of the previous down of the same button becomes
    /// a double-click and resets the tracker.
    pub fn translate(
        &mut self,
        event: PointerEvent,
        cursor: Point,
        now: Instant,
        double_click: Duration,
    ) -> Vec<NotifyMessage> {
        let v4 = self.version > 3;
        let codes: Vec<u32> = match event {
            PointerEvent::ButtonDown(button) => {
                let slot = &mut self.last_click[button.index()];
                let is_double = slot
                    .and_then(|last| now.checked_duration_since(last))
                    .is_some_and(|elapsed| elapsed <= double_click);
                if is_double {
                    *slot = None;
                    vec![button.double_click_code()]
                } else {
                    *slot = Some(now);
                    vec![button.down_code()]
                }
            }
            PointerEvent::ButtonUp(button) => {
                let mut codes = vec![button.up_code()];
                if v4 {
                    match button {
                        MouseButton::Left => codes.push(NIN_SELECT),
                        MouseButton::Right => codes.push(WM_CONTEXTMENU),
                        MouseButton::Middle => {}
                    }
                }
                codes
            }
            PointerEvent::Move => vec![WM_MOUSEMOVE],
            PointerEvent::HoverEnter if v4 => vec![NIN_POPUPOPEN],
            PointerEvent::HoverLeave if v4 => vec![NIN_POPUPCLOSE],
            PointerEvent::HoverEnter | PointerEvent::HoverLeave => Vec::new(),
        };
        codes
            .into_iter()
            .map(|code| self.encode(code, cursor))
            .collect()
    }

    pub(crate) fn balloon_message(&self, event: BalloonEvent, cursor: Point) -> NotifyMessage {
        self.encode(event.code(), cursor)
    }

    pub fn snapshot(&self) -> IconSnapshot {
        IconSnapshot {
            key: self.key,
            window: self.window,
            sub_id: self.sub_id,
            stable_id: self.stable_id,
            icon: self.icon,
            tooltip: self.tooltip.clone(),
            hidden: self.hidden,
            pinned: self.pinned,
            pin_order: self.pin_order,
            placement: self.placement,
            version: self.version,
        }
    }
}

/// Immutable copy of an icon's displayable state, handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSnapshot {
    pub key: IconKey,
    pub window: WindowHandle,
    pub sub_id: u32,
    pub stable_id: Option<Uuid>,
    pub icon: IconHandle,
    pub tooltip: String,
    pub hidden: bool,
    pub pinned: bool,
    pub pin_order: usize,
    pub placement: Rect,
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOUBLE_CLICK: Duration = Duration::from_millis(500);

    fn record(version: u32) -> IconRecord {
        let mut rec = IconRecord::new(IconKey(1), WindowHandle(100), 1, Rect::default());
        rec.callback_message = 0x8001;
        rec.version = version;
        rec
    }

    #[test]
    fn version_4_packs_cursor_and_sub_id() {
        let rec = record(4);
        let msg = rec.encode(WM_LBUTTONDOWN, Point::new(50, 60));
        assert_eq!(msg.window, WindowHandle(100));
        assert_eq!(msg.message, 0x8001);
        assert_eq!(msg.wparam, (60 << 16) | 50);
        assert_eq!(msg.lparam, ((1 << 16) | WM_LBUTTONDOWN) as isize);
        assert_eq!((msg.lparam as u32) >> 16, 1);
    }

    #[test]
    fn legacy_versions_send_sub_id_and_event() {
        for version in 0..=3 {
            let rec = record(version);
            let msg = rec.encode(WM_LBUTTONDOWN, Point::new(50, 60));
            assert_eq!(msg.wparam, 1);
            assert_eq!(msg.lparam, WM_LBUTTONDOWN as isize);
        }
    }

    #[test]
    fn high_sub_id_sign_extends_like_makelparam() {
        let mut rec = record(4);
        rec.sub_id = 0x8000;
        let msg = rec.encode(WM_MOUSEMOVE, Point::default());
        assert_eq!(msg.lparam, 0x8000_0200_u32 as i32 as isize);
    }

    #[test]
    fn second_down_within_threshold_is_double_click() {
        let mut rec = record(3);
        let t0 = Instant::now();
        let first = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0,
            DOUBLE_CLICK,
        );
        let second = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0 + Duration::from_millis(200),
            DOUBLE_CLICK,
        );
        assert_eq!(first[0].lparam, WM_LBUTTONDOWN as isize);
        assert_eq!(second[0].lparam, WM_LBUTTONDBLCLK as isize);

        // Tracker resets: a third quick click starts a new pair.
        let third = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0 + Duration::from_millis(300),
            DOUBLE_CLICK,
        );
        assert_eq!(third[0].lparam, WM_LBUTTONDOWN as isize);
    }

    #[test]
    fn slow_second_click_is_plain_down() {
        let mut rec = record(3);
        let t0 = Instant::now();
        rec.translate(
            PointerEvent::ButtonDown(MouseButton::Right),
            Point::default(),
            t0,
            DOUBLE_CLICK,
        );
        let second = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Right),
            Point::default(),
            t0 + Duration::from_millis(900),
            DOUBLE_CLICK,
        );
        assert_eq!(second[0].lparam, WM_RBUTTONDOWN as isize);
    }

    #[test]
    fn threshold_is_evaluated_per_delivery() {
        let mut rec = record(3);
        let t0 = Instant::now();
        rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0,
            DOUBLE_CLICK,
        );
        // Same gap, but the caller now reports a shorter threshold.
        let second = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0 + Duration::from_millis(200),
            Duration::from_millis(100),
        );
        assert_eq!(second[0].lparam, WM_LBUTTONDOWN as isize);
    }

    #[test]
    fn buttons_track_clicks_independently() {
        let mut rec = record(3);
        let t0 = Instant::now();
        rec.translate(
            PointerEvent::ButtonDown(MouseButton::Left),
            Point::default(),
            t0,
            DOUBLE_CLICK,
        );
        let right = rec.translate(
            PointerEvent::ButtonDown(MouseButton::Right),
            Point::default(),
            t0 + Duration::from_millis(100),
            DOUBLE_CLICK,
        );
        assert_eq!(right[0].lparam, WM_RBUTTONDOWN as isize);
    }

    #[test]
    fn version_4_adds_select_and_context_menu() {
        let mut rec = record(4);
        let now = Instant::now();
        let left = rec.translate(
            PointerEvent::ButtonUp(MouseButton::Left),
            Point::new(5, 5),
            now,
            DOUBLE_CLICK,
        );
        let events: Vec<u32> = left.iter().map(|m| m.lparam as u32 & 0xFFFF).collect();
        assert_eq!(events, vec![WM_LBUTTONUP, NIN_SELECT]);

        let right = rec.translate(
            PointerEvent::ButtonUp(MouseButton::Right),
            Point::new(5, 5),
            now,
            DOUBLE_CLICK,
        );
        let events: Vec<u32> = right.iter().map(|m| m.lparam as u32 & 0xFFFF).collect();
        assert_eq!(events, vec![WM_RBUTTONUP, WM_CONTEXTMENU]);
    }

    #[test]
    fn legacy_button_up_sends_only_up() {
        let mut rec = record(2);
        let msgs = rec.translate(
            PointerEvent::ButtonUp(MouseButton::Left),
            Point::default(),
            Instant::now(),
            DOUBLE_CLICK,
        );
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].lparam, WM_LBUTTONUP as isize);
    }

    #[test]
    fn hover_popups_only_for_version_4() {
        let mut legacy = record(3);
        assert!(
            legacy
                .translate(
                    PointerEvent::HoverEnter,
                    Point::default(),
                    Instant::now(),
                    DOUBLE_CLICK
                )
                .is_empty()
        );

        let mut modern = record(4);
        let open = modern.translate(
            PointerEvent::HoverEnter,
            Point::default(),
            Instant::now(),
            DOUBLE_CLICK,
        );
        let close = modern.translate(
            PointerEvent::HoverLeave,
            Point::default(),
            Instant::now(),
            DOUBLE_CLICK,
        );
        assert_eq!(open[0].lparam as u32 & 0xFFFF, NIN_POPUPOPEN);
        assert_eq!(close[0].lparam as u32 & 0xFFFF, NIN_POPUPCLOSE);
    }

    #[test]
    fn balloon_events_use_version_shape() {
        let rec = record(2);
        let msg = rec.balloon_message(BalloonEvent::Clicked, Point::default());
        assert_eq!(msg.wparam, 1);
        assert_eq!(msg.lparam, NIN_BALLOONUSERCLICK as isize);
    }

    #[test]
    fn pin_key_prefers_guid() {
        let mut rec = record(0);
        rec.path = r"C:\mail.exe".into();
        rec.tooltip = "Mail".into();
        assert_eq!(rec.pin_key(), r"C:\mail.exe:1:Mail");
        assert!(rec.matches_pin(r"C:\mail.exe:1:Mail"));

        let guid = Uuid::from_u128(0x1234);
        rec.stable_id = Some(guid);
        assert_eq!(rec.pin_key(), stable_key(&guid));
        assert!(rec.matches_pin(&stable_key(&guid).to_uppercase()));
        assert!(!rec.matches_pin(r"C:\mail.exe:1:Mail"));
    }

    #[test]
    fn matches_each_identity_shape() {
        let mut rec = record(0);
        rec.path = "/bin/app".into();
        rec.tooltip = "App".into();
        assert!(rec.matches(&Identity::Session {
            window: WindowHandle(100),
            sub_id: 1
        }));
        assert!(!rec.matches(&Identity::Stable(Uuid::from_u128(1))));
        assert!(rec.matches(&Identity::Composite {
            path: "/bin/app".into(),
            sub_id: 1,
            title: "App".into()
        }));
        assert_eq!(rec.pin_identity().pin_key().unwrap(), rec.pin_key());
    }
}
