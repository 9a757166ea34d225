//! The canonical icon registry.
//!
//! Every icon, whatever its provenance (live datagram, harvested from a
//! previous tray), enters through [`IconRegistry::apply`]. Derived views
//! are rebuilt before each mutating call returns, so readers never see a
//! view that disagrees with the underlying collection.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use shelltray_protocol::constants::{NOTIFYICON_VERSION_4, VOLUME_ICON_GUID};
use shelltray_protocol::{Balloon, MessageKind, Point, Rect, WindowHandle, WireMessage};

use crate::error::RegistryError;
use crate::host::{IconHost, NotifyMessage};
use crate::icon::{BalloonEvent, IconRecord, IconSnapshot, PointerEvent};
use crate::identity::{Identity, stable_key};
use crate::pins::{PinList, PinStore};

/// Registry-local handle for one icon. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IconKey(pub u64);

impl std::fmt::Display for IconKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an accepted datagram did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Added(IconKey),
    Updated(IconKey),
    Removed(IconKey),
    /// Accepted with no effect (SetFocus, delete of an unknown icon).
    Ignored,
}

/// Why an icon left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    Deleted,
    /// Owner window no longer exists.
    Stale,
}

/// Change notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(IconSnapshot),
    Updated(IconSnapshot),
    Removed { key: IconKey, reason: RemovalReason },
    Balloon { key: IconKey, balloon: Balloon },
    PinsChanged,
}

/// Result of delivering a UI interaction to an icon owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Number of callback messages posted.
    Sent(usize),
    /// Owner window is gone; the icon was removed.
    Stale,
    UnknownIcon,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Views {
    visible: Vec<IconKey>,
    pinned: Vec<IconKey>,
    unpinned: Vec<IconKey>,
}

/// Canonical collection of tray icons.
pub struct IconRegistry {
    icons: Vec<IconRecord>,
    next_key: u64,
    pins: PinList,
    store: Box<dyn PinStore>,
    host: Box<dyn IconHost>,
    default_placement: Rect,
    views: Views,
    view_generation: u64,
    subscribers: Vec<mpsc::Sender<RegistryEvent>>,
}

impl IconRegistry {
    /// Creates a registry, loading the persisted pin list from `store`.
    ///
    /// An unreadable pin file is logged and treated as empty.
    pub fn new(host: Box<dyn IconHost>, store: Box<dyn PinStore>) -> Self {
        let pins = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load pin list, starting empty");
            PinList::default()
        });
        Self {
            icons: Vec::new(),
            next_key: 1,
            pins,
            store,
            host,
            default_placement: Rect::default(),
            views: Views::default(),
            view_generation: 0,
            subscribers: Vec::new(),
        }
    }

    /// Returns a receiver for change notifications.
    pub fn subscribe(&mut self) -> mpsc::Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Applies one systray datagram.
    ///
    /// Failures leave the registry untouched; the caller reports them to
    /// the sender as a failed `Shell_NotifyIcon` call.
    pub fn apply(
        &mut self,
        kind: MessageKind,
        message: &WireMessage,
    ) -> Result<ApplyOutcome, RegistryError> {
        match kind {
            MessageKind::Add | MessageKind::Modify => self.add_or_modify(kind, message),
            MessageKind::Delete => Ok(self.delete(message)),
            MessageKind::SetFocus => Ok(ApplyOutcome::Ignored),
            MessageKind::SetVersion => self.set_version(message),
        }
    }

    fn add_or_modify(
        &mut self,
        kind: MessageKind,
        message: &WireMessage,
    ) -> Result<ApplyOutcome, RegistryError> {
        let outcome = match self.resolve(&Identity::candidates(message)) {
            Some(index) => {
                let record = &mut self.icons[index];
                update_fields(record, message);
                if let Some(guid) = message.stable_id() {
                    record.stable_id = Some(guid);
                }
                if !message.window.is_null() {
                    record.window = message.window;
                    record.sub_id = message.sub_id;
                }
                self.refresh_pin_state();
                tracing::debug!(
                    window = %message.window,
                    sub_id = message.sub_id,
                    ?kind,
                    "icon updated"
                );
                let snapshot = self.icons[index].snapshot();
                self.emit(RegistryEvent::Updated(snapshot));
                ApplyOutcome::Updated(self.icons[index].key)
            }
            None if kind == MessageKind::Modify => {
                return Err(RegistryError::UnknownIcon {
                    window: message.window,
                    sub_id: message.sub_id,
                });
            }
            None if message.window.is_null() => {
                return Err(RegistryError::MissingWindow {
                    sub_id: message.sub_id,
                });
            }
            None => {
                let key = IconKey(self.next_key);
                self.next_key += 1;

                let mut record =
                    IconRecord::new(key, message.window, message.sub_id, self.default_placement);
                record.stable_id = message.stable_id();
                record.path = self.host.process_path(message.window).unwrap_or_default();
                update_fields(&mut record, message);

                self.icons.push(record);
                let index = self.icons.len() - 1;
                self.refresh_pin_state();
                tracing::debug!(
                    window = %message.window,
                    sub_id = message.sub_id,
                    %key,
                    "icon added"
                );
                let snapshot = self.icons[index].snapshot();
                self.emit(RegistryEvent::Added(snapshot));
                ApplyOutcome::Added(key)
            }
        };

        if let (ApplyOutcome::Added(key) | ApplyOutcome::Updated(key), Some(balloon)) =
            (outcome, message.balloon())
        {
            if let Some(index) = self.index_of(key) {
                self.icons[index].balloon = Some(balloon.clone());
            }
            if !balloon.text.is_empty() {
                self.emit(RegistryEvent::Balloon { key, balloon });
            }
        }

        self.refresh_views();
        Ok(outcome)
    }

    fn delete(&mut self, message: &WireMessage) -> ApplyOutcome {
        match self.resolve(&Identity::candidates(message)) {
            Some(index) => {
                let key = self.remove_at(index, RemovalReason::Deleted);
                ApplyOutcome::Removed(key)
            }
            None => {
                tracing::debug!(
                    window = %message.window,
                    sub_id = message.sub_id,
                    "delete for unknown icon ignored"
                );
                ApplyOutcome::Ignored
            }
        }
    }

    fn set_version(&mut self, message: &WireMessage) -> Result<ApplyOutcome, RegistryError> {
        let version = message.version();
        if version > NOTIFYICON_VERSION_4 {
            return Err(RegistryError::InvalidVersion(version));
        }
        let index = self
            .resolve(&Identity::candidates(message))
            .ok_or(RegistryError::UnknownIcon {
                window: message.window,
                sub_id: message.sub_id,
            })?;

        let record = &mut self.icons[index];
        record.version = version;
        tracing::debug!(window = %record.window, sub_id = record.sub_id, version, "icon version set");
        let key = record.key;
        let snapshot = record.snapshot();
        self.emit(RegistryEvent::Updated(snapshot));
        Ok(ApplyOutcome::Updated(key))
    }

    /// Finds the record for the first candidate identity that matches any
    /// record. Earlier candidates win over later ones.
    fn resolve(&self, candidates: &[Identity]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|identity| self.icons.iter().position(|icon| icon.matches(identity)))
    }

    fn index_of(&self, key: IconKey) -> Option<usize> {
        self.icons.iter().position(|icon| icon.key == key)
    }

    fn remove_at(&mut self, index: usize, reason: RemovalReason) -> IconKey {
        let record = self.icons.remove(index);
        tracing::debug!(
            window = %record.window,
            sub_id = record.sub_id,
            ?reason,
            "icon removed"
        );
        self.emit(RegistryEvent::Removed {
            key: record.key,
            reason,
        });
        self.refresh_pin_state();
        self.refresh_views();
        record.key
    }

    // --- Lookups and views ---

    pub fn get(&self, key: IconKey) -> Option<&IconRecord> {
        self.icons.iter().find(|icon| icon.key == key)
    }

    /// Looks up an icon by stable id first, then by window and sub-id.
    pub fn find(
        &self,
        stable_id: Option<Uuid>,
        window: WindowHandle,
        sub_id: u32,
    ) -> Option<&IconRecord> {
        self.resolve(&Identity::lookup_order(stable_id, window, sub_id))
            .map(|index| &self.icons[index])
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Every icon in insertion order, hidden ones included.
    pub fn icons(&self) -> impl Iterator<Item = &IconRecord> {
        self.icons.iter()
    }

    /// Icons that are not hidden, in insertion order.
    pub fn visible_icons(&self) -> Vec<&IconRecord> {
        self.collect_view(&self.views.visible)
    }

    /// Pinned, non-hidden icons sorted by pin order.
    pub fn pinned_icons(&self) -> Vec<&IconRecord> {
        self.collect_view(&self.views.pinned)
    }

    /// Unpinned, non-hidden icons in insertion order.
    pub fn unpinned_icons(&self) -> Vec<&IconRecord> {
        self.collect_view(&self.views.unpinned)
    }

    /// Incremented every time any derived view changes.
    pub fn view_generation(&self) -> u64 {
        self.view_generation
    }

    fn collect_view(&self, keys: &[IconKey]) -> Vec<&IconRecord> {
        keys.iter().filter_map(|key| self.get(*key)).collect()
    }

    fn refresh_views(&mut self) {
        let visible: Vec<&IconRecord> = self.icons.iter().filter(|i| !i.hidden).collect();

        let mut pinned: Vec<&IconRecord> = visible.iter().copied().filter(|i| i.pinned).collect();
        pinned.sort_by_key(|i| i.pin_order);

        let views = Views {
            visible: visible.iter().map(|i| i.key).collect(),
            pinned: pinned.iter().map(|i| i.key).collect(),
            unpinned: visible
                .iter()
                .filter(|i| !i.pinned)
                .map(|i| i.key)
                .collect(),
        };

        if views != self.views {
            self.views = views;
            self.view_generation += 1;
        }
    }

    // --- Pins ---

    pub fn pinned_list(&self) -> &PinList {
        &self.pins
    }

    /// Pins `key` at `position` among the pinned icons of this session, or
    /// moves it there if it is already pinned. Returns whether the list
    /// changed.
    pub fn set_pin(&mut self, key: IconKey, position: usize) -> Result<bool, RegistryError> {
        let record = self.get(key).ok_or(RegistryError::UnknownKey(key))?;
        let was_pinned = record.pinned;
        let mut pins = self.pins.clone();
        if was_pinned {
            pins.remove_matching(|entry| record.matches_pin(entry));
        }

        // `position` counts the other live pinned icons, not raw entries.
        let others = self.live_pin_indices(&pins, key);
        let position = position.min(others.len());
        if was_pinned && record.pin_order == position {
            return Ok(false);
        }
        let at = others.get(position).copied().unwrap_or(pins.len());
        pins.insert(at, record.pin_key());
        if pins == self.pins {
            return Ok(false);
        }

        tracing::debug!(%key, position, moved = was_pinned, "icon pinned");
        self.commit_pins(pins);
        Ok(true)
    }

    /// Removes `key` from the pin list. Returns whether the list changed.
    pub fn unpin(&mut self, key: IconKey) -> Result<bool, RegistryError> {
        let record = self.get(key).ok_or(RegistryError::UnknownKey(key))?;
        if !record.pinned {
            return Ok(false);
        }
        let mut pins = self.pins.clone();
        pins.remove_matching(|entry| record.matches_pin(entry));

        tracing::debug!(%key, "icon unpinned");
        self.commit_pins(pins);
        Ok(true)
    }

    /// Replaces the pin list (e.g. settings reloaded elsewhere) without
    /// writing it back to the store.
    pub fn set_pinned_list(&mut self, pins: PinList) {
        if pins == self.pins {
            return;
        }
        self.pins = pins;
        self.recompute_pins();
    }

    fn commit_pins(&mut self, pins: PinList) {
        self.pins = pins;
        if let Err(e) = self.store.save(&self.pins) {
            tracing::warn!(error = %e, "failed to persist pin list");
        }
        self.recompute_pins();
    }

    fn recompute_pins(&mut self) {
        self.refresh_pin_state();
        self.emit(RegistryEvent::PinsChanged);
        self.refresh_views();
    }

    /// List indices of the first entry matching each live icon other than
    /// `except`, ascending and deduplicated.
    fn live_pin_indices(&self, pins: &PinList, except: IconKey) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .icons
            .iter()
            .filter(|record| record.key != except)
            .filter_map(|record| pins.position(|entry| record.matches_pin(entry)))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Recomputes pin flags and orders for every icon. The order is dense:
    /// the rank of the icon's first matching entry among the entries that
    /// match a live icon, so entries for absent icons leave no gaps.
    fn refresh_pin_state(&mut self) {
        let positions: Vec<Option<usize>> = self
            .icons
            .iter()
            .map(|record| self.pins.position(|entry| record.matches_pin(entry)))
            .collect();
        let mut live: Vec<usize> = positions.iter().flatten().copied().collect();
        live.sort_unstable();
        live.dedup();

        for (record, position) in self.icons.iter_mut().zip(positions) {
            record.pinned = position.is_some();
            record.pin_order = position.map_or(0, |raw| live.partition_point(|&i| i < raw));
        }
    }

    // --- Placement ---

    /// Default rectangle for new icons and for the volume-icon fallback.
    pub fn set_default_placement(&mut self, rect: Rect) {
        self.default_placement = rect;
    }

    pub fn default_placement(&self) -> Rect {
        self.default_placement
    }

    /// Records where the UI currently draws `key`.
    pub fn set_placement(&mut self, key: IconKey, rect: Rect) -> Result<(), RegistryError> {
        let index = self.index_of(key).ok_or(RegistryError::UnknownKey(key))?;
        self.icons[index].placement = rect;
        Ok(())
    }

    /// Placement answer for the position query protocol.
    ///
    /// The legacy volume control asks for its position before registering
    /// its icon; it gets the default rectangle instead of nothing.
    pub fn resolve_placement(
        &self,
        stable_id: Option<Uuid>,
        window: WindowHandle,
        sub_id: u32,
    ) -> Option<Rect> {
        if let Some(icon) = self.find(stable_id, window, sub_id) {
            return Some(icon.placement);
        }
        let is_volume = stable_id.is_some_and(|guid| stable_key(&guid) == VOLUME_ICON_GUID);
        is_volume.then_some(self.default_placement)
    }

    // --- Outbound interaction ---

    /// Delivers a pointer event to the owner of `key`, reading the clock now.
    pub fn dispatch_pointer(
        &mut self,
        key: IconKey,
        event: PointerEvent,
        cursor: Point,
        double_click: Duration,
    ) -> Delivery {
        self.dispatch_pointer_at(key, event, cursor, double_click, Instant::now())
    }

    /// Delivers a pointer event with an explicit delivery timestamp.
    ///
    /// The owner window is checked first; a dead owner removes the icon and
    /// drops the event.
    pub fn dispatch_pointer_at(
        &mut self,
        key: IconKey,
        event: PointerEvent,
        cursor: Point,
        double_click: Duration,
        now: Instant,
    ) -> Delivery {
        let index = match self.live_index(key) {
            Ok(index) => index,
            Err(delivery) => return delivery,
        };
        let record = &mut self.icons[index];
        let messages = record.translate(event, cursor, now, double_click);
        if matches!(event, PointerEvent::ButtonUp(_)) {
            self.host.allow_foreground(record.window);
        }
        self.post_all(&messages)
    }

    /// Tells the owner of `key` what happened to its balloon.
    pub fn dispatch_balloon(&mut self, key: IconKey, event: BalloonEvent, cursor: Point) -> Delivery {
        let index = match self.live_index(key) {
            Ok(index) => index,
            Err(delivery) => return delivery,
        };
        let message = self.icons[index].balloon_message(event, cursor);
        self.post_all(&[message])
    }

    /// Index of `key` if its owner is still alive. A dead owner is removed.
    fn live_index(&mut self, key: IconKey) -> Result<usize, Delivery> {
        let index = self.index_of(key).ok_or(Delivery::UnknownIcon)?;
        let window = self.icons[index].window;
        if self.host.is_window(window) {
            return Ok(index);
        }
        tracing::info!(%window, %key, "owner window gone, dropping icon");
        self.remove_at(index, RemovalReason::Stale);
        Err(Delivery::Stale)
    }

    fn post_all(&self, messages: &[NotifyMessage]) -> Delivery {
        let mut sent = 0;
        for message in messages {
            if self.host.post_notify(message) {
                sent += 1;
            } else {
                tracing::debug!(window = %message.window, "callback post failed");
            }
        }
        Delivery::Sent(sent)
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Copies every field whose presence bit is set. Absent bits leave the
/// record untouched.
fn update_fields(record: &mut IconRecord, message: &WireMessage) {
    if let Some(callback) = message.callback_message() {
        record.callback_message = callback;
    }
    if let Some(icon) = message.icon() {
        record.icon = icon;
    }
    if let Some(tooltip) = message.tooltip() {
        record.tooltip = tooltip.to_owned();
    }
    if let Some(hidden) = message.hidden() {
        record.hidden = hidden;
    }
}
