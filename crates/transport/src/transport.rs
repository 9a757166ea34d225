//! Inbound request demultiplexer.
//!
//! Every `WM_COPYDATA` delivered to the emulated tray window ends up in
//! [`Transport::route`], which sorts it by discriminant:
//!
//! | value | payload          | action                                     |
//! |-------|------------------|--------------------------------------------|
//! | 0     | app-bar request  | handler, else forward; drop if malformed   |
//! | 1     | systray datagram | decode, apply to the registry              |
//! | 3     | placement query  | answer from the registry                   |
//! | other | opaque           | forward verbatim                           |
//!
//! Routing never sends anything itself: a [`Route::Forward`] is left to the
//! caller so the blocking send can happen outside any borrow of the
//! transport.

use std::time::Duration;

use shelltray_protocol::{
    AppBarRequest, Discriminant, Envelope, IconDatagram, PlacementQuery, Point, Rect,
    WindowHandle,
};
use shelltray_registry::{BalloonEvent, Delivery, IconKey, IconRegistry, PointerEvent};

use crate::host::{AppBarHandler, TrayHost};
use crate::queue::{QueueHandle, Work, WorkQueue};

/// Outcome of one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Answered locally with this value.
    Handled(isize),
    /// Answered by the secondary tray.
    Forwarded(isize),
    /// Malformed or unroutable; nothing was answered.
    Dropped,
}

impl Reply {
    /// Value to return from the window procedure.
    pub fn value(self) -> isize {
        match self {
            Reply::Handled(v) | Reply::Forwarded(v) => v,
            Reply::Dropped => 0,
        }
    }
}

/// Where [`Transport::route`] left a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Finished; nothing left to send.
    Reply(Reply),
    /// Must be sent on to this secondary tray by the caller.
    Forward(WindowHandle),
}

/// Owns the registry and routes tray traffic into it.
pub struct Transport {
    registry: IconRegistry,
    host: Box<dyn TrayHost>,
    app_bar: Option<Box<dyn AppBarHandler>>,
    secondary: Option<WindowHandle>,
    forward_to_secondary: bool,
    double_click: Option<Duration>,
    queue: WorkQueue,
}

impl Transport {
    pub fn new(registry: IconRegistry, host: Box<dyn TrayHost>) -> Self {
        Self {
            registry,
            host,
            app_bar: None,
            secondary: None,
            forward_to_secondary: true,
            double_click: None,
            queue: WorkQueue::new(),
        }
    }

    pub fn set_app_bar_handler(&mut self, handler: Box<dyn AppBarHandler>) {
        self.app_bar = Some(handler);
    }

    /// Enables or disables forwarding of unhandled traffic.
    pub fn set_forward_to_secondary(&mut self, enabled: bool) {
        self.forward_to_secondary = enabled;
        if !enabled {
            self.secondary = None;
        }
    }

    /// Fixed double-click threshold; `None` asks the host each time.
    pub fn set_double_click(&mut self, threshold: Option<Duration>) {
        self.double_click = threshold;
    }

    pub fn registry(&self) -> &IconRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IconRegistry {
        &mut self.registry
    }

    pub fn queue_handle(&self) -> QueueHandle {
        self.queue.handle()
    }

    /// Updates the default placement used for new icons and for the
    /// volume-control fallback.
    pub fn set_host_rectangle(&mut self, rect: Rect) {
        tracing::debug!(?rect, "host rectangle updated");
        self.registry.set_default_placement(rect);
    }

    /// Routes one inbound request, forwarding through the transport's own
    /// host when the request is not answered locally.
    pub fn handle(&mut self, envelope: &Envelope<'_>) -> Reply {
        match self.route(envelope) {
            Route::Reply(reply) => reply,
            Route::Forward(target) => Reply::Forwarded(self.host.forward(target, envelope)),
        }
    }

    /// Answers what can be answered locally and resolves the forwarding
    /// target for the rest, without sending anything.
    pub fn route(&mut self, envelope: &Envelope<'_>) -> Route {
        match envelope.kind() {
            Discriminant::AppBar => self.route_app_bar(envelope),
            Discriminant::Systray => Route::Reply(self.handle_systray(envelope)),
            Discriminant::Placement => Route::Reply(self.handle_placement(envelope)),
            Discriminant::Other(raw) => {
                tracing::trace!(discriminant = raw, "forwarding unknown request");
                self.forward_target()
            }
        }
    }

    fn handle_systray(&mut self, envelope: &Envelope<'_>) -> Reply {
        let datagram = match IconDatagram::decode(envelope.payload) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(sender = %envelope.sender, error = %e, "dropping malformed systray datagram");
                return Reply::Dropped;
            }
        };

        match self.registry.apply(datagram.kind, &datagram.message) {
            Ok(outcome) => {
                tracing::trace!(?outcome, "systray datagram applied");
                Reply::Handled(1)
            }
            Err(e) => {
                tracing::debug!(
                    window = %datagram.message.window,
                    sub_id = datagram.message.sub_id,
                    kind = ?datagram.kind,
                    error = %e,
                    "systray datagram rejected"
                );
                Reply::Handled(0)
            }
        }
    }

    fn handle_placement(&mut self, envelope: &Envelope<'_>) -> Reply {
        let query = match PlacementQuery::decode(envelope.payload) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(sender = %envelope.sender, error = %e, "dropping malformed placement query");
                return Reply::Dropped;
            }
        };

        let rect = self
            .registry
            .resolve_placement(query.stable_id(), query.window, query.sub_id);
        match rect {
            Some(rect) => Reply::Handled(query.corner.reply(&rect) as isize),
            None => Reply::Handled(0),
        }
    }

    fn route_app_bar(&mut self, envelope: &Envelope<'_>) -> Route {
        let request = match AppBarRequest::parse(envelope.payload) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(sender = %envelope.sender, error = %e, "dropping malformed app-bar request");
                return Route::Reply(Reply::Dropped);
            }
        };
        match self.app_bar.as_mut().and_then(|handler| handler.handle(&request)) {
            Some(value) => Route::Reply(Reply::Handled(value)),
            None => self.forward_target(),
        }
    }

    fn forward_target(&mut self) -> Route {
        match self.secondary_tray() {
            Some(target) => Route::Forward(target),
            None => Route::Reply(Reply::Dropped),
        }
    }

    /// The secondary tray, resolved lazily and re-resolved only when the
    /// cached window is gone.
    pub fn secondary_tray(&mut self) -> Option<WindowHandle> {
        if !self.forward_to_secondary {
            return None;
        }
        if let Some(cached) = self.secondary {
            if self.host.is_window(cached) {
                return Some(cached);
            }
        }
        self.secondary = self.host.find_secondary_tray();
        if let Some(found) = self.secondary {
            tracing::debug!(window = %found, "secondary tray resolved");
        }
        self.secondary
    }

    /// Delivers a pointer event to an icon's owner using the current
    /// double-click threshold.
    pub fn dispatch_pointer(&mut self, key: IconKey, event: PointerEvent, cursor: Point) -> Delivery {
        let threshold = self
            .double_click
            .unwrap_or_else(|| self.host.double_click_time());
        self.registry.dispatch_pointer(key, event, cursor, threshold)
    }

    pub fn dispatch_balloon(&mut self, key: IconKey, event: BalloonEvent, cursor: Point) -> Delivery {
        self.registry.dispatch_balloon(key, event, cursor)
    }

    /// Runs one deferred operation now.
    pub fn run(&mut self, work: Work) {
        match work {
            Work::Envelope(envelope) => {
                let reply = self.handle(&envelope.as_envelope());
                tracing::trace!(?reply, "queued request handled");
            }
            Work::SetPin { key, position } => {
                if let Err(e) = self.registry.set_pin(key, position) {
                    tracing::warn!(%key, error = %e, "queued pin failed");
                }
            }
            Work::Unpin(key) => {
                if let Err(e) = self.registry.unpin(key) {
                    tracing::warn!(%key, error = %e, "queued unpin failed");
                }
            }
            Work::SetPinnedList(pins) => self.registry.set_pinned_list(pins),
            Work::SetHostRectangle(rect) => self.set_host_rectangle(rect),
            Work::SetPlacement { key, rect } => {
                if let Err(e) = self.registry.set_placement(key, rect) {
                    tracing::debug!(%key, error = %e, "queued placement update failed");
                }
            }
            Work::Pointer { key, event, cursor } => {
                self.dispatch_pointer(key, event, cursor);
            }
            Work::Balloon { key, event, cursor } => {
                self.dispatch_balloon(key, event, cursor);
            }
        }
    }

    /// Runs everything queued so far, including work queued by the work
    /// itself. Returns the number of items run.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(work) = self.queue.try_next() {
            self.run(work);
            count += 1;
        }
        count
    }
}
