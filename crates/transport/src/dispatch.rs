//! Re-entrancy-safe front door to the [`Transport`].
//!
//! Forwarding to the secondary tray is a blocking cross-process send, and
//! while it waits the thread keeps dispatching inbound sent messages. The
//! transport is therefore only borrowed for routing; the forward itself
//! happens after the borrow is released, so a request that arrives during
//! it is handled inline with its real result.

use std::cell::RefCell;

use shelltray_protocol::Envelope;

use crate::host::TrayHost;
use crate::queue::{QueueHandle, Work};
use crate::transport::{Reply, Route, Transport};

/// Owns the transport on the dispatch thread.
pub struct Dispatcher {
    transport: RefCell<Transport>,
    queue: QueueHandle,
    forwarder: Box<dyn TrayHost>,
}

impl Dispatcher {
    /// `forwarder` performs the sends [`Transport::route`] leaves to the
    /// caller.
    pub fn new(transport: Transport, forwarder: Box<dyn TrayHost>) -> Self {
        let queue = transport.queue_handle();
        Self {
            transport: RefCell::new(transport),
            queue,
            forwarder,
        }
    }

    /// Handles one inbound request and returns the window-procedure result.
    pub fn receive(&self, envelope: &Envelope<'_>) -> isize {
        let route = match self.transport.try_borrow_mut() {
            Ok(mut transport) => transport.route(envelope),
            Err(_) => return self.defer(envelope),
        };
        let reply = match route {
            Route::Reply(reply) => reply,
            Route::Forward(target) => Reply::Forwarded(self.forwarder.forward(target, envelope)),
        };
        self.drain();
        reply.value()
    }

    /// The transport is borrowed further up this thread's stack (a queued
    /// item or a [`Dispatcher::with_transport`] caller is running). The
    /// request is queued and answered 0, since whether it will succeed is
    /// not known yet.
    fn defer(&self, envelope: &Envelope<'_>) -> isize {
        tracing::debug!(
            discriminant = envelope.discriminant,
            sender = %envelope.sender,
            "nested tray request queued"
        );
        if let Err(e) = self.queue.submit(Work::Envelope(envelope.detach())) {
            tracing::warn!(error = %e, "failed to queue nested request");
        }
        0
    }

    /// Runs queued work, unless the transport is busy further up the stack.
    pub fn drain(&self) {
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            let ran = transport.drain();
            if ran > 0 {
                tracing::trace!(ran, "drained queued work");
            }
        }
    }

    /// Runs `f` against the transport, unless a request is being routed
    /// right now (then the caller should queue work instead).
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut Transport) -> R) -> Option<R> {
        let mut transport = self.transport.try_borrow_mut().ok()?;
        Some(f(&mut transport))
    }

    pub fn queue_handle(&self) -> QueueHandle {
        self.queue.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};
    use std::time::Duration;

    use shelltray_protocol::{IconDatagram, MessageKind, WindowHandle, WireMessage};
    use shelltray_registry::{IconHost, IconRegistry, MemoryPinStore, NotifyMessage};

    use super::*;

    const SENDER: WindowHandle = WindowHandle(0x1234);
    const SECONDARY: WindowHandle = WindowHandle(0x9999);

    #[derive(Clone, Default)]
    struct Desktop;

    impl TrayHost for Desktop {
        fn is_window(&self, _window: WindowHandle) -> bool {
            true
        }

        fn find_secondary_tray(&self) -> Option<WindowHandle> {
            Some(SECONDARY)
        }

        fn forward(&self, _target: WindowHandle, _envelope: &Envelope<'_>) -> isize {
            panic!("forwarded through the transport's own host while borrowed");
        }

        fn double_click_time(&self) -> Duration {
            Duration::from_millis(500)
        }
    }

    impl IconHost for Desktop {
        fn is_window(&self, _window: WindowHandle) -> bool {
            true
        }

        fn post_notify(&self, _message: &NotifyMessage) -> bool {
            true
        }
    }

    /// A secondary tray that, while answering, triggers more tray traffic
    /// back into the dispatcher, the way a message pumped during a
    /// cross-process send would.
    #[derive(Default)]
    struct Reentrant {
        dispatcher: RefCell<Weak<Dispatcher>>,
        nested: RefCell<Vec<Vec<u8>>>,
        replies: RefCell<Vec<isize>>,
        forwards: Cell<usize>,
    }

    #[derive(Clone, Default)]
    struct ReentrantTray(Rc<Reentrant>);

    impl TrayHost for ReentrantTray {
        fn is_window(&self, _window: WindowHandle) -> bool {
            true
        }

        fn find_secondary_tray(&self) -> Option<WindowHandle> {
            Some(SECONDARY)
        }

        fn forward(&self, target: WindowHandle, _envelope: &Envelope<'_>) -> isize {
            assert_eq!(target, SECONDARY);
            self.0.forwards.set(self.0.forwards.get() + 1);
            let Some(dispatcher) = self.0.dispatcher.borrow().upgrade() else {
                return 0;
            };
            let nested = std::mem::take(&mut *self.0.nested.borrow_mut());
            for payload in nested {
                let reply = dispatcher.receive(&Envelope::new(SENDER, 1, &payload));
                self.0.replies.borrow_mut().push(reply);
            }
            7
        }
    }

    fn datagram(kind: MessageKind, message: WireMessage) -> Vec<u8> {
        IconDatagram { kind, message }.encode()
    }

    fn dispatcher() -> (Rc<Dispatcher>, ReentrantTray) {
        let registry = IconRegistry::new(Box::new(Desktop), Box::new(MemoryPinStore::default()));
        let transport = Transport::new(registry, Box::new(Desktop));
        let tray = ReentrantTray::default();
        let dispatcher = Rc::new(Dispatcher::new(transport, Box::new(tray.clone())));
        *tray.0.dispatcher.borrow_mut() = Rc::downgrade(&dispatcher);
        (dispatcher, tray)
    }

    fn tooltip(d: &Dispatcher) -> Option<String> {
        d.with_transport(|t| {
            t.registry()
                .icons()
                .next()
                .map(|icon| icon.tooltip().to_string())
        })
        .flatten()
    }

    #[test]
    fn traffic_during_a_forward_is_applied_inline() {
        let (d, tray) = dispatcher();
        let add = datagram(
            MessageKind::Add,
            WireMessage::new(WindowHandle(100), 1).with_tooltip("Mail"),
        );
        assert_eq!(d.receive(&Envelope::new(SENDER, 1, &add)), 1);

        *tray.0.nested.borrow_mut() = vec![
            datagram(
                MessageKind::Modify,
                WireMessage::new(WindowHandle(100), 1).with_tooltip("Mail (3)"),
            ),
            datagram(MessageKind::Modify, WireMessage::new(WindowHandle(555), 9)),
        ];
        assert_eq!(d.receive(&Envelope::new(SENDER, 2, b"opaque")), 7);

        assert_eq!(tray.0.forwards.get(), 1);
        assert_eq!(*tray.0.replies.borrow(), vec![1, 0]);
        assert_eq!(tooltip(&d).as_deref(), Some("Mail (3)"));
    }

    #[test]
    fn requests_while_the_transport_is_borrowed_are_queued_and_answered_false() {
        let (d, _) = dispatcher();
        let add = datagram(
            MessageKind::Add,
            WireMessage::new(WindowHandle(100), 1).with_tooltip("Mail"),
        );

        let reply = d.with_transport(|_| d.receive(&Envelope::new(SENDER, 1, &add)));
        assert_eq!(reply, Some(0));
        assert_eq!(d.with_transport(|t| t.registry().len()), Some(0));

        d.drain();
        assert_eq!(tooltip(&d).as_deref(), Some("Mail"));
    }
}
