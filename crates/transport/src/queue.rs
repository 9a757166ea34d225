//! Deferred work for the dispatch thread.
//!
//! Anything that wants to call back into the transport while it is busy
//! (a nested `WM_COPYDATA`, an app-bar relay, a pin action from another
//! component) submits a [`Work`] item instead. The owner drains the queue
//! once the current message has returned, so nothing recurses.

use std::sync::mpsc;

use shelltray_protocol::{OwnedEnvelope, Point, Rect};
use shelltray_registry::{BalloonEvent, IconKey, PinList, PointerEvent};

use crate::error::TransportError;

/// One deferred operation.
#[derive(Debug, Clone)]
pub enum Work {
    /// Inbound request that arrived while another was being handled.
    Envelope(OwnedEnvelope),
    SetPin { key: IconKey, position: usize },
    Unpin(IconKey),
    SetPinnedList(PinList),
    SetHostRectangle(Rect),
    SetPlacement { key: IconKey, rect: Rect },
    Pointer {
        key: IconKey,
        event: PointerEvent,
        cursor: Point,
    },
    Balloon {
        key: IconKey,
        event: BalloonEvent,
        cursor: Point,
    },
}

/// Receiving side, owned by the transport.
#[derive(Debug)]
pub struct WorkQueue {
    tx: mpsc::Sender<Work>,
    rx: mpsc::Receiver<Work>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Next queued item, without blocking.
    pub fn try_next(&self) -> Option<Work> {
        self.rx.try_recv().ok()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Submitting side. Cheap to clone and hand to other components.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Work>,
}

impl QueueHandle {
    pub fn submit(&self, work: Work) -> Result<(), TransportError> {
        self.tx.send(work).map_err(|_| TransportError::QueueClosed)
    }

    pub fn set_pin(&self, key: IconKey, position: usize) -> Result<(), TransportError> {
        self.submit(Work::SetPin { key, position })
    }

    pub fn unpin(&self, key: IconKey) -> Result<(), TransportError> {
        self.submit(Work::Unpin(key))
    }

    pub fn set_host_rectangle(&self, rect: Rect) -> Result<(), TransportError> {
        self.submit(Work::SetHostRectangle(rect))
    }
}
