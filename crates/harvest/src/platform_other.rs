//! Stand-in for platforms without a foreign shell tray to read.

use std::convert::Infallible;

use crate::autotray::{AutoTrayControl, TrayNotifyCapability};
use crate::error::HarvestError;
use crate::foreign::ForeignTray;
use crate::remote::{PointerWidth, RemoteMemory};

/// Never constructed: [`open_foreign_tray`] always fails here.
pub struct UnsupportedTray {
    never: Infallible,
}

impl ForeignTray for UnsupportedTray {
    fn pointer_width(&self) -> PointerWidth {
        match self.never {}
    }

    fn button_count(&self) -> Result<usize, HarvestError> {
        match self.never {}
    }

    fn button(&self, _index: usize) -> Result<Vec<u8>, HarvestError> {
        match self.never {}
    }

    fn memory(&self) -> &dyn RemoteMemory {
        match self.never {}
    }
}

pub struct NoAutoTray;

impl AutoTrayControl for NoAutoTray {
    fn capability(&self) -> TrayNotifyCapability {
        TrayNotifyCapability::Unavailable
    }

    fn is_enabled(&self) -> Option<bool> {
        None
    }

    fn set_enabled(&mut self, _enabled: bool) -> Result<(), HarvestError> {
        Err(HarvestError::AutoTrayUnavailable)
    }
}

pub fn open_foreign_tray() -> Result<UnsupportedTray, HarvestError> {
    Err(HarvestError::Unsupported)
}

pub fn auto_tray_control() -> NoAutoTray {
    NoAutoTray
}
