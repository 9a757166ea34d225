//! Access to a previously running tray's toolbar.

use crate::error::HarvestError;
use crate::remote::{PointerWidth, RemoteMemory};

/// The button strip of a foreign tray and the process that owns it.
pub trait ForeignTray {
    fn pointer_width(&self) -> PointerWidth;

    fn button_count(&self) -> Result<usize, HarvestError>;

    /// Raw `TBBUTTON` bytes for `index`, copied out of the foreign process.
    fn button(&self, index: usize) -> Result<Vec<u8>, HarvestError>;

    /// Memory of the process that owns the toolbar.
    fn memory(&self) -> &dyn RemoteMemory;
}
