//! Legacy icon harvesting.
//!
//! When the emulated tray starts while another shell's tray is still
//! running, icons registered before startup exist only inside that shell.
//! This crate reads them out of its toolbar, one `TBBUTTON` and tray record
//! at a time, and replays each as an `Add` through the icon registry.
//!
//! The toolbar walk is behind [`ForeignTray`] and [`RemoteMemory`] so the
//! record decoding and replay logic test without a running shell.

pub mod autotray;
pub mod error;
pub mod foreign;
pub mod harvester;
pub mod remote;

#[cfg(target_os = "windows")]
#[path = "platform_windows.rs"]
mod platform;

#[cfg(not(target_os = "windows"))]
#[path = "platform_other.rs"]
mod platform;

use shelltray_registry::IconRegistry;

pub use autotray::{AutoTrayControl, AutoTrayGuard, TrayNotifyCapability};
pub use error::HarvestError;
pub use foreign::ForeignTray;
pub use harvester::{HarvestReport, LegacyHarvester};
#[cfg(target_os = "windows")]
pub use platform::{ComTrayNotify, ProcessMemory, Win32ForeignTray};
pub use remote::{MAX_REMOTE_READ, PointerWidth, RemoteMemory, TbButton, TrayData};

/// Harvests the running shell's tray into `registry`, switching its
/// auto-tray preference off for the duration.
pub fn harvest_running_tray(registry: &mut IconRegistry) -> Result<HarvestReport, HarvestError> {
    let tray = platform::open_foreign_tray()?;
    let mut auto_tray = platform::auto_tray_control();
    LegacyHarvester::new(&tray)
        .with_auto_tray(&mut auto_tray)
        .harvest(registry)
}
