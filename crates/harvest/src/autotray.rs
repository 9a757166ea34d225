//! The foreign tray's "hide inactive icons" preference.
//!
//! While auto-tray is on, the foreign tray moves new icons into its
//! overflow and their buttons are not where we look for them. Harvesting
//! therefore switches it off first and restores it afterwards.

use crate::error::HarvestError;

/// Which tray-notify interface the running shell exposes. Resolved once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayNotifyCapability {
    /// Windows 8 and later interface.
    Win8,
    /// Windows 7 and earlier interface.
    Legacy,
    Unavailable,
}

/// Control over the foreign tray's auto-tray preference.
pub trait AutoTrayControl {
    fn capability(&self) -> TrayNotifyCapability;

    /// Current user setting, if it can be read.
    fn is_enabled(&self) -> Option<bool>;

    fn set_enabled(&mut self, enabled: bool) -> Result<(), HarvestError>;
}

/// Turns auto-tray off for its lifetime and restores it on drop.
///
/// Failures are logged; they never stop harvesting.
pub struct AutoTrayGuard<'a> {
    control: &'a mut dyn AutoTrayControl,
    restore: bool,
}

impl<'a> AutoTrayGuard<'a> {
    pub fn disable(control: &'a mut dyn AutoTrayControl) -> Self {
        let capability = control.capability();
        if capability == TrayNotifyCapability::Unavailable {
            tracing::debug!("tray notify interface unavailable, leaving auto-tray alone");
            return Self {
                control,
                restore: false,
            };
        }

        // Missing value means the shell default, which is on.
        if !control.is_enabled().unwrap_or(true) {
            tracing::debug!("auto-tray already off");
            return Self {
                control,
                restore: false,
            };
        }

        let restore = match control.set_enabled(false) {
            Ok(()) => {
                tracing::debug!(?capability, "auto-tray disabled for harvest");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to disable auto-tray");
                false
            }
        };
        Self { control, restore }
    }

    /// Whether drop will switch auto-tray back on.
    pub fn will_restore(&self) -> bool {
        self.restore
    }
}

impl Drop for AutoTrayGuard<'_> {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }
        match self.control.set_enabled(true) {
            Ok(()) => tracing::debug!("auto-tray restored"),
            Err(e) => tracing::warn!(error = %e, "failed to restore auto-tray"),
        }
    }
}
