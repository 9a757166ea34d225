//! Replays icons from a foreign tray into the registry.

use shelltray_protocol::MessageKind;
use shelltray_registry::{ApplyOutcome, IconRegistry};

use crate::autotray::{AutoTrayControl, AutoTrayGuard};
use crate::error::HarvestError;
use crate::foreign::ForeignTray;
use crate::remote::{TbButton, TrayData, check_read};

/// Counts from one harvest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Buttons in the foreign toolbar.
    pub found: usize,
    /// Icons accepted by the registry.
    pub applied: usize,
    /// Buttons whose data could not be read or was rejected.
    pub skipped: usize,
}

/// One-shot importer for icons registered before this tray started.
///
/// Each icon is turned into the `Add` datagram its owner would have sent and
/// goes through [`IconRegistry::apply`] like live traffic.
pub struct LegacyHarvester<'a> {
    tray: &'a dyn ForeignTray,
    auto_tray: Option<&'a mut dyn AutoTrayControl>,
}

impl<'a> LegacyHarvester<'a> {
    pub fn new(tray: &'a dyn ForeignTray) -> Self {
        Self {
            tray,
            auto_tray: None,
        }
    }

    pub fn with_auto_tray(mut self, control: &'a mut dyn AutoTrayControl) -> Self {
        self.auto_tray = Some(control);
        self
    }

    pub fn harvest(&mut self, registry: &mut IconRegistry) -> Result<HarvestReport, HarvestError> {
        let tray = self.tray;
        let _auto_tray = self
            .auto_tray
            .as_deref_mut()
            .map(|control| AutoTrayGuard::disable(control));

        let found = tray.button_count()?;
        let mut report = HarvestReport {
            found,
            ..HarvestReport::default()
        };
        tracing::info!(count = found, width = ?tray.pointer_width(), "harvesting foreign tray");

        for index in 0..found {
            match harvest_one(tray, index, registry) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping foreign tray button");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            "foreign tray harvested"
        );
        Ok(report)
    }
}

/// Reads one button and applies it. `Ok(false)` means the registry
/// rejected the synthesized datagram.
fn harvest_one(
    tray: &dyn ForeignTray,
    index: usize,
    registry: &mut IconRegistry,
) -> Result<bool, HarvestError> {
    let width = tray.pointer_width();
    let button = TbButton::parse(width, &tray.button(index)?)?;

    let len = width.tray_data_size();
    check_read(button.data, len)?;
    let raw = tray.memory().read(button.data, len)?;
    let data = TrayData::parse(width, &raw)?;

    let message = data.to_message();
    let key = match registry.apply(MessageKind::Add, &message) {
        Ok(ApplyOutcome::Added(key) | ApplyOutcome::Updated(key)) => key,
        Ok(other) => {
            tracing::debug!(index, outcome = ?other, "harvested icon had no effect");
            return Ok(false);
        }
        Err(e) => {
            tracing::debug!(index, window = %data.window, error = %e, "harvested icon rejected");
            return Ok(false);
        }
    };

    if let Some(version) = data.negotiated_version() {
        if let Err(e) = registry.apply(MessageKind::SetVersion, &message.with_version(version)) {
            tracing::debug!(%key, version, error = %e, "harvested version rejected");
        }
    }

    tracing::debug!(
        %key,
        window = %data.window,
        sub_id = data.sub_id,
        hidden = data.is_hidden(),
        exe = %data.exe_path,
        "harvested icon"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use shelltray_protocol::WindowHandle;
    use shelltray_registry::{IconHost, MemoryPinStore, NotifyMessage, RegistryEvent};
    use uuid::Uuid;

    use super::*;
    use crate::autotray::TrayNotifyCapability;
    use crate::autotray::test_support::FakeAutoTray;
    use crate::remote::test_support::{button_64, tray_data_64};
    use crate::remote::{PointerWidth, RemoteMemory};

    struct FakeMemory(HashMap<u64, Vec<u8>>);

    impl RemoteMemory for FakeMemory {
        fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, HarvestError> {
            match self.0.get(&address) {
                Some(bytes) if bytes.len() >= len => Ok(bytes[..len].to_vec()),
                _ => Err(HarvestError::RemoteRead { address, len }),
            }
        }
    }

    struct FakeTray {
        buttons: Vec<Vec<u8>>,
        memory: FakeMemory,
    }

    impl FakeTray {
        fn new() -> Self {
            Self {
                buttons: Vec::new(),
                memory: FakeMemory(HashMap::new()),
            }
        }

        fn push(&mut self, address: u64, record: Vec<u8>) {
            let command = self.buttons.len() as i32;
            self.buttons.push(button_64(command, address));
            if address != 0 {
                self.memory.0.insert(address, record);
            }
        }
    }

    impl ForeignTray for FakeTray {
        fn pointer_width(&self) -> PointerWidth {
            PointerWidth::Bits64
        }

        fn button_count(&self) -> Result<usize, HarvestError> {
            Ok(self.buttons.len())
        }

        fn button(&self, index: usize) -> Result<Vec<u8>, HarvestError> {
            self.buttons
                .get(index)
                .cloned()
                .ok_or(HarvestError::RemoteRead {
                    address: index as u64,
                    len: 32,
                })
        }

        fn memory(&self) -> &dyn RemoteMemory {
            &self.memory
        }
    }

    struct LiveHost;

    impl IconHost for LiveHost {
        fn is_window(&self, _window: WindowHandle) -> bool {
            true
        }

        fn post_notify(&self, _message: &NotifyMessage) -> bool {
            true
        }
    }

    fn registry() -> IconRegistry {
        IconRegistry::new(Box::new(LiveHost), Box::new(MemoryPinStore::default()))
    }

    #[test]
    fn two_foreign_icons_arrive_through_add() {
        let mut tray = FakeTray::new();
        tray.push(0x1000, tray_data_64(0x100, 1, false, "Volume", Uuid::nil()));
        tray.push(0x2000, tray_data_64(0x200, 2, true, "Updates", Uuid::nil()));

        let mut registry = registry();
        let rx = registry.subscribe();
        let report = LegacyHarvester::new(&tray).harvest(&mut registry).unwrap();

        assert_eq!(
            report,
            HarvestReport {
                found: 2,
                applied: 2,
                skipped: 0
            }
        );
        let added: Vec<(WindowHandle, bool)> = rx
            .try_iter()
            .filter_map(|e| match e {
                RegistryEvent::Added(snapshot) => Some((snapshot.window, snapshot.hidden)),
                _ => None,
            })
            .collect();
        assert_eq!(
            added,
            vec![(WindowHandle(0x100), false), (WindowHandle(0x200), true)]
        );
        assert_eq!(registry.visible_icons().len(), 1);
    }

    #[test]
    fn negotiated_version_is_replayed() {
        let mut tray = FakeTray::new();
        tray.push(0x1000, tray_data_64(0x100, 1, false, "Volume", Uuid::nil()));

        let mut registry = registry();
        LegacyHarvester::new(&tray).harvest(&mut registry).unwrap();
        let icon = registry.find(None, WindowHandle(0x100), 1).unwrap();
        assert_eq!(icon.version(), 4);
        assert_eq!(icon.tooltip(), "Volume");
    }

    #[test]
    fn stable_id_is_carried_over() {
        let guid = Uuid::from_u128(0xC0FFEE);
        let mut tray = FakeTray::new();
        tray.push(0x1000, tray_data_64(0x100, 1, false, "", guid));

        let mut registry = registry();
        LegacyHarvester::new(&tray).harvest(&mut registry).unwrap();
        assert!(registry.find(Some(guid), WindowHandle(0x999), 9).is_some());
    }

    #[test]
    fn unreadable_items_are_skipped() {
        let mut tray = FakeTray::new();
        tray.push(0, Vec::new());
        tray.push(0x3000, Vec::new());
        tray.memory.0.insert(0x3000, vec![0u8; 16]);
        tray.push(0x4000, tray_data_64(0x400, 4, false, "ok", Uuid::nil()));
        // Null owner window: the registry refuses it.
        tray.push(0x5000, tray_data_64(0, 5, false, "orphan", Uuid::nil()));

        let mut registry = registry();
        let report = LegacyHarvester::new(&tray).harvest(&mut registry).unwrap();
        assert_eq!(report.found, 4);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn auto_tray_is_toggled_around_harvest() {
        let mut tray = FakeTray::new();
        tray.push(0x1000, tray_data_64(0x100, 1, false, "a", Uuid::nil()));
        let mut auto_tray = FakeAutoTray::new(TrayNotifyCapability::Win8, Some(true));

        let mut registry = registry();
        LegacyHarvester::new(&tray)
            .with_auto_tray(&mut auto_tray)
            .harvest(&mut registry)
            .unwrap();
        assert_eq!(auto_tray.calls, vec![false, true]);
    }

    #[test]
    fn auto_tray_is_restored_when_count_fails() {
        struct BrokenTray(FakeMemory);

        impl ForeignTray for BrokenTray {
            fn pointer_width(&self) -> PointerWidth {
                PointerWidth::Bits32
            }

            fn button_count(&self) -> Result<usize, HarvestError> {
                Err(HarvestError::Win32 {
                    call: "SendMessageW(TB_BUTTONCOUNT)",
                    code: 5,
                })
            }

            fn button(&self, _index: usize) -> Result<Vec<u8>, HarvestError> {
                unreachable!()
            }

            fn memory(&self) -> &dyn RemoteMemory {
                &self.0
            }
        }

        let tray = BrokenTray(FakeMemory(HashMap::new()));
        let mut auto_tray = FakeAutoTray::new(TrayNotifyCapability::Legacy, Some(true));
        let mut registry = registry();
        let result = LegacyHarvester::new(&tray)
            .with_auto_tray(&mut auto_tray)
            .harvest(&mut registry);
        assert!(result.is_err());
        assert_eq!(auto_tray.calls, vec![false, true]);
    }
}
