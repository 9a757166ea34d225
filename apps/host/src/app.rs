//! Wires the registry, transport and harvester together.

use std::sync::mpsc;

use shelltray_protocol::AppBarRequest;
use shelltray_registry::{IconHost, IconRegistry, PinStore, RegistryEvent};
use shelltray_transport::{TrayHost, Transport};

use crate::config::HostConfig;

/// Builds a transport that owns a fresh registry, configured from `config`.
pub fn build_transport(
    config: &HostConfig,
    icon_host: Box<dyn IconHost>,
    tray_host: Box<dyn TrayHost>,
    pins: Box<dyn PinStore>,
) -> Transport {
    let registry = IconRegistry::new(icon_host, pins);
    let mut transport = Transport::new(registry, tray_host);
    transport.set_forward_to_secondary(config.forward_to_secondary);
    transport.set_double_click(config.double_click());
    transport.set_app_bar_handler(Box::new(log_app_bar));
    transport
}

/// App-bar requests are observed and left to the secondary tray.
fn log_app_bar(request: &AppBarRequest<'_>) -> Option<isize> {
    tracing::debug!(
        message = request.message,
        window = %request.window,
        edge = request.edge,
        source_pid = request.source_pid,
        shared_memory = request.shared_memory,
        "app-bar request"
    );
    None
}

/// Logs registry changes on a background thread until the registry is gone.
pub fn spawn_event_log(events: mpsc::Receiver<RegistryEvent>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for event in events {
            match event {
                RegistryEvent::Added(icon) => tracing::info!(
                    key = %icon.key,
                    window = %icon.window,
                    sub_id = icon.sub_id,
                    tooltip = %icon.tooltip,
                    hidden = icon.hidden,
                    "icon added"
                ),
                RegistryEvent::Updated(icon) => tracing::debug!(
                    key = %icon.key,
                    hidden = icon.hidden,
                    pinned = icon.pinned,
                    "icon updated"
                ),
                RegistryEvent::Removed { key, reason } => {
                    tracing::info!(%key, ?reason, "icon removed")
                }
                RegistryEvent::Balloon { key, balloon } => {
                    tracing::debug!(%key, title = %balloon.title, "balloon shown")
                }
                RegistryEvent::PinsChanged => tracing::debug!("pin list changed"),
            }
        }
    })
}

#[cfg(target_os = "windows")]
pub fn run(config: HostConfig) -> anyhow::Result<()> {
    use shelltray_registry::TomlPinStore;
    use shelltray_transport::{TrayWindows, Win32Host};

    let pins = TomlPinStore::new(config.pins_path());
    tracing::info!(pins = %pins.path().display(), "starting notification area host");

    let mut transport = build_transport(
        &config,
        Box::new(Win32Host),
        Box::new(Win32Host),
        Box::new(pins),
    );
    let _event_log = spawn_event_log(transport.registry_mut().subscribe());

    if config.harvest_on_start {
        match shelltray_harvest::harvest_running_tray(transport.registry_mut()) {
            Ok(report) => tracing::info!(
                found = report.found,
                applied = report.applied,
                "imported icons from running tray"
            ),
            Err(e) => tracing::warn!(error = %e, "legacy icon harvest skipped"),
        }
    }

    let windows = TrayWindows::create(transport)?;
    windows.announce();
    windows.run_message_loop()?;
    tracing::info!("notification area host stopped");
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn run(config: HostConfig) -> anyhow::Result<()> {
    tracing::warn!(
        config = %config.file_path().display(),
        "the notification area host needs a Win32 session"
    );
    Err(shelltray_transport::TransportError::Unsupported.into())
}
