//! Shell tray transport.
//!
//! Receives the copy-data requests applications send to the shell tray,
//! routes them into the icon registry and forwards whatever it does not
//! understand to a secondary tray. The Windows backend owns the two host
//! windows; other platforms get a stub so the engine still builds and
//! tests everywhere.

pub mod dispatch;
pub mod error;
pub mod host;
pub mod queue;
pub mod transport;

#[cfg(target_os = "windows")]
#[path = "platform_windows.rs"]
mod platform;

#[cfg(not(target_os = "windows"))]
#[path = "platform_other.rs"]
mod platform;

pub use dispatch::Dispatcher;
pub use error::TransportError;
pub use host::{AppBarHandler, TrayHost};
pub use platform::TrayWindows;
#[cfg(target_os = "windows")]
pub use platform::Win32Host;
pub use queue::{QueueHandle, Work, WorkQueue};
pub use transport::{Reply, Route, Transport};
