//! Canonical registry of notification-area icons.
//!
//! [`IconRegistry`] is the single owner of every icon the tray knows about.
//! Live protocol traffic and harvested icons both enter through
//! [`IconRegistry::apply`]; the UI reads derived views and receives
//! [`RegistryEvent`]s, and user pin actions go through `set_pin`/`unpin`.

pub mod error;
pub mod host;
pub mod icon;
pub mod identity;
pub mod pins;
pub mod registry;

pub use error::RegistryError;
pub use host::{IconHost, NotifyMessage};
pub use icon::{BalloonEvent, IconRecord, IconSnapshot, MouseButton, PointerEvent};
pub use identity::Identity;
pub use pins::{MemoryPinStore, PinList, PinStore, TomlPinStore};
pub use registry::{ApplyOutcome, Delivery, IconKey, IconRegistry, RegistryEvent, RemovalReason};
