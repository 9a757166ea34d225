//! Wire types for the emulated notification-area protocol.
//!
//! Applications talk to the shell tray through `WM_COPYDATA` requests whose
//! layouts were never documented. This crate decodes them into plain Rust
//! values and holds the constants that outbound messages must reuse
//! bit-for-bit.

pub mod appbar;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod placement;
pub mod types;
pub mod wire;

// Re-export primary types for convenience.
pub use appbar::AppBarRequest;
pub use envelope::{Discriminant, Envelope, OwnedEnvelope};
pub use error::ProtocolError;
pub use placement::{PlacementCorner, PlacementQuery};
pub use types::{IconHandle, Point, Rect, WindowHandle};
pub use wire::{Balloon, IconDatagram, MessageKind, WireMessage};
