//! Persisted pin ordering.
//!
//! The pin list is the only durable artifact of the tray: an ordered list of
//! icon keys (stable GUID strings or composite keys). Stored as TOML:
//!
//! ```toml
//! pinned = [
//!     "7820ae73-23e3-4229-82c1-e41cb67d5b9c",
//!     "C:\\Program Files\\Mail\\mail.exe:1:Mail",
//! ]
//! ```
//!
//! Order is preserved exactly, duplicates included; lookups take the first
//! occurrence.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Ordered pin identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinList {
    #[serde(default)]
    pinned: Vec<String>,
}

impl PinList {
    pub fn new(entries: Vec<String>) -> Self {
        Self { pinned: entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.pinned
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    /// Index of the first entry accepted by `matches`.
    pub fn position(&self, matches: impl Fn(&str) -> bool) -> Option<usize> {
        self.pinned.iter().position(|entry| matches(entry))
    }

    /// Inserts `entry` at `position`, clamped to the end of the list.
    /// Returns the index actually used.
    pub fn insert(&mut self, position: usize, entry: String) -> usize {
        let at = position.min(self.pinned.len());
        self.pinned.insert(at, entry);
        at
    }

    /// Removes every entry accepted by `matches`. Returns how many went.
    pub fn remove_matching(&mut self, matches: impl Fn(&str) -> bool) -> usize {
        let before = self.pinned.len();
        self.pinned.retain(|entry| !matches(entry));
        before - self.pinned.len()
    }
}

/// Durable storage for the pin list.
pub trait PinStore {
    fn load(&self) -> Result<PinList, RegistryError>;
    fn save(&self, pins: &PinList) -> Result<(), RegistryError>;
}

/// Pin list stored in a TOML file.
#[derive(Debug, Clone)]
pub struct TomlPinStore {
    path: PathBuf,
}

impl TomlPinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PinStore for TomlPinStore {
    /// A missing file is an empty list.
    fn load(&self) -> Result<PinList, RegistryError> {
        if !self.path.exists() {
            return Ok(PinList::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let pins: PinList = toml::from_str(&content)?;
        tracing::debug!(path = %self.path.display(), count = pins.len(), "pin list loaded");
        Ok(pins)
    }

    fn save(&self, pins: &PinList) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(pins)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), count = pins.len(), "pin list saved");
        Ok(())
    }
}

/// In-memory pin store. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryPinStore {
    inner: Rc<RefCell<MemoryPins>>,
}

#[derive(Debug, Default)]
struct MemoryPins {
    pins: PinList,
    saves: usize,
}

impl MemoryPinStore {
    pub fn new(pins: PinList) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryPins { pins, saves: 0 })),
        }
    }

    /// Number of times `save` was called.
    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }

    pub fn current(&self) -> PinList {
        self.inner.borrow().pins.clone()
    }
}

impl PinStore for MemoryPinStore {
    fn load(&self) -> Result<PinList, RegistryError> {
        Ok(self.inner.borrow().pins.clone())
    }

    fn save(&self, pins: &PinList) -> Result<(), RegistryError> {
        let mut inner = self.inner.borrow_mut();
        inner.pins = pins.clone();
        inner.saves += 1;
        Ok(())
    }
}
