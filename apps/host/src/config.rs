//! Host configuration.
//!
//! Reads/writes TOML at `~/.config/shelltray/host.toml`
//! (`%APPDATA%\shelltray\host.toml` on Windows). A missing file is written
//! back with defaults on first start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Import icons from an already running shell tray before taking over.
    #[serde(default = "default_true")]
    pub harvest_on_start: bool,
    /// Double-click threshold in milliseconds; 0 asks the OS.
    #[serde(default)]
    pub double_click_ms: u64,
    /// Pass unhandled requests to another shell tray, if one exists.
    #[serde(default = "default_true")]
    pub forward_to_secondary: bool,
    /// Pin list location; defaults to `pins.toml` next to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins_file: Option<PathBuf>,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(skip)]
    file_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            harvest_on_start: true,
            double_click_ms: 0,
            forward_to_secondary: true,
            pins_file: None,
            log_filter: default_log_filter(),
            file_path: config_file_path(),
        }
    }
}

impl HostConfig {
    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_file_path())
    }

    /// Loads configuration from `path`, creating it with defaults when
    /// absent. An unparseable file yields defaults and is left untouched.
    pub fn load_from(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let file_path = path.into();

        if !file_path.exists() {
            let config = HostConfig {
                file_path,
                ..Default::default()
            };
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&file_path)?;
        let config = match toml::from_str::<HostConfig>(&content) {
            Ok(parsed) => HostConfig {
                file_path,
                ..parsed
            },
            Err(e) => {
                // Logging is not up yet when the host loads its config.
                eprintln!(
                    "failed to parse {}: {e}; using defaults",
                    file_path.display()
                );
                HostConfig {
                    file_path,
                    ..Default::default()
                }
            }
        };
        Ok(config)
    }

    /// Saves configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn pins_path(&self) -> PathBuf {
        match &self.pins_file {
            Some(path) => path.clone(),
            None => self
                .file_path
                .parent()
                .map(|dir| dir.join("pins.toml"))
                .unwrap_or_else(|| PathBuf::from("pins.toml")),
        }
    }

    /// `None` means use the system setting.
    pub fn double_click(&self) -> Option<Duration> {
        (self.double_click_ms > 0).then(|| Duration::from_millis(self.double_click_ms))
    }
}

fn config_file_path() -> PathBuf {
    config_base_dir().join("shelltray").join("host.toml")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}
