//! Link configuration
//!
//! Everything needed to bring up the input link, stored as JSON
//! (`arduino-link.json`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::decoder::DecoderSettings;
use crate::link::{LinkError, PortSettings, RetryPolicy};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "arduino-link.json";

/// Input link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Port to open (device path, `COMn`, `tcp://host:port` or `demo://`).
    /// `None` picks the first detected Arduino-class board.
    pub port: Option<String>,

    /// Line settings
    pub settings: PortSettings,

    /// Backoff for the initial open
    pub retry: RetryPolicy,

    /// Keep trying to reopen a lost link from the poll loop
    pub auto_reconnect: bool,

    /// Backoff between reconnect attempts made from the poll loop
    pub reconnect: RetryPolicy,

    /// Decoder and delivery queue settings
    pub decoder: DecoderSettings,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            settings: PortSettings::default(),
            retry: RetryPolicy::default(),
            auto_reconnect: true,
            reconnect: RetryPolicy::reconnect(),
            decoder: DecoderSettings::default(),
        }
    }
}

impl LinkConfig {
    /// Config for a specific port with default settings
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: LinkConfig = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Check the line settings and both retry policies
    pub fn validate(&self) -> Result<(), LinkError> {
        self.settings.validate()?;
        self.retry.validate()?;
        self.reconnect.validate()
    }

    /// Load from `path` if it exists, otherwise return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }
}

/// Default config location: `<config dir>/arduino-link/arduino-link.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arduino-link")
        .join(CONFIG_FILE_NAME)
}
