// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving driver settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{DEFAULT_NOTIFICATION_CAPACITY, DEVICE_NAME};
use crate::controller::ControllerSettings;

const APP_DIR: &str = "solem-blip";

/// Driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log at debug level.
    pub debug: bool,

    /// Which controller to talk to.
    pub device: DeviceConfig,

    /// Connection retry policy.
    pub connection: ConnectionConfig,

    /// Command and notification timing.
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Bluetooth address, e.g. "C8:B9:61:06:69:96".
    pub address: String,

    /// Name the controller advertises; scans flag devices carrying it.
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "C8:B9:61:06:69:96".to_string(),
            name: DEVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    pub backoff_ms: u64,

    /// Enumerate characteristics instead of using the known UUIDs.
    pub discover_characteristics: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_ms: 2000,
            discover_characteristics: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Pause after each write in milliseconds.
    pub settle_interval_ms: u64,

    /// How long a status query waits for an answer, in milliseconds.
    pub status_timeout_ms: u64,

    /// Notifications buffered before new ones are dropped.
    pub notification_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            settle_interval_ms: 100,
            status_timeout_ms: 5000,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing the defaults there if the
    /// file does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Settings for an [`IrrigationController`](crate::controller::IrrigationController).
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            address: self.device.address.clone(),
            max_attempts: self.connection.max_attempts,
            backoff: Duration::from_millis(self.connection.backoff_ms),
            settle_interval: Duration::from_millis(self.protocol.settle_interval_ms),
            status_timeout: Duration::from_millis(self.protocol.status_timeout_ms),
            notification_capacity: self.protocol.notification_capacity,
            discover_characteristics: self.connection.discover_characteristics,
        }
    }
}
