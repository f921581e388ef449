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

//! Session state shared with observers.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::bluetooth::DeviceStatus;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting { .. } => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting...",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting { attempt } => write!(f, "Connecting (attempt {})", attempt),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Read-mostly snapshot of one controller session.
///
/// Only the connection manager and the controller write to it.
#[derive(Debug)]
pub struct SessionState {
    /// Current connection state.
    pub connection: RwLock<ConnectionState>,

    /// Whether the notify characteristic is subscribed.
    pub notifications_enabled: RwLock<bool>,

    /// Most recently decoded device status.
    pub last_status: RwLock<Option<DeviceStatus>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: RwLock::new(ConnectionState::Disconnected),
            notifications_enabled: RwLock::new(false),
            last_status: RwLock::new(None),
        }
    }
}

impl SessionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connection(&self, state: ConnectionState) {
        *self.connection.write() = state;
    }

    pub fn get_connection(&self) -> ConnectionState {
        *self.connection.read()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        *self.notifications_enabled.write() = enabled;
    }

    pub fn notifications_enabled(&self) -> bool {
        *self.notifications_enabled.read()
    }

    pub fn set_last_status(&self, status: DeviceStatus) {
        *self.last_status.write() = Some(status);
    }

    pub fn get_last_status(&self) -> Option<DeviceStatus> {
        *self.last_status.read()
    }

    /// Back to a fresh, disconnected session.
    pub fn reset(&self) {
        self.set_connection(ConnectionState::Disconnected);
        self.set_notifications_enabled(false);
    }
}
