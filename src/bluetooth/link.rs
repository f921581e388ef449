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

//! Abstract BLE link capability.
//!
//! The driver core only talks to the radio through these traits, so any
//! GATT client (BlueZ, a test double, a proxy) can sit underneath it.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Where a subscribed characteristic pushes its notification payloads.
pub type NotificationSink = async_channel::Sender<Vec<u8>>;

/// Errors raised by a link implementation.
#[derive(Debug, Error)]
pub enum LinkError {
    /// BlueZ reported an error.
    #[cfg(feature = "bluez")]
    #[error(transparent)]
    Bluez(#[from] bluer::Error),

    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("{0}")]
    Other(String),
}

/// Capability flags of a GATT characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicFlags {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicFlags {
    /// Accepts writes of either kind.
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

impl fmt::Display for CharacteristicFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.read, "READ"),
            (self.write, "WRITE"),
            (self.write_without_response, "WRITE_NO_RESP"),
            (self.notify, "NOTIFY"),
            (self.indicate, "INDICATE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", set.join(", "))
    }
}

/// A characteristic as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub uuid: Uuid,
    pub flags: CharacteristicFlags,
}

/// Opens links to devices.
#[async_trait]
pub trait BleTransport: Send + Sync {
    type Link: BleLink;

    /// Establish a GATT connection to the device at `address`.
    async fn connect(&self, address: &str) -> Result<Self::Link, LinkError>;
}

/// An established GATT connection.
#[async_trait]
pub trait BleLink: Send + Sync {
    /// Write `data` to the characteristic `uuid`.
    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), LinkError>;

    /// Start forwarding notifications of `uuid` into `sink`.
    async fn subscribe(&mut self, uuid: Uuid, sink: NotificationSink) -> Result<(), LinkError>;

    /// Stop forwarding notifications of `uuid`.
    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), LinkError>;

    /// Tear the connection down.
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Enumerate every characteristic the device exposes.
    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>, LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_display() {
        let flags = CharacteristicFlags {
            read: true,
            write: true,
            notify: true,
            ..Default::default()
        };
        assert_eq!(flags.to_string(), "READ, WRITE, NOTIFY");
        assert!(flags.is_writable());
        assert_eq!(CharacteristicFlags::default().to_string(), "");
    }

    #[test]
    fn test_write_without_response_is_writable() {
        let flags = CharacteristicFlags {
            write_without_response: true,
            ..Default::default()
        };
        assert!(flags.is_writable());
    }
}
