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

//! Notification processing.
//!
//! Raw notification payloads go in, decoded statuses come out. The
//! processor is synchronous so it can sit behind any channel or runtime.

use tracing::{debug, warn};

use crate::bluetooth::ble_constants::prefixes;
use crate::bluetooth::{decode_notification, Burst, BurstAssembler, DeviceStatus};

/// What a single notification turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// First packet of a burst, with the status it carries.
    Status(DeviceStatus),
    /// Packet that closed a burst.
    BurstComplete(Burst),
    /// Middle packet or anything else without a status.
    Trailing,
    /// Too short or otherwise unparseable; dropped.
    Malformed,
}

/// Turns raw notification payloads into events.
pub struct NotificationProcessor {
    assembler: BurstAssembler,
    last_burst: Option<Burst>,
    last_status_packet: Option<Vec<u8>>,
}

impl NotificationProcessor {
    /// Create a new notification processor.
    pub fn new() -> Self {
        Self {
            assembler: BurstAssembler::new(),
            last_burst: None,
            last_status_packet: None,
        }
    }

    /// Process one raw payload.
    pub fn process(&mut self, data: &[u8]) -> NotificationEvent {
        debug!("Notification: {}", hex::encode(data));

        let envelope = match decode_notification(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping notification: {}", e);
                return NotificationEvent::Malformed;
            }
        };

        if !prefixes::is_known(envelope.prefix) {
            debug!("Unrecognised notification prefix 0x{:04x}", envelope.prefix);
        }

        if let Some(burst) = self.assembler.process_packet(&envelope, data) {
            let complete = burst.complete;
            self.last_burst = Some(burst.clone());
            if complete {
                return NotificationEvent::BurstComplete(burst);
            }
        }

        match DeviceStatus::from_envelope(&envelope) {
            Some(status) => {
                debug!("Device status: {}", status);
                self.last_status_packet = Some(data.to_vec());
                NotificationEvent::Status(status)
            }
            None => NotificationEvent::Trailing,
        }
    }

    /// Process one payload and keep only a decoded status.
    pub fn push(&mut self, data: &[u8]) -> Option<DeviceStatus> {
        match self.process(data) {
            NotificationEvent::Status(status) => Some(status),
            _ => None,
        }
    }

    /// The most recently closed burst.
    pub fn last_burst(&self) -> Option<&Burst> {
        self.last_burst.as_ref()
    }

    /// Raw bytes of the packet that produced the latest status.
    pub fn last_status_packet(&self) -> Option<&[u8]> {
        self.last_status_packet.as_deref()
    }

    /// Forget any partially received burst.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }
}

impl Default for NotificationProcessor {
    fn default() -> Self {
        Self::new()
    }
}
