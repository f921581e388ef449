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

//! Two-phase command transmission.
//!
//! A command frame on its own does nothing: the device only acts once the
//! commit frame follows it on the same characteristic.

use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::link::BleLink;
use super::protocol::COMMIT_FRAME;

/// Settle interval observed to be enough for the device.
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_millis(100);

/// Writes a command frame followed by the commit frame.
#[derive(Debug, Clone, Copy)]
pub struct CommandSequencer {
    settle_interval: Duration,
}

impl CommandSequencer {
    pub fn new(settle_interval: Duration) -> Self {
        Self { settle_interval }
    }

    pub fn settle_interval(&self) -> Duration {
        self.settle_interval
    }

    /// Send `command` then commit it.
    ///
    /// Exactly two writes per call. Transport failures are returned as-is
    /// and never retried here.
    pub async fn send<L>(&self, link: &L, write_uuid: Uuid, command: &[u8]) -> Result<()>
    where
        L: BleLink + ?Sized,
    {
        debug!("Sending command: {}", hex::encode(command));
        link.write_characteristic(write_uuid, command)
            .await
            .map_err(|e| Error::transport("write command", e))?;
        tokio::time::sleep(self.settle_interval).await;

        debug!("Committing ({})", hex::encode(COMMIT_FRAME));
        link.write_characteristic(write_uuid, &COMMIT_FRAME)
            .await
            .map_err(|e| Error::transport("write commit", e))?;
        tokio::time::sleep(self.settle_interval).await;

        Ok(())
    }
}

impl Default for CommandSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_INTERVAL)
    }
}
