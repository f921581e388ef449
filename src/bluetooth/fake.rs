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

//! In-memory BLE transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::link::{BleLink, BleTransport, CharacteristicInfo, LinkError, NotificationSink};
use super::protocol::COMMIT_FRAME;

/// Scripted device behaviour plus everything the driver did to it.
#[derive(Default)]
pub struct FakeDevice {
    /// Number of connect calls that fail before one succeeds.
    pub connect_failures: u32,
    pub connect_calls: u32,
    pub writes: Vec<(Uuid, Vec<u8>)>,
    /// When each recorded write happened.
    pub write_times: Vec<tokio::time::Instant>,
    /// Writes start failing once this many have been recorded.
    pub fail_writes_after: Option<usize>,
    pub fail_unsubscribe: bool,
    pub fail_disconnect: bool,
    pub unsubscribes: u32,
    pub disconnects: u32,
    pub sinks: HashMap<Uuid, NotificationSink>,
    /// Packets pushed to every subscriber after each commit write.
    pub reply_on_commit: Vec<Vec<u8>>,
    pub characteristics: Vec<CharacteristicInfo>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    pub device: Arc<Mutex<FakeDevice>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(connect_failures: u32) -> Self {
        let transport = Self::new();
        transport.device.lock().connect_failures = connect_failures;
        transport
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.device.lock().writes.clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.device.lock().connect_calls
    }

    /// Push a packet to every subscriber, as the device would.
    pub fn notify(&self, data: &[u8]) {
        let device = self.device.lock();
        for sink in device.sinks.values() {
            let _ = sink.try_send(data.to_vec());
        }
    }
}

pub struct FakeLink {
    device: Arc<Mutex<FakeDevice>>,
}

#[async_trait]
impl BleTransport for FakeTransport {
    type Link = FakeLink;

    async fn connect(&self, _address: &str) -> Result<FakeLink, LinkError> {
        let mut device = self.device.lock();
        device.connect_calls += 1;
        if device.connect_failures > 0 {
            device.connect_failures -= 1;
            return Err(LinkError::Other("device not reachable".into()));
        }
        Ok(FakeLink {
            device: self.device.clone(),
        })
    }
}

#[async_trait]
impl BleLink for FakeLink {
    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), LinkError> {
        let mut device = self.device.lock();
        if let Some(limit) = device.fail_writes_after {
            if device.writes.len() >= limit {
                return Err(LinkError::Other("write rejected".into()));
            }
        }
        device.writes.push((uuid, data.to_vec()));
        device.write_times.push(tokio::time::Instant::now());

        if data == COMMIT_FRAME.as_slice() {
            for packet in &device.reply_on_commit {
                for sink in device.sinks.values() {
                    let _ = sink.try_send(packet.clone());
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&mut self, uuid: Uuid, sink: NotificationSink) -> Result<(), LinkError> {
        self.device.lock().sinks.insert(uuid, sink);
        Ok(())
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), LinkError> {
        let mut device = self.device.lock();
        device.unsubscribes += 1;
        if device.fail_unsubscribe {
            return Err(LinkError::Other("stop notify failed".into()));
        }
        device.sinks.remove(&uuid);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        let mut device = self.device.lock();
        device.disconnects += 1;
        device.sinks.clear();
        if device.fail_disconnect {
            return Err(LinkError::Other("already gone".into()));
        }
        Ok(())
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>, LinkError> {
        Ok(self.device.lock().characteristics.clone())
    }
}
